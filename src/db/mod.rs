pub mod mock_payment_repository;
pub mod payment_repository;
pub mod postgres_payment_repository;
