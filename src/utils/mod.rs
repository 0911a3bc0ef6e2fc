pub mod jwt;
pub mod locks;
pub mod signature;
