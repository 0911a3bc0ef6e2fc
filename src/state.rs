use std::sync::Arc;

use crate::config::Config;
use crate::db::payment_repository::PaymentRepository;
use crate::services::razorpay::RazorpayService;
use crate::utils::jwt::JwtKeys;
use crate::utils::locks::KeyedLocks;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn PaymentRepository>,
    pub razorpay: Arc<dyn RazorpayService>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
    pub user_locks: Arc<KeyedLocks>,
}
