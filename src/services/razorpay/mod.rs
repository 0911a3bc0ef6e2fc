#![allow(dead_code)]
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RazorpayServiceError {
    #[error("razorpay api error: {0}")]
    Api(String),
    #[error("webhook verification failed: {0}")]
    Webhook(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("other error: {0}")]
    Other(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
    /// Number of billing cycles to authorize.
    pub total_count: u32,
    pub customer_notify: bool,
    pub notes: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub period: String,
    pub interval: u32,
    pub name: String,
    /// Amount in currency subunits (paise for INR).
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub plan_id: String,
    pub status: String,
    /// Provider-hosted checkout link the end user completes payment on.
    pub short_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderPlan {
    pub id: String,
}

/// A verified, parsed webhook notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RazorpayEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait RazorpayService: Send + Sync {
    async fn create_subscription(
        &self,
        req: CreateSubscriptionRequest,
    ) -> Result<ProviderSubscription, RazorpayServiceError>;

    async fn cancel_subscription(&self, subscription_id: &str)
        -> Result<(), RazorpayServiceError>;

    async fn create_plan(
        &self,
        req: CreatePlanRequest,
    ) -> Result<ProviderPlan, RazorpayServiceError>;

    /// Authenticates the raw body against the shared webhook secret and only
    /// then parses it. Body parsing before verification is a defect.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<RazorpayEvent, RazorpayServiceError>;
}

mod live;
mod mock;

#[allow(unused_imports)]
pub use live::LiveRazorpayService;
#[allow(unused_imports)]
pub use mock::MockRazorpayService;
