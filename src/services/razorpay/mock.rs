#![allow(dead_code)]
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    CreatePlanRequest, CreateSubscriptionRequest, ProviderPlan, ProviderSubscription,
    RazorpayEvent, RazorpayService, RazorpayServiceError,
};

/// Capturing fake. Webhook verification is skipped so tests can post
/// payloads directly; signature behavior is covered by the live service.
#[derive(Clone, Default)]
pub struct MockRazorpayService {
    pub create_requests: Arc<Mutex<Vec<CreateSubscriptionRequest>>>,
    pub created_subscriptions: Arc<Mutex<Vec<ProviderSubscription>>>,
    pub cancelled: Arc<Mutex<Vec<String>>>,
    pub created_plans: Arc<Mutex<Vec<CreatePlanRequest>>>,
    pub fail_create_subscription: Arc<Mutex<bool>>,
    pub fail_cancel_subscription: Arc<Mutex<bool>>,
    counter: Arc<Mutex<u64>>,
}

impl MockRazorpayService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(self) -> Self {
        *self.fail_create_subscription.lock().unwrap() = true;
        self
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{}_{:04}", prefix, counter)
    }
}

#[async_trait]
impl RazorpayService for MockRazorpayService {
    async fn create_subscription(
        &self,
        req: CreateSubscriptionRequest,
    ) -> Result<ProviderSubscription, RazorpayServiceError> {
        if *self.fail_create_subscription.lock().unwrap() {
            return Err(RazorpayServiceError::Api("simulated provider outage".into()));
        }

        self.create_requests.lock().unwrap().push(req.clone());
        let subscription = ProviderSubscription {
            id: self.next_id("sub_test"),
            plan_id: req.plan_id,
            status: "created".into(),
            short_url: Some("https://rzp.test/i/checkout".into()),
        };
        self.created_subscriptions
            .lock()
            .unwrap()
            .push(subscription.clone());
        Ok(subscription)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), RazorpayServiceError> {
        if *self.fail_cancel_subscription.lock().unwrap() {
            return Err(RazorpayServiceError::Api("simulated provider outage".into()));
        }
        self.cancelled
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }

    async fn create_plan(
        &self,
        req: CreatePlanRequest,
    ) -> Result<ProviderPlan, RazorpayServiceError> {
        self.created_plans.lock().unwrap().push(req);
        Ok(ProviderPlan {
            id: self.next_id("plan_test"),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<RazorpayEvent, RazorpayServiceError> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| RazorpayServiceError::Serde(e.to_string()))?;
        let event = value
            .get("event")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(RazorpayEvent {
            event,
            payload: value,
        })
    }
}
