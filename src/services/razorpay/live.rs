#![allow(dead_code)]
use serde::Deserialize;
use serde_json::json;

use super::{
    CreatePlanRequest, CreateSubscriptionRequest, ProviderPlan, ProviderSubscription,
    RazorpayEvent, RazorpayService, RazorpayServiceError,
};
use crate::utils::signature::verify_signature;

const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com/v1";

fn api_base_url() -> String {
    std::env::var("RAZORPAY_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
}

pub struct LiveRazorpayService {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

#[derive(Deserialize)]
struct SubscriptionEntity {
    id: String,
    plan_id: String,
    status: String,
    short_url: Option<String>,
}

#[derive(Deserialize)]
struct PlanEntity {
    id: String,
}

impl LiveRazorpayService {
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api_base_url(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::RazorpaySettings) -> Self {
        Self::new(
            settings.key_id.clone(),
            settings.key_secret.clone(),
            settings.webhook_secret.clone(),
        )
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, RazorpayServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| RazorpayServiceError::Api(e.to_string()))?;

        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RazorpayServiceError::Serde(e.to_string()))?;

        if !status.is_success() {
            // Razorpay error shape: { "error": { "code", "description", ... } }
            let description = value
                .get("error")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .unwrap_or("unknown error");
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(RazorpayServiceError::NotFound(description.to_string()));
            }
            return Err(RazorpayServiceError::Api(format!(
                "{}: {}",
                status, description
            )));
        }

        Ok(value)
    }
}

#[async_trait::async_trait]
impl RazorpayService for LiveRazorpayService {
    async fn create_subscription(
        &self,
        req: CreateSubscriptionRequest,
    ) -> Result<ProviderSubscription, RazorpayServiceError> {
        let body = json!({
            "plan_id": req.plan_id,
            "total_count": req.total_count,
            "customer_notify": if req.customer_notify { 1 } else { 0 },
            "notes": req.notes.unwrap_or_default(),
        });
        let value = self.post("/subscriptions", body).await?;
        let entity: SubscriptionEntity =
            serde_json::from_value(value).map_err(|e| RazorpayServiceError::Serde(e.to_string()))?;

        Ok(ProviderSubscription {
            id: entity.id,
            plan_id: entity.plan_id,
            status: entity.status,
            short_url: entity.short_url,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), RazorpayServiceError> {
        let path = format!("/subscriptions/{}/cancel", subscription_id);
        self.post(&path, json!({})).await?;
        Ok(())
    }

    async fn create_plan(
        &self,
        req: CreatePlanRequest,
    ) -> Result<ProviderPlan, RazorpayServiceError> {
        let body = json!({
            "period": req.period,
            "interval": req.interval,
            "item": {
                "name": req.name,
                "amount": req.amount,
                "currency": req.currency,
                "description": req.description,
            },
        });
        let value = self.post("/plans", body).await?;
        let entity: PlanEntity =
            serde_json::from_value(value).map_err(|e| RazorpayServiceError::Serde(e.to_string()))?;

        Ok(ProviderPlan { id: entity.id })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<RazorpayEvent, RazorpayServiceError> {
        if !verify_signature(payload, signature_header, self.webhook_secret.as_bytes()) {
            return Err(RazorpayServiceError::Webhook(
                "signature mismatch for raw body".into(),
            ));
        }

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| RazorpayServiceError::Serde(e.to_string()))?;
        let event = value
            .get("event")
            .and_then(|e| e.as_str())
            .ok_or_else(|| RazorpayServiceError::Serde("event field missing".into()))?
            .to_string();

        Ok(RazorpayEvent {
            event,
            payload: value,
        })
    }
}
