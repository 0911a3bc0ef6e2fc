use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use axum::{http::StatusCode, response::Response};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::db::payment_repository::{BillingPeriod, TransitionOutcome};
use crate::models::payment::SubscriptionEvent;
use crate::responses::JsonResponse;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

// Small helper: nested json lookup
fn jget<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut cur = val;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn extract_str<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    jget(val, path)?.as_str()
}

/// Subscription events carry the subscription entity; payment failures may
/// only reference the subscription from the payment entity.
fn extract_subscription_id(payload: &serde_json::Value) -> Option<String> {
    extract_str(payload, &["payload", "subscription", "entity", "id"])
        .or_else(|| extract_str(payload, &["payload", "payment", "entity", "subscription_id"]))
        .map(|s| s.to_string())
}

fn extract_billing_period(payload: &serde_json::Value) -> Option<BillingPeriod> {
    let entity = jget(payload, &["payload", "subscription", "entity"])?;
    let ts = |key: &str| {
        entity
            .get(key)
            .and_then(|v| v.as_i64())
            .and_then(|t| OffsetDateTime::from_unix_timestamp(t).ok())
    };

    let period = BillingPeriod {
        current_start: ts("current_start"),
        current_end: ts("current_end"),
        next_charge_at: ts("charge_at"),
    };
    if period.current_start.is_none()
        && period.current_end.is_none()
        && period.next_charge_at.is_none()
    {
        return None;
    }
    Some(period)
}

fn ack() -> Response {
    Json(json!({ "success": true })).into_response()
}

// POST /api/subscription-webhook
//
// The body must stay raw bytes until the signature is verified; the tag was
// computed over exactly what the provider sent.
pub async fn razorpay_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let sig = match headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok()) {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing X-Razorpay-Signature").into_response(),
    };

    let evt = match app_state.razorpay.verify_webhook(&body, sig) {
        Ok(e) => e,
        Err(err) => {
            warn!(?err, "razorpay webhook verification failed");
            return (StatusCode::BAD_REQUEST, "invalid webhook").into_response();
        }
    };

    let evt_type = evt.event.as_str();
    let payload = &evt.payload;

    let event = match SubscriptionEvent::from_event_type(evt_type) {
        Some(event) => event,
        None => {
            info!(evt_type, "unhandled razorpay event acknowledged");
            return ack();
        }
    };

    let subscription_id = match extract_subscription_id(payload) {
        Some(id) => id,
        None => {
            warn!(evt_type, "event carries no subscription id");
            return JsonResponse::bad_request("Malformed event payload").into_response();
        }
    };

    let period = if event.refreshes_period() {
        extract_billing_period(payload)
    } else {
        None
    };

    match app_state
        .db
        .apply_subscription_event(&subscription_id, event, period)
        .await
    {
        Ok(TransitionOutcome::Applied(record)) => {
            info!(
                %subscription_id,
                evt_type,
                status = %record.status,
                "applied subscription event"
            );
            ack()
        }
        Ok(TransitionOutcome::Skipped(status)) => {
            // Late or redelivered event against a terminal record; absorbing
            // it here is what makes out-of-order delivery safe.
            info!(%subscription_id, evt_type, %status, "event absorbed by terminal subscription");
            ack()
        }
        Ok(TransitionOutcome::NotFound) => {
            warn!(
                %subscription_id,
                evt_type, "orphan event for unknown subscription dropped"
            );
            ack()
        }
        Err(err) => {
            // 5xx tells the provider to redeliver.
            error!(?err, %subscription_id, evt_type, "failed to apply subscription event");
            JsonResponse::server_error("Failed to process event").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RazorpaySettings};
    use crate::db::mock_payment_repository::MockPaymentRepository;
    use crate::models::payment::{PaymentKind, PaymentRecord, PaymentStatus};
    use crate::services::razorpay::{LiveRazorpayService, MockRazorpayService, RazorpayService};
    use crate::utils::jwt::JwtKeys;
    use crate::utils::locks::KeyedLocks;
    use crate::utils::signature::sign_payload;
    use axum::extract::State as AxumState;
    use axum::http::{HeaderMap, HeaderValue};
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    const WEBHOOK_SECRET: &str = "whsec_test_0123456789";

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database_url: String::new(),
            frontend_origin: "https://app.example.com".into(),
            razorpay: RazorpaySettings {
                key_id: "rzp_test_key".into(),
                key_secret: "key_secret".into(),
                webhook_secret: WEBHOOK_SECRET.into(),
                pro_plan_id: "plan_pro_monthly".into(),
                plan_amount: 200,
                plan_currency: "INR".into(),
            },
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
        })
    }

    fn test_state(
        db: Arc<MockPaymentRepository>,
        razorpay: Arc<dyn RazorpayService>,
    ) -> AppState {
        AppState {
            db,
            razorpay,
            config: test_config(),
            jwt_keys: Arc::new(
                JwtKeys::from_secret("0123456789abcdef0123456789abcdef")
                    .expect("test JWT secret should be valid"),
            ),
            user_locks: Arc::new(KeyedLocks::new()),
        }
    }

    fn seeded_record(user_id: Uuid, subscription_id: &str, status: PaymentStatus) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            user_id,
            subscription_id: Some(subscription_id.to_string()),
            plan_id: Some("plan_pro_monthly".into()),
            short_url: Some("https://rzp.test/i/checkout".into()),
            kind: PaymentKind::Subscription,
            status,
            amount: 200,
            currency: "INR".into(),
            current_period_start: None,
            current_period_end: None,
            next_charge_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn activation_body(subscription_id: &str, start: i64, end: i64) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event": "subscription.activated",
            "payload": {
                "subscription": {
                    "entity": {
                        "id": subscription_id,
                        "status": "active",
                        "current_start": start,
                        "current_end": end,
                        "charge_at": end
                    }
                }
            }
        }))
        .unwrap()
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let sig = sign_payload(body, WEBHOOK_SECRET.as_bytes());
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sig).unwrap());
        headers
    }

    async fn post_webhook(state: AppState, headers: HeaderMap, body: Vec<u8>) -> Response {
        razorpay_webhook(AxumState(state), headers, axum::body::Bytes::from(body)).await
    }

    #[tokio::test]
    async fn activation_moves_pending_record_to_active_with_period() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockPaymentRepository::new());
        db.seed(seeded_record(user_id, "sub_1", PaymentStatus::Created));
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let resp = post_webhook(state, signed_headers(&body), body.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let records = db.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PaymentStatus::Active);
        assert_eq!(
            records[0].current_period_start,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).ok()
        );
        assert_eq!(
            records[0].next_charge_at,
            OffsetDateTime::from_unix_timestamp(1_702_592_000).ok()
        );
    }

    #[tokio::test]
    async fn redelivered_activation_is_a_safe_noop() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockPaymentRepository::new());
        db.seed(seeded_record(user_id, "sub_1", PaymentStatus::Created));
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let first = post_webhook(state.clone(), signed_headers(&body), body.clone()).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = post_webhook(state, signed_headers(&body), body.clone()).await;
        assert_eq!(second.status(), StatusCode::OK);

        let records = db.records();
        assert_eq!(records.len(), 1, "no duplicate record from redelivery");
        assert_eq!(records[0].status, PaymentStatus::Active);
        assert_eq!(
            records[0].current_period_start,
            OffsetDateTime::from_unix_timestamp(1_700_000_000).ok()
        );
    }

    #[tokio::test]
    async fn late_activation_after_cancellation_is_absorbed() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockPaymentRepository::new());
        db.seed(seeded_record(user_id, "sub_1", PaymentStatus::Active));
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let cancel = serde_json::to_vec(&serde_json::json!({
            "event": "subscription.cancelled",
            "payload": { "subscription": { "entity": { "id": "sub_1", "status": "cancelled" } } }
        }))
        .unwrap();
        let resp = post_webhook(state.clone(), signed_headers(&cancel), cancel).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(db.records()[0].status, PaymentStatus::Cancelled);

        // Delayed duplicate of an earlier activation arrives afterwards.
        let body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let resp = post_webhook(state, signed_headers(&body), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(db.records()[0].status, PaymentStatus::Cancelled);
        assert_eq!(db.records()[0].current_period_start, None);
    }

    #[tokio::test]
    async fn payment_failure_terminates_the_record() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockPaymentRepository::new());
        db.seed(seeded_record(user_id, "sub_1", PaymentStatus::Active));
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "payment.failed",
            "payload": {
                "payment": { "entity": { "id": "pay_1", "subscription_id": "sub_1" } }
            }
        }))
        .unwrap();
        let resp = post_webhook(state, signed_headers(&body), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(db.records()[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn orphan_event_is_acknowledged_and_store_untouched() {
        let db = Arc::new(MockPaymentRepository::new());
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = activation_body("sub_unknown", 1_700_000_000, 1_702_592_000);
        let resp = post_webhook(state, signed_headers(&body), body).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(db.records().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let db = Arc::new(MockPaymentRepository::new());
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "subscription.updated",
            "payload": { "subscription": { "entity": { "id": "sub_1" } } }
        }))
        .unwrap();
        let resp = post_webhook(state, signed_headers(&body), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn event_without_subscription_id_is_rejected() {
        let db = Arc::new(MockPaymentRepository::new());
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "subscription.activated",
            "payload": {}
        }))
        .unwrap();
        let resp = post_webhook(state, signed_headers(&body), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let db = Arc::new(MockPaymentRepository::new());
        let state = test_state(db.clone(), Arc::new(MockRazorpayService::new()));

        let body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let resp = post_webhook(state, HeaderMap::new(), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signature_over_different_body_is_rejected_and_nothing_is_applied() {
        // Live verifier: the signature is computed over a different payload
        // than the one delivered.
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockPaymentRepository::new());
        db.seed(seeded_record(user_id, "sub_1", PaymentStatus::Created));
        let live: Arc<dyn RazorpayService> = Arc::new(LiveRazorpayService::new(
            "rzp_test_key",
            "key_secret",
            WEBHOOK_SECRET,
        ));
        let state = test_state(db.clone(), live);

        let signed_body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let delivered_body = activation_body("sub_1", 1_800_000_000, 1_802_592_000);
        let headers = signed_headers(&signed_body);

        let resp = post_webhook(state, headers, delivered_body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(db.records()[0].status, PaymentStatus::Created);
        assert_eq!(db.records()[0].current_period_start, None);
    }

    #[tokio::test]
    async fn store_failure_returns_server_error_for_redelivery() {
        let db = Arc::new(MockPaymentRepository {
            should_fail: true,
            ..Default::default()
        });
        let state = test_state(db, Arc::new(MockRazorpayService::new()));

        let body = activation_body("sub_1", 1_700_000_000, 1_702_592_000);
        let resp = post_webhook(state, signed_headers(&body), body).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
