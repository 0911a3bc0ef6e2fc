use axum::{extract::State, response::IntoResponse, Json};
use axum::{http::StatusCode, response::Response};
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::payment_repository::NewSubscriptionRecord;
use crate::models::payment::PaymentRecord;
use crate::models::user::UserRole;
use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::services::razorpay::{CreatePlanRequest, CreateSubscriptionRequest};
use crate::state::AppState;

/// Pending attempts younger than this are handed back unchanged instead of
/// being recreated, so double-clicks before checkout reuse one payment link.
pub const REUSE_WINDOW: Duration = Duration::minutes(5);

/// Billing cycles authorized per subscription (one year of monthly charges).
const SUBSCRIPTION_CYCLES: u32 = 12;

fn subscription_json(record: &PaymentRecord, reused: bool) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "reused": reused,
            "subscription": {
                "id": record.subscription_id,
                "short_url": record.short_url,
                "status": record.status,
            },
        })),
    )
        .into_response()
}

// POST /api/create-subscription
pub async fn create_subscription(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let user_id = match Uuid::parse_str(&claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid user ID").into_response(),
    };

    // Serialize the whole read-decide-write sequence per user; without this
    // two rapid clicks can both pass the pending lookup and buy two
    // provider subscriptions.
    let _guard = app_state.user_locks.acquire(user_id).await;

    match app_state.db.has_active_subscription(user_id).await {
        Ok(true) => {
            info!(%user_id, "rejected create: subscription already active");
            return JsonResponse::conflict("Subscription already active").into_response();
        }
        Ok(false) => {}
        Err(err) => {
            error!(?err, %user_id, "failed to check active subscription");
            return JsonResponse::server_error("Failed to check subscription").into_response();
        }
    }

    let pending = match app_state.db.find_pending_subscription(user_id).await {
        Ok(pending) => pending,
        Err(err) => {
            error!(?err, %user_id, "failed to look up pending subscription");
            return JsonResponse::server_error("Failed to check subscription").into_response();
        }
    };

    if let Some(existing) = pending {
        let age = OffsetDateTime::now_utc() - existing.created_at;
        if age < REUSE_WINDOW {
            info!(
                %user_id,
                subscription_id = ?existing.subscription_id,
                "reusing pending subscription attempt"
            );
            return subscription_json(&existing, true);
        }

        // Abandoned attempt: retire the provider subscription first, then
        // the local record, then fall through to a fresh create.
        if let Some(subscription_id) = existing.subscription_id.as_deref() {
            match app_state.razorpay.cancel_subscription(subscription_id).await {
                Ok(()) => info!(%user_id, subscription_id, "cancelled stale subscription attempt"),
                Err(err) => {
                    warn!(?err, %user_id, subscription_id, "failed to cancel stale subscription attempt")
                }
            }
        }
        match app_state.db.mark_subscription_failed(existing.id).await {
            Ok(true) => {}
            Ok(false) => {
                // A webhook moved the attempt on while this request was in
                // flight; don't stack a second subscription on top of it.
                warn!(%user_id, record_id = %existing.id, "stale attempt advanced concurrently");
                return JsonResponse::conflict("Subscription state changed, please retry")
                    .into_response();
            }
            Err(err) => {
                error!(?err, %user_id, record_id = %existing.id, "failed to retire stale subscription attempt");
                return JsonResponse::server_error("Failed to create subscription").into_response();
            }
        }
    }

    let request = CreateSubscriptionRequest {
        plan_id: app_state.config.razorpay.pro_plan_id.clone(),
        total_count: SUBSCRIPTION_CYCLES,
        customer_notify: true,
        notes: Some(
            [("user_id".to_string(), user_id.to_string())]
                .into_iter()
                .collect(),
        ),
    };
    let subscription = match app_state.razorpay.create_subscription(request).await {
        Ok(subscription) => subscription,
        Err(err) => {
            // Nothing was persisted; the caller can simply retry.
            error!(?err, %user_id, "provider rejected subscription create");
            return JsonResponse::server_error("Subscription provider unavailable")
                .into_response();
        }
    };

    let record = NewSubscriptionRecord {
        user_id,
        subscription_id: subscription.id.clone(),
        plan_id: subscription.plan_id.clone(),
        short_url: subscription.short_url.clone(),
        amount: app_state.config.razorpay.plan_amount,
        currency: app_state.config.razorpay.plan_currency.clone(),
    };
    match app_state.db.create_subscription_record(record).await {
        Ok(record) => {
            info!(%user_id, subscription_id = %subscription.id, "created subscription attempt");
            subscription_json(&record, false)
        }
        Err(err) => {
            error!(?err, %user_id, subscription_id = %subscription.id, "failed to persist subscription record");
            // Don't leave a paid-for subscription dangling on the provider
            // with no local record to reconcile against.
            if let Err(cancel_err) = app_state.razorpay.cancel_subscription(&subscription.id).await
            {
                warn!(?cancel_err, subscription_id = %subscription.id, "failed to cancel unpersisted subscription");
            }
            JsonResponse::server_error("Failed to create subscription").into_response()
        }
    }
}

// GET /api/subscription-status
pub async fn subscription_status(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let user_id = match Uuid::parse_str(&claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid user ID").into_response(),
    };

    match app_state.db.find_latest_subscription(user_id).await {
        Ok(Some(record)) => Json(json!({
            "success": true,
            "status": record.status,
            "plan_id": record.plan_id,
        }))
        .into_response(),
        Ok(None) => Json(json!({
            "success": true,
            "status": "none",
            "plan_id": null,
        }))
        .into_response(),
        Err(err) => {
            error!(?err, %user_id, "failed to load subscription status");
            JsonResponse::server_error("Failed to load subscription status").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CreatePlanBody {
    pub name: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

// POST /api/admin/create-plan
pub async fn create_plan(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(body): Json<CreatePlanBody>,
) -> Response {
    if claims.role != Some(UserRole::Admin) {
        return JsonResponse::forbidden("Admin only").into_response();
    }

    let request = CreatePlanRequest {
        period: "monthly".into(),
        interval: 1,
        name: body.name,
        amount: body.amount.unwrap_or(app_state.config.razorpay.plan_amount),
        currency: body
            .currency
            .unwrap_or_else(|| app_state.config.razorpay.plan_currency.clone()),
        description: body.description,
    };

    match app_state.razorpay.create_plan(request).await {
        Ok(plan) => Json(json!({ "success": true, "plan_id": plan.id })).into_response(),
        Err(err) => {
            error!(?err, "failed to create provider plan");
            JsonResponse::server_error("Failed to create plan").into_response()
        }
    }
}
