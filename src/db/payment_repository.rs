use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::payment::{PaymentRecord, PaymentStatus, SubscriptionEvent};

/// Insert payload for a subscription attempt. Records are only created after
/// the provider has accepted the create call, so the provider id is always
/// known here.
#[derive(Debug, Clone)]
pub struct NewSubscriptionRecord {
    pub user_id: Uuid,
    pub subscription_id: String,
    pub plan_id: String,
    pub short_url: Option<String>,
    pub amount: i64,
    pub currency: String,
}

/// Billing-cycle timestamps carried by activation/charge events.
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingPeriod {
    pub current_start: Option<OffsetDateTime>,
    pub current_end: Option<OffsetDateTime>,
    pub next_charge_at: Option<OffsetDateTime>,
}

/// Result of a guarded status transition. Callers must handle each variant;
/// none of these are errors.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The conditional update matched and the record now reflects the event.
    Applied(PaymentRecord),
    /// The record exists but is terminal; the event was absorbed.
    Skipped(PaymentStatus),
    /// No record carries this subscription id (orphan event).
    NotFound,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Most recent pending (`created`) subscription attempt for a user.
    async fn find_pending_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error>;

    /// Most recent subscription row for a user regardless of status.
    async fn find_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error>;

    async fn has_active_subscription(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn create_subscription_record(
        &self,
        record: NewSubscriptionRecord,
    ) -> Result<PaymentRecord, sqlx::Error>;

    /// Retire an abandoned attempt. Conditional on the row still being
    /// `created`; returns whether a row was updated.
    async fn mark_subscription_failed(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// Apply a verified provider event as a single atomic read-modify-write.
    ///
    /// The update is guarded on the current persisted status being
    /// non-terminal, so redelivered and out-of-order events cannot regress
    /// or double-apply a transition. Period fields are only touched when the
    /// event carries replacements.
    async fn apply_subscription_event(
        &self,
        subscription_id: &str,
        event: SubscriptionEvent,
        period: Option<BillingPeriod>,
    ) -> Result<TransitionOutcome, sqlx::Error>;
}
