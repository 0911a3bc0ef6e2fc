use core::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::Type, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Type, Debug, Deserialize, Serialize, PartialEq, Eq, Copy, Clone)]
#[sqlx(type_name = "payment_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Order,
    Subscription,
}

#[derive(Type, Debug, Deserialize, Serialize, PartialEq, Eq, Copy, Clone)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Active,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Active => "active",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
        }
    }

    /// No transition leaves `cancelled` or `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled | PaymentStatus::Failed)
    }

    /// Next status for a verified provider event, or `None` when the record
    /// is already terminal and the event must be absorbed as a no-op.
    ///
    /// Transitions only ever move forward or hold, so redelivered and
    /// out-of-order events are safe: a late `activated` after `cancelled`
    /// lands in the terminal no-op arm.
    pub fn transition(self, event: SubscriptionEvent) -> Option<PaymentStatus> {
        if self.is_terminal() {
            return None;
        }
        Some(event.target_status())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider lifecycle notifications the applier acts on. Every other event
/// type is acknowledged without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Activated,
    Charged,
    Cancelled,
    PaymentFailed,
}

impl SubscriptionEvent {
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "subscription.activated" => Some(SubscriptionEvent::Activated),
            "subscription.charged" => Some(SubscriptionEvent::Charged),
            "subscription.cancelled" => Some(SubscriptionEvent::Cancelled),
            "payment.failed" => Some(SubscriptionEvent::PaymentFailed),
            _ => None,
        }
    }

    /// Target status for a non-terminal record. The target depends only on
    /// the event, which is what makes redelivery idempotent.
    pub fn target_status(self) -> PaymentStatus {
        match self {
            SubscriptionEvent::Activated | SubscriptionEvent::Charged => PaymentStatus::Active,
            SubscriptionEvent::Cancelled => PaymentStatus::Cancelled,
            SubscriptionEvent::PaymentFailed => PaymentStatus::Failed,
        }
    }

    /// Activation and charge events carry fresh billing-cycle timestamps.
    pub fn refreshes_period(self) -> bool {
        matches!(
            self,
            SubscriptionEvent::Activated | SubscriptionEvent::Charged
        )
    }
}

/// One subscription or order attempt. Multiple rows per user accumulate over
/// time; rows are never deleted, only moved through the status machine.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<String>,
    pub plan_id: Option<String>,
    pub short_url: Option<String>,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub current_period_start: Option<OffsetDateTime>,
    pub current_period_end: Option<OffsetDateTime>,
    pub next_charge_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}
