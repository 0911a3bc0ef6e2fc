#![allow(dead_code)]
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::payment_repository::{
    BillingPeriod, NewSubscriptionRecord, PaymentRepository, TransitionOutcome,
};
use crate::models::payment::{PaymentKind, PaymentRecord, PaymentStatus, SubscriptionEvent};

/// In-memory stand-in for the payments table. Mirrors the conditional-update
/// semantics of the Postgres repository, including the one-pending-row-per-
/// user rule, so coordinator and applier tests exercise the same guards.
pub struct MockPaymentRepository {
    pub records: Mutex<Vec<PaymentRecord>>,
    pub should_fail: bool,
    /// Fails only the insert, for exercising the post-provider-accept path.
    pub fail_create_record: bool,
    pub mark_failed_calls: Mutex<Vec<Uuid>>,
}

impl Default for MockPaymentRepository {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            should_fail: false,
            fail_create_record: false,
            mark_failed_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: PaymentRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<PaymentRecord> {
        self.records.lock().unwrap().clone()
    }

    fn fail(&self) -> sqlx::Error {
        sqlx::Error::Protocol("mock payment repository failure".into())
    }
}

#[async_trait]
impl PaymentRepository for MockPaymentRepository {
    async fn find_pending_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        if self.should_fail {
            return Err(self.fail());
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.kind == PaymentKind::Subscription
                    && r.status == PaymentStatus::Created
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        if self.should_fail {
            return Err(self.fail());
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.kind == PaymentKind::Subscription)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn has_active_subscription(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(self.fail());
        }
        let records = self.records.lock().unwrap();
        Ok(records.iter().any(|r| {
            r.user_id == user_id
                && r.kind == PaymentKind::Subscription
                && r.status == PaymentStatus::Active
        }))
    }

    async fn create_subscription_record(
        &self,
        record: NewSubscriptionRecord,
    ) -> Result<PaymentRecord, sqlx::Error> {
        if self.should_fail || self.fail_create_record {
            return Err(self.fail());
        }
        let mut records = self.records.lock().unwrap();

        // Partial unique index: one pending subscription row per user.
        let pending_exists = records.iter().any(|r| {
            r.user_id == record.user_id
                && r.kind == PaymentKind::Subscription
                && r.status == PaymentStatus::Created
        });
        if pending_exists {
            return Err(sqlx::Error::Protocol(
                "duplicate pending subscription for user".into(),
            ));
        }

        let created = PaymentRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            subscription_id: Some(record.subscription_id),
            plan_id: Some(record.plan_id),
            short_url: record.short_url,
            kind: PaymentKind::Subscription,
            status: PaymentStatus::Created,
            amount: record.amount,
            currency: record.currency,
            current_period_start: None,
            current_period_end: None,
            next_charge_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        records.push(created.clone());
        Ok(created)
    }

    async fn mark_subscription_failed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        if self.should_fail {
            return Err(self.fail());
        }
        self.mark_failed_calls.lock().unwrap().push(id);
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records
            .iter_mut()
            .find(|r| r.id == id && r.status == PaymentStatus::Created)
        {
            record.status = PaymentStatus::Failed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn apply_subscription_event(
        &self,
        subscription_id: &str,
        event: SubscriptionEvent,
        period: Option<BillingPeriod>,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        if self.should_fail {
            return Err(self.fail());
        }
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.iter_mut().find(|r| {
            r.kind == PaymentKind::Subscription
                && r.subscription_id.as_deref() == Some(subscription_id)
        }) else {
            return Ok(TransitionOutcome::NotFound);
        };

        match record.status.transition(event) {
            Some(next) => {
                record.status = next;
                if let Some(period) = period {
                    if period.current_start.is_some() {
                        record.current_period_start = period.current_start;
                    }
                    if period.current_end.is_some() {
                        record.current_period_end = period.current_end;
                    }
                    if period.next_charge_at.is_some() {
                        record.next_charge_at = period.next_charge_at;
                    }
                }
                Ok(TransitionOutcome::Applied(record.clone()))
            }
            None => Ok(TransitionOutcome::Skipped(record.status)),
        }
    }
}
