use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::payment_repository::{
    BillingPeriod, NewSubscriptionRecord, PaymentRepository, TransitionOutcome,
};
use crate::models::payment::{PaymentRecord, PaymentStatus, SubscriptionEvent};

const RECORD_COLUMNS: &str = r#"
    id, user_id, subscription_id, plan_id, short_url, kind, status,
    amount, currency, current_period_start, current_period_end,
    next_charge_at, created_at
"#;

pub struct PostgresPaymentRepository {
    pub pool: PgPool,
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find_pending_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM payments
            WHERE user_id = $1
              AND kind = 'subscription'::payment_kind
              AND status = 'created'::payment_status
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM payments
            WHERE user_id = $1
              AND kind = 'subscription'::payment_kind
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_active_subscription(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT 1
            FROM payments
            WHERE user_id = $1
              AND kind = 'subscription'::payment_kind
              AND status = 'active'::payment_status
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        Ok(exists)
    }

    async fn create_subscription_record(
        &self,
        record: NewSubscriptionRecord,
    ) -> Result<PaymentRecord, sqlx::Error> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            r#"
            INSERT INTO payments (user_id, subscription_id, plan_id, short_url, kind, status, amount, currency)
            VALUES ($1, $2, $3, $4, 'subscription'::payment_kind, 'created'::payment_status, $5, $6)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(record.user_id)
        .bind(&record.subscription_id)
        .bind(&record.plan_id)
        .bind(&record.short_url)
        .bind(record.amount)
        .bind(&record.currency)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_subscription_failed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed'::payment_status
            WHERE id = $1
              AND status = 'created'::payment_status
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_subscription_event(
        &self,
        subscription_id: &str,
        event: SubscriptionEvent,
        period: Option<BillingPeriod>,
    ) -> Result<TransitionOutcome, sqlx::Error> {
        let period = period.unwrap_or_default();

        // The WHERE clause is the transition guard: only non-terminal rows
        // move, and the whole read-modify-write is one statement.
        let updated = sqlx::query_as::<_, PaymentRecord>(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                current_period_start = COALESCE($3, current_period_start),
                current_period_end = COALESCE($4, current_period_end),
                next_charge_at = COALESCE($5, next_charge_at)
            WHERE subscription_id = $1
              AND kind = 'subscription'::payment_kind
              AND status IN ('created'::payment_status, 'active'::payment_status)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(subscription_id)
        .bind(event.target_status())
        .bind(period.current_start)
        .bind(period.current_end)
        .bind(period.next_charge_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = updated {
            return Ok(TransitionOutcome::Applied(record));
        }

        // Zero rows: either the record is terminal or the id is unknown.
        let current = sqlx::query_scalar::<_, PaymentStatus>(
            r#"
            SELECT status
            FROM payments
            WHERE subscription_id = $1
              AND kind = 'subscription'::payment_kind
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            Some(status) => Ok(TransitionOutcome::Skipped(status)),
            None => Ok(TransitionOutcome::NotFound),
        }
    }
}
