use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goldenvan_core::repository::PaymentStore;
use goldenvan_core::{CoreError, CoreResult, PaymentRecord, PaymentResolution, Settlement};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    reservation_id: Uuid,
    status: String,
    amount: Decimal,
    currency: String,
    transaction_id: Option<String>,
    superseded_transaction_ids: Vec<String>,
    attempts: i32,
    raw: Option<Json<serde_json::Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            id: row.id,
            reservation_id: row.reservation_id,
            status: row.status.parse().map_err(CoreError::internal)?,
            amount: row.amount,
            currency: row.currency,
            transaction_id: row.transaction_id,
            superseded_transaction_ids: row.superseded_transaction_ids,
            attempts: row.attempts.max(0) as u32,
            raw: row.raw.map(|Json(value)| value),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn open_attempt(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> CoreResult<PaymentRecord> {
        // The unique reservation_id keeps one record per reservation; a settled success is
        // never reopened.
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (id, reservation_id, status, amount, currency, attempts, created_at, updated_at)
            VALUES ($1, $2, 'PENDING', $3, $4, 1, NOW(), NOW())
            ON CONFLICT (reservation_id) DO UPDATE
            SET status = 'PENDING',
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                superseded_transaction_ids = CASE
                    WHEN payments.transaction_id IS NULL THEN payments.superseded_transaction_ids
                    ELSE array_append(payments.superseded_transaction_ids, payments.transaction_id)
                END,
                transaction_id = NULL,
                raw = NULL,
                attempts = payments.attempts + 1,
                updated_at = NOW()
            WHERE payments.status <> 'SUCCESS'
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reservation_id)
        .bind(amount)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        match row {
            Some(row) => row.try_into(),
            None => Err(CoreError::AlreadyFinalized(format!(
                "reservation {} has already been paid",
                reservation_id
            ))),
        }
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::internal)?
            .map(PaymentRecord::try_from)
            .transpose()
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<PaymentRecord>> {
        sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE reservation_id = $1")
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::internal)?
            .map(PaymentRecord::try_from)
            .transpose()
    }

    async fn settle(&self, id: Uuid, resolution: &PaymentResolution) -> CoreResult<Settlement> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2, transaction_id = $3, raw = $4, updated_at = NOW()
            WHERE id = $1
              AND status = 'PENDING'
              AND ($3::text IS NULL OR NOT ($3 = ANY(superseded_transaction_ids)))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(resolution.outcome.as_str())
        .bind(resolution.transaction_id.as_deref())
        .bind(resolution.raw.clone().map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::internal)?;

        if let Some(row) = row {
            return Ok(Settlement::Applied(row.try_into()?));
        }

        match self.get(id).await? {
            Some(existing) if existing.is_superseded(resolution.transaction_id.as_deref()) => {
                Ok(Settlement::Superseded(existing))
            }
            Some(existing) => Ok(Settlement::AlreadySettled(existing)),
            None => Err(CoreError::UnknownPayment(id.to_string())),
        }
    }
}
