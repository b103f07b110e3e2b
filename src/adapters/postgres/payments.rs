//! PostgreSQL implementation of PaymentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::checkout::{Payment, PaymentStatus, ProviderKind, ProviderTransaction};
use crate::domain::foundation::{DomainError, ErrorCode, Money, OrderId, PaymentId};
use crate::ports::PaymentRepository;

use super::{db_error, is_unique_violation, parse_column};

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    provider: String,
    amount_cents: i64,
    currency: String,
    transaction_id: Option<String>,
    metadata: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            provider: parse_column("provider", &row.provider)?,
            amount: Money::new(row.amount_cents, &row.currency)?,
            transaction_id: row.transaction_id,
            metadata: row.metadata,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, order_id, provider, amount_cents, currency, transaction_id, metadata,
           status, created_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_PAYMENT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment"))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_transaction(
        &self,
        provider: ProviderKind,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE provider = $1 AND transaction_id = $2",
            SELECT_PAYMENT
        ))
        .bind(provider.as_str())
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load payment by transaction"))?;

        row.map(Payment::try_from).transpose()
    }

    async fn record_initiation(
        &self,
        id: &PaymentId,
        transaction: &ProviderTransaction,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET transaction_id = $2, metadata = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND transaction_id IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(&transaction.transaction_id)
        .bind(&transaction.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return DomainError::new(
                    ErrorCode::Conflict,
                    "Provider transaction already bound to another payment",
                )
                .with_detail("transaction_id", transaction.transaction_id.clone());
            }
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record initiation: {}", e),
            )
        })?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing updated: either the payment is gone or it was already bound.
        match self.find(id).await? {
            None => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", id),
            )),
            Some(_) => Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Payment {} already bound to a provider transaction", id),
            )),
        }
    }

    async fn settle(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to settle payment"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_map_to_payments() {
        let row = PaymentRow {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            provider: "coinpayments".to_string(),
            amount_cents: 2500,
            currency: "usd".to_string(),
            transaction_id: Some("CPTX1".to_string()),
            metadata: json!({ "txnId": "CPTX1" }),
            status: "completed".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let payment = Payment::try_from(row).unwrap();

        assert_eq!(payment.provider, ProviderKind::CoinPayments);
        assert_eq!(payment.amount, Money::new(2500, "USD").unwrap());
        assert_eq!(payment.status, PaymentStatus::Completed);
    }
}
