//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

use super::{db_error, parse_column};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    provider: String,
    event_id: String,
    event_type: String,
    processed_at: DateTime<Utc>,
    result: String,
    detail: Option<String>,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            provider: parse_column("provider", &row.provider)?,
            event_id: row.event_id,
            event_type: row.event_type,
            processed_at: row.processed_at,
            result: row.result,
            detail: row.detail,
            payload: row.payload,
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT provider, event_id, event_type, processed_at, result, detail, payload
            FROM processed_webhook_events
            WHERE provider = $1 AND event_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load webhook event"))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (
                provider, event_id, event_type, processed_at, result, detail, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.processed_at)
        .bind(&record.result)
        .bind(&record.detail)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save webhook event"))?;

        Ok(if result.rows_affected() == 1 {
            SaveResult::Inserted
        } else {
            SaveResult::AlreadyExists
        })
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_webhook_events WHERE processed_at < $1")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to purge webhook events"))?;

        Ok(result.rows_affected())
    }
}
