//! PostgreSQL implementation of AuditLog.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::DomainError;
use crate::ports::AuditLog;

use super::db_error;

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, guild_id, actor, action, subject, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.guild_id.as_ref().map(|g| g.as_str()))
        .bind(&entry.actor)
        .bind(entry.action.as_str())
        .bind(&entry.subject)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to append audit entry"))?;

        Ok(())
    }
}
