//! AuditLog port - append-only record of state-changing actions.

use async_trait::async_trait;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError>;
}
