//! NotificationSink port - best-effort purchase and cancellation announcements.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::GuildId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Purchase,
    Cancellation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub guild_id: GuildId,
    pub kind: NotificationKind,
    pub content: String,
}

#[derive(Debug, Clone, Error)]
#[error("notification failed: {0}")]
pub struct NotificationError(pub String);

/// Failures are reported but callers never let them affect fulfillment.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}
