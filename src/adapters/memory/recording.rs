//! Recording doubles for side-effect ports: audit log, bot API, notifications.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::{ChannelId, DiscordUserId, DomainError, GuildId, RoleId};
use crate::ports::{
    AuditLog, BotApi, BotApiError, Notification, NotificationError, NotificationSink,
};

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), DomainError> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}

/// (guild, user, role) as plain strings for easy assertions.
pub type RoleCall = (String, String, String);

#[derive(Default)]
struct BotCalls {
    added: Vec<RoleCall>,
    removed: Vec<RoleCall>,
    messages: Vec<(String, String, String)>,
}

/// Records every call. `failing()` answers each one with a 503.
#[derive(Default)]
pub struct RecordingBotApi {
    calls: RwLock<BotCalls>,
    fail: bool,
}

impl RecordingBotApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn added(&self) -> Vec<RoleCall> {
        self.calls.read().await.added.clone()
    }

    pub async fn removed(&self) -> Vec<RoleCall> {
        self.calls.read().await.removed.clone()
    }

    pub async fn messages(&self) -> Vec<(String, String, String)> {
        self.calls.read().await.messages.clone()
    }

    fn outcome(&self) -> Result<(), BotApiError> {
        if self.fail {
            Err(BotApiError::Status {
                status: 503,
                body: "bot unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn role_call(guild_id: &GuildId, user_id: &DiscordUserId, role_id: &RoleId) -> RoleCall {
    (
        guild_id.to_string(),
        user_id.to_string(),
        role_id.to_string(),
    )
}

#[async_trait]
impl BotApi for RecordingBotApi {
    async fn add_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError> {
        self.calls
            .write()
            .await
            .added
            .push(role_call(guild_id, user_id, role_id));
        self.outcome()
    }

    async fn remove_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError> {
        self.calls
            .write()
            .await
            .removed
            .push(role_call(guild_id, user_id, role_id));
        self.outcome()
    }

    async fn send_message(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<(), BotApiError> {
        self.calls.write().await.messages.push((
            guild_id.to_string(),
            channel_id.to_string(),
            content.to_string(),
        ));
        self.outcome()
    }
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: RwLock<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError("sink unavailable".to_string()));
        }
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}
