//! Internal bot API port - the only way this service mutates Discord.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{ChannelId, DiscordUserId, GuildId, RoleId};

#[derive(Debug, Clone, Error)]
pub enum BotApiError {
    #[error("bot API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("bot API unreachable: {0}")]
    Transport(String),
}

/// Calls are not retried here; failures are reported to the caller, which
/// logs them for manual remediation.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn add_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError>;

    async fn remove_role(
        &self,
        guild_id: &GuildId,
        user_id: &DiscordUserId,
        role_id: &RoleId,
    ) -> Result<(), BotApiError>;

    async fn send_message(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<(), BotApiError>;
}
