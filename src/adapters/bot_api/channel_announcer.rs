//! Notification sink that posts to the guild's announcement channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ports::{BotApi, Notification, NotificationError, NotificationSink, ShopRepository};

/// Posts through the bot API. Guilds without an announcement channel are
/// silently skipped.
pub struct ChannelAnnouncer {
    shop: Arc<dyn ShopRepository>,
    bot: Arc<dyn BotApi>,
}

impl ChannelAnnouncer {
    pub fn new(shop: Arc<dyn ShopRepository>, bot: Arc<dyn BotApi>) -> Self {
        Self { shop, bot }
    }
}

#[async_trait]
impl NotificationSink for ChannelAnnouncer {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let channel = self
            .shop
            .announcement_channel(&notification.guild_id)
            .await
            .map_err(|e| NotificationError(e.to_string()))?;

        let Some(channel) = channel else {
            tracing::debug!(
                guild_id = %notification.guild_id,
                "no announcement channel configured"
            );
            return Ok(());
        };

        self.bot
            .send_message(&notification.guild_id, &channel, &notification.content)
            .await
            .map_err(|e| NotificationError(e.to_string()))
    }
}
