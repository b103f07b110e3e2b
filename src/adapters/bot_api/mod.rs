//! Internal bot API adapters.
//!
//! - `HttpBotApi` - role grants/revokes and channel messages over HTTP
//! - `ChannelAnnouncer` - `NotificationSink` posting to the guild's
//!   announcement channel through the bot API

mod channel_announcer;
mod http_bot_api;

pub use channel_announcer::ChannelAnnouncer;
pub use http_bot_api::{HttpBotApi, SECRET_HEADER};
