//! Provider webhook handling.

mod process_webhook;

pub use process_webhook::{ProcessWebhookCommand, WebhookProcessor};
