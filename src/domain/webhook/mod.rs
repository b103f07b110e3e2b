//! Webhook context: signature schemes, normalized events and errors.

mod errors;
mod event;
pub mod signature;

pub use errors::WebhookError;
pub use event::{CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookOutcome};
pub use signature::SignatureHeader;
