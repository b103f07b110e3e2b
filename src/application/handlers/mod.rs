//! Application handlers.
//!
//! Command handlers that orchestrate domain operations across ports.

pub mod checkout;
pub mod webhooks;

pub use checkout::{CheckoutInitiator, InitiateCheckoutCommand, InitiateCheckoutHandler};
pub use webhooks::{ProcessWebhookCommand, WebhookProcessor};
