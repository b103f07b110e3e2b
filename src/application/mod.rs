//! Application layer - command handlers and the services they share.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Handlers own the ordering of side effects: provider call, guarded state
//! transition, fulfillment, then post-commit hooks.

pub mod fulfillment;
pub mod handlers;
pub mod post_commit;

pub use fulfillment::{Delivery, FulfillmentEngine, FulfillmentError, Purchase, Revocation, RoleGrant};
pub use handlers::{
    CheckoutInitiator, InitiateCheckoutCommand, InitiateCheckoutHandler, ProcessWebhookCommand,
    WebhookProcessor,
};
pub use post_commit::{AuditHook, CommittedEvent, HookError, NotifyHook, PostCommitHook, PostCommitHooks};
