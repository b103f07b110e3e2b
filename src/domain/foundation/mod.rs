//! Foundation module - Shared domain primitives.
//!
//! Identifiers, money, error types and the state machine trait shared by
//! the checkout, shop and webhook contexts.

mod errors;
mod ids;
mod money;
mod state_machine;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ChannelId, CouponId, DiscordUserId, GuildId, OrderId, PaymentId, RoleId, ShopItemId};
pub use money::Money;
pub use state_machine::StateMachine;
