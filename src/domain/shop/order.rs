//! Completed guild shop purchases.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::{CouponId, DiscordUserId, GuildId, Money, OrderId, ShopItemId};

/// One row per provider transaction. The `(provider, transaction_id)` pair
/// is unique in storage: inserting it is how a handler claims the right to
/// fulfill a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopOrder {
    pub id: Uuid,
    pub guild_id: GuildId,
    pub shop_item_id: ShopItemId,
    pub discord_user_id: DiscordUserId,
    pub provider: ProviderKind,
    pub transaction_id: String,
    pub amount: Money,
    pub coupon_id: Option<CouponId>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to claim a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// Another delivery of the same transaction got there first.
    AlreadyClaimed,
}
