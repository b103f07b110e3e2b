//! Guild shop persistence port.

use async_trait::async_trait;

use crate::domain::foundation::{ChannelId, CouponId, DiscordUserId, DomainError, GuildId, ShopItemId};
use crate::domain::shop::{ClaimOutcome, Coupon, ShopCode, ShopItem, ShopOrder};

#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn find_item(&self, id: &ShopItemId) -> Result<Option<ShopItem>, DomainError>;

    /// Inserts the order unless `(provider, transaction_id)` already exists.
    /// A conflict is reported as `AlreadyClaimed`, never as an error.
    async fn claim_order(&self, order: &ShopOrder) -> Result<ClaimOutcome, DomainError>;

    async fn insert_code(&self, code: &ShopCode) -> Result<(), DomainError>;

    /// Removes one pool code for (guild, item) and records it as issued to
    /// the buyer, in a single atomic step. `None` when the pool is empty.
    async fn take_prefilled_code(
        &self,
        guild_id: &GuildId,
        shop_item_id: &ShopItemId,
        buyer: &DiscordUserId,
        transaction_id: &str,
    ) -> Result<Option<ShopCode>, DomainError>;

    async fn find_coupon(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError>;

    /// Writes back the redemption counter read by `find_coupon`.
    async fn save_coupon_redemptions(&self, coupon: &Coupon) -> Result<(), DomainError>;

    /// Channel where purchases are announced, if the guild set one.
    async fn announcement_channel(&self, guild_id: &GuildId) -> Result<Option<ChannelId>, DomainError>;
}
