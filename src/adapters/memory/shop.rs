//! In-memory guild shop repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::{
    ChannelId, CouponId, DiscordUserId, DomainError, GuildId, ShopItemId,
};
use crate::domain::shop::{ClaimOutcome, Coupon, PrefilledCode, ShopCode, ShopItem, ShopOrder};
use crate::ports::ShopRepository;

#[derive(Default)]
struct State {
    items: HashMap<ShopItemId, ShopItem>,
    orders: HashMap<(ProviderKind, String), ShopOrder>,
    codes: Vec<ShopCode>,
    /// Unclaimed pool entries in insertion order.
    prefilled: Vec<PrefilledCode>,
    coupons: HashMap<CouponId, Coupon>,
    channels: HashMap<GuildId, ChannelId>,
    failing_item_lookups: usize,
    failing_claims: usize,
}

#[derive(Default)]
pub struct InMemoryShopRepository {
    state: RwLock<State>,
}

impl InMemoryShopRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_item(&self, item: ShopItem) {
        self.state.write().await.items.insert(item.id, item);
    }

    pub async fn add_prefilled(&self, guild_id: &GuildId, shop_item_id: &ShopItemId, code: &str) {
        self.state.write().await.prefilled.push(PrefilledCode {
            id: Uuid::new_v4(),
            guild_id: guild_id.clone(),
            shop_item_id: *shop_item_id,
            code: code.to_string(),
        });
    }

    pub async fn add_coupon(&self, coupon: Coupon) {
        self.state.write().await.coupons.insert(coupon.id, coupon);
    }

    /// The next `find_item` call fails with a database error.
    pub async fn fail_next_item_lookup(&self) {
        self.state.write().await.failing_item_lookups += 1;
    }

    /// The next `claim_order` call fails with a database error.
    pub async fn fail_next_claim(&self) {
        self.state.write().await.failing_claims += 1;
    }

    pub async fn set_announcement_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.state.write().await.channels.insert(guild_id, channel_id);
    }

    pub async fn orders(&self) -> Vec<ShopOrder> {
        self.state.read().await.orders.values().cloned().collect()
    }

    /// Minted and handed-out prefilled codes alike.
    pub async fn codes(&self) -> Vec<ShopCode> {
        self.state.read().await.codes.clone()
    }

    pub async fn coupon(&self, id: &CouponId) -> Option<Coupon> {
        self.state.read().await.coupons.get(id).cloned()
    }

    pub async fn remaining_prefilled(&self, shop_item_id: &ShopItemId) -> usize {
        self.state
            .read()
            .await
            .prefilled
            .iter()
            .filter(|c| &c.shop_item_id == shop_item_id)
            .count()
    }
}

#[async_trait]
impl ShopRepository for InMemoryShopRepository {
    async fn find_item(&self, id: &ShopItemId) -> Result<Option<ShopItem>, DomainError> {
        let mut state = self.state.write().await;
        if state.failing_item_lookups > 0 {
            state.failing_item_lookups -= 1;
            return Err(DomainError::database("injected item lookup failure"));
        }
        Ok(state.items.get(id).cloned())
    }

    async fn claim_order(&self, order: &ShopOrder) -> Result<ClaimOutcome, DomainError> {
        let mut state = self.state.write().await;
        if state.failing_claims > 0 {
            state.failing_claims -= 1;
            return Err(DomainError::database("injected claim failure"));
        }
        let key = (order.provider, order.transaction_id.clone());
        if state.orders.contains_key(&key) {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        state.orders.insert(key, order.clone());
        Ok(ClaimOutcome::Claimed)
    }

    async fn insert_code(&self, code: &ShopCode) -> Result<(), DomainError> {
        self.state.write().await.codes.push(code.clone());
        Ok(())
    }

    async fn take_prefilled_code(
        &self,
        guild_id: &GuildId,
        shop_item_id: &ShopItemId,
        buyer: &DiscordUserId,
        transaction_id: &str,
    ) -> Result<Option<ShopCode>, DomainError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .prefilled
            .iter()
            .position(|c| &c.guild_id == guild_id && &c.shop_item_id == shop_item_id)
        else {
            return Ok(None);
        };
        let entry = state.prefilled.remove(index);
        let code = ShopCode {
            code: entry.code,
            guild_id: guild_id.clone(),
            shop_item_id: *shop_item_id,
            discord_user_id: buyer.clone(),
            transaction_id: transaction_id.to_string(),
            created_at: Utc::now(),
        };
        state.codes.push(code.clone());
        Ok(Some(code))
    }

    async fn find_coupon(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        Ok(self.coupon(id).await)
    }

    async fn save_coupon_redemptions(&self, coupon: &Coupon) -> Result<(), DomainError> {
        if let Some(stored) = self.state.write().await.coupons.get_mut(&coupon.id) {
            stored.redemption_count = coupon.redemption_count;
        }
        Ok(())
    }

    async fn announcement_channel(&self, guild_id: &GuildId) -> Result<Option<ChannelId>, DomainError> {
        Ok(self.state.read().await.channels.get(guild_id).cloned())
    }
}
