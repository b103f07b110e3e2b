//! Purchase metadata attached to provider-side transactions.
//!
//! Written at initiation, echoed back verbatim by the provider inside the
//! signed webhook body. Because the body is signed with a per-guild secret,
//! the guild id read from here must still be matched against the guild the
//! request was addressed to.

use std::collections::HashMap;

use crate::domain::foundation::{
    CouponId, DiscordUserId, GuildId, OrderId, PaymentId, ShopItemId, ValidationError,
};

pub const ORDER_ID: &str = "order_id";
pub const PAYMENT_ID: &str = "payment_id";
pub const GUILD_ID: &str = "guild_id";
pub const DISCORD_USER_ID: &str = "discord_user_id";
pub const SHOP_ITEM_ID: &str = "shop_item_id";
pub const COUPON_ID: &str = "coupon_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseMetadata {
    pub order_id: Option<OrderId>,
    pub payment_id: Option<PaymentId>,
    pub guild_id: Option<GuildId>,
    pub discord_user_id: Option<DiscordUserId>,
    pub shop_item_id: Option<ShopItemId>,
    pub coupon_id: Option<CouponId>,
}

impl PurchaseMetadata {
    /// Flattened key/value pairs, the shape every provider accepts.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.order_id {
            pairs.push((ORDER_ID, id.to_string()));
        }
        if let Some(id) = &self.payment_id {
            pairs.push((PAYMENT_ID, id.to_string()));
        }
        if let Some(id) = &self.guild_id {
            pairs.push((GUILD_ID, id.to_string()));
        }
        if let Some(id) = &self.discord_user_id {
            pairs.push((DISCORD_USER_ID, id.to_string()));
        }
        if let Some(id) = &self.shop_item_id {
            pairs.push((SHOP_ITEM_ID, id.to_string()));
        }
        if let Some(id) = &self.coupon_id {
            pairs.push((COUPON_ID, id.to_string()));
        }
        pairs
    }

    /// Parses provider-echoed metadata. Empty values count as absent;
    /// malformed values are rejected rather than silently dropped.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ValidationError> {
        fn field<T, E>(
            map: &HashMap<String, String>,
            key: &'static str,
            parse: impl Fn(&str) -> Result<T, E>,
        ) -> Result<Option<T>, ValidationError> {
            match map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                None => Ok(None),
                Some(raw) => parse(raw)
                    .map(Some)
                    .map_err(|_| ValidationError::invalid_format(key, "malformed metadata value")),
            }
        }

        Ok(Self {
            order_id: field(map, ORDER_ID, str::parse::<OrderId>)?,
            payment_id: field(map, PAYMENT_ID, str::parse::<PaymentId>)?,
            guild_id: field(map, GUILD_ID, str::parse::<GuildId>)?,
            discord_user_id: field(map, DISCORD_USER_ID, str::parse::<DiscordUserId>)?,
            shop_item_id: field(map, SHOP_ITEM_ID, str::parse::<ShopItemId>)?,
            coupon_id: field(map, COUPON_ID, str::parse::<CouponId>)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_parse_back_to_the_same_metadata() {
        let meta = PurchaseMetadata {
            order_id: Some(OrderId::new()),
            guild_id: Some(GuildId::new("111").unwrap()),
            discord_user_id: Some(DiscordUserId::new("222").unwrap()),
            shop_item_id: Some(ShopItemId::new()),
            ..Default::default()
        };
        let map: HashMap<String, String> = meta
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(PurchaseMetadata::from_map(&map).unwrap(), meta);
    }

    #[test]
    fn blank_values_are_absent() {
        let map = HashMap::from([(COUPON_ID.to_string(), "".to_string())]);
        let meta = PurchaseMetadata::from_map(&map).unwrap();
        assert!(meta.coupon_id.is_none());
        assert!(meta.is_empty());
    }

    #[test]
    fn malformed_guild_is_rejected() {
        let map = HashMap::from([(GUILD_ID.to_string(), "guild-a".to_string())]);
        assert!(PurchaseMetadata::from_map(&map).is_err());
    }
}
