//! Order aggregate: a purchase intent created by the dashboard.
//!
//! The checkout core never creates orders. It only moves them out of
//! `pending` once a payment outcome is known.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{
    DiscordUserId, GuildId, OrderId, ShopItemId, StateMachine, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    OneTime,
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, BillingPeriod::OneTime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::OneTime => "one_time",
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Yearly => "yearly",
        }
    }

    /// Stripe `recurring.interval` value.
    pub fn interval(&self) -> Option<&'static str> {
        match self {
            BillingPeriod::OneTime => None,
            BillingPeriod::Monthly => Some("month"),
            BillingPeriod::Yearly => Some("year"),
        }
    }
}

impl FromStr for BillingPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(BillingPeriod::OneTime),
            "monthly" => Ok(BillingPeriod::Monthly),
            "yearly" => Ok(BillingPeriod::Yearly),
            other => Err(ValidationError::invalid_format(
                "billing_period",
                format!("unknown period '{}'", other),
            )),
        }
    }
}

/// What an order buys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderItem {
    /// A premium tier of the bot itself.
    Tier {
        tier: String,
        billing_period: BillingPeriod,
    },
    /// An item from a guild's shop.
    ShopItem {
        shop_item_id: ShopItemId,
        name: String,
        billing_period: BillingPeriod,
    },
}

impl OrderItem {
    /// Line item label shown on the provider's hosted page.
    pub fn description(&self) -> String {
        match self {
            OrderItem::Tier { tier, billing_period } => match billing_period {
                BillingPeriod::OneTime => format!("{} tier", tier),
                period => format!("{} tier ({})", tier, period.as_str()),
            },
            OrderItem::ShopItem { name, .. } => name.clone(),
        }
    }

    pub fn billing_period(&self) -> BillingPeriod {
        match self {
            OrderItem::Tier { billing_period, .. } | OrderItem::ShopItem { billing_period, .. } => {
                *billing_period
            }
        }
    }

    pub fn shop_item_id(&self) -> Option<ShopItemId> {
        match self {
            OrderItem::ShopItem { shop_item_id, .. } => Some(*shop_item_id),
            OrderItem::Tier { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "order_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (OrderStatus::Pending, OrderStatus::Paid) | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            OrderStatus::Pending => vec![OrderStatus::Paid, OrderStatus::Failed],
            OrderStatus::Paid | OrderStatus::Failed => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable reference shown to buyers and support.
    pub order_number: String,
    pub guild_id: Option<GuildId>,
    pub buyer: DiscordUserId,
    pub item: OrderItem,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Whose provider account collects the money: the guild for shop
    /// items, the platform for tiers.
    pub fn config_owner(&self) -> Option<&GuildId> {
        match self.item {
            OrderItem::ShopItem { .. } => self.guild_id.as_ref(),
            OrderItem::Tier { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_orders_settle_once() {
        assert!(OrderStatus::Pending.can_transition_to(&OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(&OrderStatus::Failed));
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Failed.transition_to(OrderStatus::Paid).is_err());
    }

    #[test]
    fn tier_description_mentions_period() {
        let item = OrderItem::Tier {
            tier: "Premium".to_string(),
            billing_period: BillingPeriod::Monthly,
        };
        assert_eq!(item.description(), "Premium tier (monthly)");
        assert!(item.billing_period().is_recurring());
        assert_eq!(item.shop_item_id(), None);
    }

    #[test]
    fn billing_period_maps_to_stripe_interval() {
        assert_eq!(BillingPeriod::OneTime.interval(), None);
        assert_eq!(BillingPeriod::Yearly.interval(), Some("year"));
        assert_eq!("monthly".parse::<BillingPeriod>().unwrap(), BillingPeriod::Monthly);
    }
}
