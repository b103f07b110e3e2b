//! Shop item definitions: what a guild sells and how it is delivered.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{GuildId, Money, RoleId, ShopItemId, ValidationError};

/// Entitlement-granting strategy for a shop item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Role,
    Code,
    Prefilled,
    Subscription,
    None,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Role => "role",
            DeliveryType::Code => "code",
            DeliveryType::Prefilled => "prefilled",
            DeliveryType::Subscription => "subscription",
            DeliveryType::None => "none",
        }
    }
}

impl FromStr for DeliveryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "role" => Ok(DeliveryType::Role),
            "code" => Ok(DeliveryType::Code),
            "prefilled" => Ok(DeliveryType::Prefilled),
            "subscription" => Ok(DeliveryType::Subscription),
            "none" => Ok(DeliveryType::None),
            other => Err(ValidationError::invalid_format(
                "delivery_type",
                format!("unknown delivery type '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    OneTime,
    Subscription,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::OneTime => "one_time",
            BillingType::Subscription => "subscription",
        }
    }
}

impl FromStr for BillingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(BillingType::OneTime),
            "subscription" => Ok(BillingType::Subscription),
            other => Err(ValidationError::invalid_format(
                "billing_type",
                format!("unknown billing type '{}'", other),
            )),
        }
    }
}

/// A purchasable entitlement. Immutable while a purchase is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopItem {
    pub id: ShopItemId,
    pub guild_id: GuildId,
    pub name: String,
    pub delivery_type: DeliveryType,
    pub billing_type: BillingType,
    pub discord_role_id: Option<RoleId>,
    pub price: Money,
}

impl ShopItem {
    /// Recurring items keep a subscription row alive alongside the role.
    pub fn is_recurring(&self) -> bool {
        self.billing_type == BillingType::Subscription
            || self.delivery_type == DeliveryType::Subscription
    }

    pub fn grants_role(&self) -> bool {
        matches!(
            self.delivery_type,
            DeliveryType::Role | DeliveryType::Subscription
        )
    }
}
