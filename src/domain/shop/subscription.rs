//! Recurring entitlement state.
//!
//! One row per (guild, item, user). Cancelled rows are kept for audit
//! continuity; a later re-subscription reactivates the same row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{
    DiscordUserId, GuildId, ShopItemId, StateMachine, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (SubscriptionStatus::Active, SubscriptionStatus::Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            SubscriptionStatus::Active => vec![SubscriptionStatus::Cancelled],
            SubscriptionStatus::Cancelled => vec![],
        }
    }
}

/// Natural key of a shop subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub guild_id: GuildId,
    pub shop_item_id: ShopItemId,
    pub discord_user_id: DiscordUserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopSubscription {
    pub key: SubscriptionKey,
    /// Provider-side subscription id (`sub_...` for Stripe).
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopSubscription {
    pub fn activate(
        key: SubscriptionKey,
        provider_subscription_id: impl Into<String>,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            provider_subscription_id: provider_subscription_id.into(),
            status: SubscriptionStatus::Active,
            current_period_end,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(SubscriptionStatus::Cancelled)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SubscriptionKey {
        SubscriptionKey {
            guild_id: GuildId::new("1").unwrap(),
            shop_item_id: ShopItemId::new(),
            discord_user_id: DiscordUserId::new("2").unwrap(),
        }
    }

    #[test]
    fn cancellation_is_terminal() {
        let mut sub = ShopSubscription::activate(key(), "sub_1", None);
        assert!(sub.is_active());
        sub.cancel().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert!(sub.cancel().is_err());
    }
}
