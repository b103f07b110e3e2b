//! FulfillmentEngine - delivers what a confirmed payment bought.
//!
//! Runs only after the shop order claim succeeded, so each purchase is
//! delivered at most once. Bot API failures never undo the payment: they are
//! logged and audited for manual remediation and the webhook still acks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::checkout::{ProviderConfig, ProviderKind};
use crate::domain::foundation::{DiscordUserId, DomainError, GuildId, RoleId};
use crate::domain::shop::{DeliveryType, ShopCode, ShopItem, ShopSubscription, SubscriptionKey};
use crate::ports::{BotApi, ProviderFactory, ShopRepository, SubscriptionRepository};

use super::post_commit::{CommittedEvent, PostCommitHooks};

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Recurring item purchased without a provider subscription id")]
    MissingSubscriptionId,

    #[error(transparent)]
    Storage(#[from] DomainError),
}

/// A claimed purchase ready for delivery.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub guild_id: GuildId,
    pub buyer: DiscordUserId,
    pub item: ShopItem,
    pub provider: ProviderKind,
    pub transaction_id: String,
    pub subscription_id: Option<String>,
    /// Used to look up the billing period of new subscriptions.
    pub config: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleGrant {
    Granted(RoleId),
    Failed { role: RoleId, error: String },
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Role(RoleGrant),
    Subscription {
        provider_subscription_id: String,
        current_period_end: Option<DateTime<Utc>>,
        role: RoleGrant,
    },
    Code(String),
    Prefilled(String),
    PoolExhausted,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revocation {
    Revoked(RoleId),
    Failed { role: RoleId, error: String },
    NoRole,
}

pub struct FulfillmentEngine {
    shop: Arc<dyn ShopRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    bot: Arc<dyn BotApi>,
    providers: Arc<dyn ProviderFactory>,
    hooks: Arc<PostCommitHooks>,
}

impl FulfillmentEngine {
    pub fn new(
        shop: Arc<dyn ShopRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        bot: Arc<dyn BotApi>,
        providers: Arc<dyn ProviderFactory>,
        hooks: Arc<PostCommitHooks>,
    ) -> Self {
        Self {
            shop,
            subscriptions,
            bot,
            providers,
            hooks,
        }
    }

    pub async fn fulfill(&self, purchase: &Purchase) -> Result<Delivery, FulfillmentError> {
        let item = &purchase.item;
        let delivery = if item.is_recurring() && item.grants_role() {
            self.activate_subscription(purchase).await?
        } else {
            match item.delivery_type {
                DeliveryType::Role | DeliveryType::Subscription => {
                    Delivery::Role(self.grant_role(purchase).await)
                }
                DeliveryType::Code => {
                    let code = ShopCode::mint(
                        purchase.guild_id.clone(),
                        item.id,
                        purchase.buyer.clone(),
                        purchase.transaction_id.clone(),
                    );
                    self.shop.insert_code(&code).await?;
                    Delivery::Code(code.code)
                }
                DeliveryType::Prefilled => match self
                    .shop
                    .take_prefilled_code(
                        &purchase.guild_id,
                        &item.id,
                        &purchase.buyer,
                        &purchase.transaction_id,
                    )
                    .await?
                {
                    Some(code) => Delivery::Prefilled(code.code),
                    None => {
                        tracing::error!(
                            guild_id = %purchase.guild_id,
                            shop_item_id = %item.id,
                            buyer = %purchase.buyer,
                            transaction_id = %purchase.transaction_id,
                            "prefilled code pool exhausted; buyer paid and needs a code"
                        );
                        Delivery::PoolExhausted
                    }
                },
                DeliveryType::None => Delivery::Nothing,
            }
        };

        tracing::info!(
            guild_id = %purchase.guild_id,
            shop_item_id = %item.id,
            delivery_type = item.delivery_type.as_str(),
            transaction_id = %purchase.transaction_id,
            "purchase fulfilled"
        );

        self.hooks
            .run(&CommittedEvent::Fulfilled {
                guild_id: purchase.guild_id.clone(),
                buyer: purchase.buyer.clone(),
                item: item.clone(),
                provider: purchase.provider,
                transaction_id: purchase.transaction_id.clone(),
                delivery: delivery.clone(),
            })
            .await;

        Ok(delivery)
    }

    /// Removes the role of a subscription that was just cancelled.
    ///
    /// Callers must only invoke this when their conditional cancel actually
    /// flipped the row, so the role is removed once per cancellation.
    pub async fn revoke(&self, subscription: &ShopSubscription) -> Result<Revocation, FulfillmentError> {
        let key = &subscription.key;
        let item = self.shop.find_item(&key.shop_item_id).await?;
        let role = item.as_ref().and_then(|i| i.discord_role_id.clone());

        let revocation = match role {
            None => Revocation::NoRole,
            Some(role) => match self
                .bot
                .remove_role(&key.guild_id, &key.discord_user_id, &role)
                .await
            {
                Ok(()) => Revocation::Revoked(role),
                Err(err) => {
                    tracing::error!(
                        guild_id = %key.guild_id,
                        user_id = %key.discord_user_id,
                        role_id = %role,
                        provider_subscription_id = %subscription.provider_subscription_id,
                        error = %err,
                        "failed to revoke subscription role"
                    );
                    Revocation::Failed {
                        role,
                        error: err.to_string(),
                    }
                }
            },
        };

        self.hooks
            .run(&CommittedEvent::SubscriptionCancelled {
                subscription: subscription.clone(),
                item_name: item.map(|i| i.name),
                revocation: revocation.clone(),
            })
            .await;

        Ok(revocation)
    }

    async fn activate_subscription(&self, purchase: &Purchase) -> Result<Delivery, FulfillmentError> {
        let subscription_id = purchase
            .subscription_id
            .clone()
            .ok_or(FulfillmentError::MissingSubscriptionId)?;

        let current_period_end = self.current_period_end(purchase, &subscription_id).await;

        let subscription = ShopSubscription::activate(
            SubscriptionKey {
                guild_id: purchase.guild_id.clone(),
                shop_item_id: purchase.item.id,
                discord_user_id: purchase.buyer.clone(),
            },
            subscription_id.clone(),
            current_period_end,
        );
        self.subscriptions.upsert_active(&subscription).await?;

        Ok(Delivery::Subscription {
            provider_subscription_id: subscription_id,
            current_period_end,
            role: self.grant_role(purchase).await,
        })
    }

    /// A missing period end is filled in by the next renewal event.
    async fn current_period_end(
        &self,
        purchase: &Purchase,
        subscription_id: &str,
    ) -> Option<DateTime<Utc>> {
        let lookup = match self.providers.checkout(&purchase.config) {
            Ok(provider) => provider.fetch_subscription(subscription_id).await,
            Err(err) => Err(err),
        };
        match lookup {
            Ok(snapshot) => snapshot.current_period_end,
            Err(err) => {
                tracing::warn!(
                    provider = purchase.provider.as_str(),
                    subscription_id,
                    error = %err,
                    "could not fetch subscription period; storing without one"
                );
                None
            }
        }
    }

    async fn grant_role(&self, purchase: &Purchase) -> RoleGrant {
        let Some(role) = purchase.item.discord_role_id.clone() else {
            tracing::warn!(
                shop_item_id = %purchase.item.id,
                "role item has no role configured"
            );
            return RoleGrant::NotConfigured;
        };

        match self
            .bot
            .add_role(&purchase.guild_id, &purchase.buyer, &role)
            .await
        {
            Ok(()) => RoleGrant::Granted(role),
            Err(err) => {
                tracing::error!(
                    guild_id = %purchase.guild_id,
                    user_id = %purchase.buyer,
                    role_id = %role,
                    transaction_id = %purchase.transaction_id,
                    error = %err,
                    "failed to grant purchased role"
                );
                RoleGrant::Failed {
                    role,
                    error: err.to_string(),
                }
            }
        }
    }
}
