//! In-memory shop subscription repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::shop::{ShopSubscription, SubscriptionKey, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: RwLock<HashMap<SubscriptionKey, ShopSubscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<ShopSubscription> {
        self.rows.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn upsert_active(&self, subscription: &ShopSubscription) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&subscription.key) {
            Some(existing) => {
                existing.provider_subscription_id = subscription.provider_subscription_id.clone();
                existing.status = SubscriptionStatus::Active;
                existing.current_period_end = subscription.current_period_end;
                existing.updated_at = Utc::now();
            }
            None => {
                rows.insert(subscription.key.clone(), subscription.clone());
            }
        }
        Ok(())
    }

    async fn find(&self, key: &SubscriptionKey) -> Result<Option<ShopSubscription>, DomainError> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn find_active_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<ShopSubscription>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|s| s.is_active() && s.provider_subscription_id == provider_subscription_id)
            .cloned())
    }

    async fn update_period_end(
        &self,
        provider_subscription_id: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        let mut updated = false;
        for row in rows
            .values_mut()
            .filter(|s| s.provider_subscription_id == provider_subscription_id)
        {
            row.current_period_end = Some(current_period_end);
            row.updated_at = Utc::now();
            updated = true;
        }
        Ok(updated)
    }

    async fn cancel(&self, key: &SubscriptionKey) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(key) {
            Some(row) if row.is_active() => Ok(row.cancel().is_ok()),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DiscordUserId, GuildId, ShopItemId};

    fn key() -> SubscriptionKey {
        SubscriptionKey {
            guild_id: GuildId::new("1").unwrap(),
            shop_item_id: ShopItemId::new(),
            discord_user_id: DiscordUserId::new("2").unwrap(),
        }
    }

    #[tokio::test]
    async fn cancel_flips_only_once() {
        let repo = InMemorySubscriptionRepository::new();
        let key = key();
        repo.upsert_active(&ShopSubscription::activate(key.clone(), "sub_1", None))
            .await
            .unwrap();

        assert!(repo.cancel(&key).await.unwrap());
        assert!(!repo.cancel(&key).await.unwrap());
        assert!(repo.find_active_by_provider_id("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resubscribing_reactivates_the_same_row() {
        let repo = InMemorySubscriptionRepository::new();
        let key = key();
        repo.upsert_active(&ShopSubscription::activate(key.clone(), "sub_1", None))
            .await
            .unwrap();
        repo.cancel(&key).await.unwrap();
        repo.upsert_active(&ShopSubscription::activate(key.clone(), "sub_2", None))
            .await
            .unwrap();

        let rows = repo.all().await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_active());
        assert_eq!(rows[0].provider_subscription_id, "sub_2");
    }
}
