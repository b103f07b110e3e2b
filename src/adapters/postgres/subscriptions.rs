//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ShopItemId};
use crate::domain::shop::{ShopSubscription, SubscriptionKey};
use crate::ports::SubscriptionRepository;

use super::{db_error, parse_column};

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    guild_id: String,
    shop_item_id: Uuid,
    discord_user_id: String,
    provider_subscription_id: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for ShopSubscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(ShopSubscription {
            key: SubscriptionKey {
                guild_id: parse_column("guild_id", &row.guild_id)?,
                shop_item_id: ShopItemId::from_uuid(row.shop_item_id),
                discord_user_id: parse_column("discord_user_id", &row.discord_user_id)?,
            },
            provider_subscription_id: row.provider_subscription_id,
            status: parse_column("status", &row.status)?,
            current_period_end: row.current_period_end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT guild_id, shop_item_id, discord_user_id, provider_subscription_id, status,
           current_period_end, created_at, updated_at
    FROM shop_subscriptions
"#;

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert_active(&self, subscription: &ShopSubscription) -> Result<(), DomainError> {
        let key = &subscription.key;
        sqlx::query(
            r#"
            INSERT INTO shop_subscriptions (
                guild_id, shop_item_id, discord_user_id, provider_subscription_id,
                status, current_period_end, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $6)
            ON CONFLICT (guild_id, shop_item_id, discord_user_id) DO UPDATE SET
                provider_subscription_id = EXCLUDED.provider_subscription_id,
                status = 'active',
                current_period_end = EXCLUDED.current_period_end,
                updated_at = NOW()
            "#,
        )
        .bind(key.guild_id.as_str())
        .bind(key.shop_item_id.as_uuid())
        .bind(key.discord_user_id.as_str())
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.current_period_end)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert subscription"))?;

        Ok(())
    }

    async fn find(&self, key: &SubscriptionKey) -> Result<Option<ShopSubscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE guild_id = $1 AND shop_item_id = $2 AND discord_user_id = $3",
            SELECT_SUBSCRIPTION
        ))
        .bind(key.guild_id.as_str())
        .bind(key.shop_item_id.as_uuid())
        .bind(key.discord_user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load subscription"))?;

        row.map(ShopSubscription::try_from).transpose()
    }

    async fn find_active_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<ShopSubscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE provider_subscription_id = $1 AND status = 'active' LIMIT 1",
            SELECT_SUBSCRIPTION
        ))
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load subscription by provider id"))?;

        row.map(ShopSubscription::try_from).transpose()
    }

    async fn update_period_end(
        &self,
        provider_subscription_id: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE shop_subscriptions
            SET current_period_end = $2, updated_at = NOW()
            WHERE provider_subscription_id = $1
            "#,
        )
        .bind(provider_subscription_id)
        .bind(current_period_end)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update subscription period"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, key: &SubscriptionKey) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE shop_subscriptions
            SET status = 'cancelled', updated_at = NOW()
            WHERE guild_id = $1 AND shop_item_id = $2 AND discord_user_id = $3
              AND status = 'active'
            "#,
        )
        .bind(key.guild_id.as_str())
        .bind(key.shop_item_id.as_uuid())
        .bind(key.discord_user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to cancel subscription"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shop::SubscriptionStatus;

    #[test]
    fn rows_map_to_subscriptions() {
        let sub = ShopSubscription::try_from(SubscriptionRow {
            guild_id: "111".to_string(),
            shop_item_id: Uuid::new_v4(),
            discord_user_id: "222".to_string(),
            provider_subscription_id: "sub_1".to_string(),
            status: "cancelled".to_string(),
            current_period_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert_eq!(sub.key.discord_user_id.as_str(), "222");
    }
}
