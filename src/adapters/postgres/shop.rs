//! PostgreSQL implementation of ShopRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    ChannelId, CouponId, DiscordUserId, DomainError, GuildId, Money, ShopItemId,
};
use crate::domain::shop::{ClaimOutcome, Coupon, ShopCode, ShopItem, ShopOrder};
use crate::ports::ShopRepository;

use super::{db_error, parse_column, parse_optional};

pub struct PostgresShopRepository {
    pool: PgPool,
}

impl PostgresShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShopItemRow {
    id: Uuid,
    guild_id: String,
    name: String,
    delivery_type: String,
    billing_type: String,
    discord_role_id: Option<String>,
    price_cents: i64,
    currency: String,
}

impl TryFrom<ShopItemRow> for ShopItem {
    type Error = DomainError;

    fn try_from(row: ShopItemRow) -> Result<Self, Self::Error> {
        Ok(ShopItem {
            id: ShopItemId::from_uuid(row.id),
            guild_id: parse_column("guild_id", &row.guild_id)?,
            name: row.name,
            delivery_type: parse_column("delivery_type", &row.delivery_type)?,
            billing_type: parse_column("billing_type", &row.billing_type)?,
            discord_role_id: parse_optional("discord_role_id", row.discord_role_id.as_deref())?,
            price: Money::new(row.price_cents, &row.currency)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    guild_id: String,
    code: String,
    redemption_count: i32,
    max_redemptions: Option<i32>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DomainError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: CouponId::from_uuid(row.id),
            guild_id: parse_column("guild_id", &row.guild_id)?,
            code: row.code,
            redemption_count: row.redemption_count,
            max_redemptions: row.max_redemptions,
        })
    }
}

#[async_trait]
impl ShopRepository for PostgresShopRepository {
    async fn find_item(&self, id: &ShopItemId) -> Result<Option<ShopItem>, DomainError> {
        let row: Option<ShopItemRow> = sqlx::query_as(
            r#"
            SELECT id, guild_id, name, delivery_type, billing_type, discord_role_id,
                   price_cents, currency
            FROM shop_items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load shop item"))?;

        row.map(ShopItem::try_from).transpose()
    }

    async fn claim_order(&self, order: &ShopOrder) -> Result<ClaimOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO guild_shop_orders (
                id, guild_id, shop_item_id, discord_user_id, provider, transaction_id,
                amount_cents, currency, coupon_id, order_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (provider, transaction_id) DO NOTHING
            "#,
        )
        .bind(order.id)
        .bind(order.guild_id.as_str())
        .bind(order.shop_item_id.as_uuid())
        .bind(order.discord_user_id.as_str())
        .bind(order.provider.as_str())
        .bind(&order.transaction_id)
        .bind(order.amount.amount_cents())
        .bind(order.amount.currency())
        .bind(order.coupon_id.map(|id| *id.as_uuid()))
        .bind(order.order_id.map(|id| *id.as_uuid()))
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to claim shop order"))?;

        Ok(if result.rows_affected() == 1 {
            ClaimOutcome::Claimed
        } else {
            ClaimOutcome::AlreadyClaimed
        })
    }

    async fn insert_code(&self, code: &ShopCode) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO shop_codes (
                code, guild_id, shop_item_id, discord_user_id, transaction_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&code.code)
        .bind(code.guild_id.as_str())
        .bind(code.shop_item_id.as_uuid())
        .bind(code.discord_user_id.as_str())
        .bind(&code.transaction_id)
        .bind(code.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert shop code"))?;

        Ok(())
    }

    async fn take_prefilled_code(
        &self,
        guild_id: &GuildId,
        shop_item_id: &ShopItemId,
        buyer: &DiscordUserId,
        transaction_id: &str,
    ) -> Result<Option<ShopCode>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // SKIP LOCKED lets concurrent buyers draw different codes instead of
        // queueing behind the same row.
        let taken: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM shop_prefilled_codes
            WHERE id = (
                SELECT id FROM shop_prefilled_codes
                WHERE guild_id = $1 AND shop_item_id = $2
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING code
            "#,
        )
        .bind(guild_id.as_str())
        .bind(shop_item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to take prefilled code"))?;

        let Some((code,)) = taken else {
            tx.rollback()
                .await
                .map_err(db_error("Failed to roll back transaction"))?;
            return Ok(None);
        };

        let issued = ShopCode {
            code,
            guild_id: guild_id.clone(),
            shop_item_id: *shop_item_id,
            discord_user_id: buyer.clone(),
            transaction_id: transaction_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO shop_codes (
                code, guild_id, shop_item_id, discord_user_id, transaction_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&issued.code)
        .bind(issued.guild_id.as_str())
        .bind(issued.shop_item_id.as_uuid())
        .bind(issued.discord_user_id.as_str())
        .bind(&issued.transaction_id)
        .bind(issued.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to record prefilled code"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit prefilled code"))?;

        Ok(Some(issued))
    }

    async fn find_coupon(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        let row: Option<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, guild_id, code, redemption_count, max_redemptions
            FROM shop_coupons
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load coupon"))?;

        row.map(Coupon::try_from).transpose()
    }

    async fn save_coupon_redemptions(&self, coupon: &Coupon) -> Result<(), DomainError> {
        sqlx::query("UPDATE shop_coupons SET redemption_count = $2 WHERE id = $1")
            .bind(coupon.id.as_uuid())
            .bind(coupon.redemption_count)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to save coupon redemptions"))?;

        Ok(())
    }

    async fn announcement_channel(
        &self,
        guild_id: &GuildId,
    ) -> Result<Option<ChannelId>, DomainError> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT announcement_channel_id FROM guild_shop_settings WHERE guild_id = $1",
        )
        .bind(guild_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load shop settings"))?;

        parse_optional("announcement_channel_id", row.and_then(|(c,)| c).as_deref())
    }
}
