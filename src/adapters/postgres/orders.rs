//! PostgreSQL implementation of OrderRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::checkout::{BillingPeriod, Order, OrderItem, OrderStatus};
use crate::domain::foundation::{DomainError, ErrorCode, OrderId, ShopItemId};
use crate::ports::OrderRepository;

use super::{db_error, parse_column, parse_optional};

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    guild_id: Option<String>,
    buyer_id: String,
    item_kind: String,
    tier: Option<String>,
    shop_item_id: Option<Uuid>,
    item_name: Option<String>,
    billing_period: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let billing_period: BillingPeriod = parse_column("billing_period", &row.billing_period)?;
        let item = match (row.item_kind.as_str(), row.shop_item_id) {
            ("shop_item", Some(shop_item_id)) => OrderItem::ShopItem {
                shop_item_id: ShopItemId::from_uuid(shop_item_id),
                name: row.item_name.unwrap_or_default(),
                billing_period,
            },
            ("tier", _) => OrderItem::Tier {
                tier: row.tier.unwrap_or_default(),
                billing_period,
            },
            (kind, _) => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid order item '{}' for order {}", kind, row.id),
                ))
            }
        };

        Ok(Order {
            id: OrderId::from_uuid(row.id),
            order_number: row.order_number,
            guild_id: parse_optional("guild_id", row.guild_id.as_deref())?,
            buyer: parse_column("buyer_id", &row.buyer_id)?,
            item,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, order_number, guild_id, buyer_id, item_kind, tier, shop_item_id,
                   item_name, billing_period, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load order"))?;

        row.map(Order::try_from).transpose()
    }

    async fn settle(&self, id: &OrderId, status: OrderStatus) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to settle order"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            order_number: "ORD-1".to_string(),
            guild_id: Some("111".to_string()),
            buyer_id: "222".to_string(),
            item_kind: kind.to_string(),
            tier: Some("pro".to_string()),
            shop_item_id: Some(Uuid::new_v4()),
            item_name: Some("VIP".to_string()),
            billing_period: "monthly".to_string(),
            status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn shop_item_rows_map_to_shop_orders() {
        let order = Order::try_from(row("shop_item")).unwrap();
        assert!(matches!(order.item, OrderItem::ShopItem { .. }));
        assert_eq!(order.item.billing_period(), BillingPeriod::Monthly);
        assert!(order.is_pending());
    }

    #[test]
    fn tier_rows_map_to_tier_orders() {
        let order = Order::try_from(row("tier")).unwrap();
        assert_eq!(
            order.item,
            OrderItem::Tier {
                tier: "pro".to_string(),
                billing_period: BillingPeriod::Monthly
            }
        );
    }

    #[test]
    fn unknown_item_kind_is_rejected() {
        let err = Order::try_from(row("gift")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
