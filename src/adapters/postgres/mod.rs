//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! Every conditional transition (claim, settle, cancel, initiation binding)
//! is a single statement whose `WHERE` clause or unique constraint decides
//! the winner, so concurrent handlers cannot both succeed.
//!
//! - `PostgresOrderRepository` / `PostgresPaymentRepository` - orders and payments
//! - `PostgresShopRepository` - items, claims, codes, coupons, shop settings
//! - `PostgresSubscriptionRepository` - shop subscriptions
//! - `PostgresWebhookEventRepository` - processed-event tracking
//! - `PostgresProviderConfigStore` - per-tenant provider configuration
//! - `PostgresAuditLog` - append-only audit trail

mod audit_log;
mod orders;
mod payments;
mod provider_configs;
mod shop;
mod subscriptions;
mod webhook_events;

pub use audit_log::PostgresAuditLog;
pub use orders::PostgresOrderRepository;
pub use payments::PostgresPaymentRepository;
pub use provider_configs::PostgresProviderConfigStore;
pub use shop::PostgresShopRepository;
pub use subscriptions::PostgresSubscriptionRepository;
pub use webhook_events::PostgresWebhookEventRepository;

use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Maps a sqlx failure to a storage error carrying `context`.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Parses a stored column value, reporting corrupt rows as storage errors.
fn parse_column<T>(column: &'static str, raw: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value '{}': {}", column, raw, e),
        )
    })
}

fn parse_optional<T>(column: &'static str, raw: Option<&str>) -> Result<Option<T>, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| parse_column(column, value)).transpose()
}
