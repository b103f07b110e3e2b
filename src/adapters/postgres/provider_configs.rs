//! PostgreSQL implementation of ProviderConfigStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::checkout::{ProviderConfig, ProviderKind};
use crate::domain::foundation::{DomainError, GuildId};
use crate::ports::ProviderConfigStore;

use super::{db_error, parse_column, parse_optional};

pub struct PostgresProviderConfigStore {
    pool: PgPool,
}

impl PostgresProviderConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProviderConfigRow {
    guild_id: Option<String>,
    provider: String,
    active: bool,
    auto_verify: bool,
    sandbox: bool,
    credentials: serde_json::Value,
}

impl TryFrom<ProviderConfigRow> for ProviderConfig {
    type Error = DomainError;

    fn try_from(row: ProviderConfigRow) -> Result<Self, Self::Error> {
        Ok(ProviderConfig {
            guild_id: parse_optional("guild_id", row.guild_id.as_deref())?,
            provider: parse_column("provider", &row.provider)?,
            active: row.active,
            auto_verify: row.auto_verify,
            sandbox: row.sandbox,
            credentials: row.credentials,
        })
    }
}

#[async_trait]
impl ProviderConfigStore for PostgresProviderConfigStore {
    /// A `None` guild reads the platform-level row; tenants never fall back to it.
    async fn find(
        &self,
        guild_id: Option<&GuildId>,
        provider: ProviderKind,
    ) -> Result<Option<ProviderConfig>, DomainError> {
        let row: Option<ProviderConfigRow> = sqlx::query_as(
            r#"
            SELECT guild_id, provider, active, auto_verify, sandbox, credentials
            FROM payment_provider_configs
            WHERE guild_id IS NOT DISTINCT FROM $1 AND provider = $2
            "#,
        )
        .bind(guild_id.map(GuildId::as_str))
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load provider config"))?;

        row.map(ProviderConfig::try_from).transpose()
    }
}
