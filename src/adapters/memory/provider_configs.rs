//! In-memory provider configuration store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::checkout::{ProviderConfig, ProviderKind};
use crate::domain::foundation::{DomainError, GuildId};
use crate::ports::ProviderConfigStore;

#[derive(Default)]
pub struct InMemoryProviderConfigStore {
    configs: RwLock<HashMap<(Option<GuildId>, ProviderKind), ProviderConfig>>,
}

impl InMemoryProviderConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing configuration for the same owner and provider.
    pub async fn insert(&self, config: ProviderConfig) {
        self.configs
            .write()
            .await
            .insert((config.guild_id.clone(), config.provider), config);
    }
}

#[async_trait]
impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn find(
        &self,
        guild_id: Option<&GuildId>,
        provider: ProviderKind,
    ) -> Result<Option<ProviderConfig>, DomainError> {
        Ok(self
            .configs
            .read()
            .await
            .get(&(guild_id.cloned(), provider))
            .cloned())
    }
}
