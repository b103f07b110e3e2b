//! ProviderConfigStore port - per-tenant provider credentials and flags.

use async_trait::async_trait;

use crate::domain::checkout::{ProviderConfig, ProviderKind};
use crate::domain::foundation::{DomainError, GuildId};

/// Single source of truth for provider configuration. Implementations must
/// not cache across requests; a rotated secret takes effect immediately.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// Configuration for `provider` owned by `guild_id`, or the platform
    /// configuration when `guild_id` is `None`.
    async fn find(
        &self,
        guild_id: Option<&GuildId>,
        provider: ProviderKind,
    ) -> Result<Option<ProviderConfig>, DomainError>;
}
