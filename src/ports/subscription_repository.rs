//! Shop subscription persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;
use crate::domain::shop::{ShopSubscription, SubscriptionKey};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Creates or reactivates the row for `subscription.key`.
    async fn upsert_active(&self, subscription: &ShopSubscription) -> Result<(), DomainError>;

    async fn find(&self, key: &SubscriptionKey) -> Result<Option<ShopSubscription>, DomainError>;

    async fn find_active_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<ShopSubscription>, DomainError>;

    /// Touches only `current_period_end`. Returns false when no row matches.
    async fn update_period_end(
        &self,
        provider_subscription_id: &str,
        current_period_end: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Active -> cancelled. Returns false when the row was not active, which
    /// is how repeated cancellation events are recognized.
    async fn cancel(&self, key: &SubscriptionKey) -> Result<bool, DomainError>;
}
