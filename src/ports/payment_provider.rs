//! Payment provider port: one implementation per provider.
//!
//! Adapters are built per request from the tenant's provider configuration
//! (see [`ProviderFactory`]) so each guild can bring its own credentials.
//! Adding a provider means adding one implementation, not editing a switch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;

use crate::domain::checkout::{
    CheckoutError, CheckoutRequest, InitiatedCheckout, ProviderConfig, ProviderKind,
};
use crate::domain::webhook::{WebhookEnvelope, WebhookError};

/// Outbound side of a provider: opening transactions and reading back
/// provider-owned state.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Opens a provider-side transaction. Performs at most one outbound
    /// call and never touches storage.
    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError>;

    /// Canonical subscription state, for the authoritative renewal date.
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, CheckoutError> {
        let _ = subscription_id;
        Err(CheckoutError::configuration(
            self.kind(),
            "provider has no subscription API",
        ))
    }

    /// Captures funds for an approved transaction.
    async fn capture(&self, transaction_id: &str) -> Result<CaptureStatus, CheckoutError> {
        let _ = transaction_id;
        Err(CheckoutError::configuration(
            self.kind(),
            "provider does not support deferred capture",
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Completed,
    /// Provider accepted the capture but funds are still settling.
    Pending,
    Declined,
}

/// Inbound side of a provider: authenticity and parsing of callbacks.
#[async_trait]
pub trait WebhookSource: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Authenticates the raw request. Must run before [`WebhookSource::parse`].
    async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError>;

    /// Parses an authenticated body into a normalized event.
    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError>;
}

/// Builds provider adapters from tenant configuration.
pub trait ProviderFactory: Send + Sync {
    fn checkout(&self, config: &ProviderConfig) -> Result<Box<dyn PaymentProvider>, CheckoutError>;

    fn webhooks(&self, config: &ProviderConfig) -> Result<Box<dyn WebhookSource>, WebhookError>;
}
