//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Provider Ports
//!
//! - `PaymentProvider` / `WebhookSource` - outbound and inbound side of a provider
//! - `ProviderFactory` - builds both from tenant configuration
//! - `ProviderConfigStore` - per-tenant credentials and flags
//!
//! ## Storage Ports
//!
//! - `OrderRepository`, `PaymentRepository` - guarded status transitions
//! - `ShopRepository`, `SubscriptionRepository` - entitlement records
//! - `WebhookEventRepository` - processed-event idempotency tracking
//! - `AuditLog` - append-only audit trail
//!
//! ## Side-effect Ports
//!
//! - `BotApi` - role grants/revokes and channel messages
//! - `NotificationSink` - best-effort announcements

mod audit_log;
mod bot_api;
mod notification_sink;
mod order_repository;
mod payment_provider;
mod provider_config_store;
mod shop_repository;
mod subscription_repository;
mod webhook_event_repository;

pub use audit_log::AuditLog;
pub use bot_api::{BotApi, BotApiError};
pub use notification_sink::{Notification, NotificationError, NotificationKind, NotificationSink};
pub use order_repository::{OrderRepository, PaymentRepository};
pub use payment_provider::{
    CaptureStatus, PaymentProvider, ProviderFactory, SubscriptionSnapshot, WebhookSource,
};
pub use provider_config_store::ProviderConfigStore;
pub use shop_repository::ShopRepository;
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_repository::{SaveResult, WebhookEventRecord, WebhookEventRepository};
