//! In-memory adapters for every storage and side-effect port.
//!
//! Used by unit and integration tests.
//! Each store keeps its conditional transitions under a single lock so
//! concurrency guarantees match the Postgres adapters.

mod orders;
mod provider_configs;
mod recording;
mod shop;
mod stub_provider;
mod subscriptions;
mod webhook_events;

pub use orders::InMemoryOrderStore;
pub use provider_configs::InMemoryProviderConfigStore;
pub use recording::{InMemoryAuditLog, RecordingBotApi, RecordingNotificationSink, RoleCall};
pub use shop::InMemoryShopRepository;
pub use stub_provider::{StubProviderFactory, STUB_SIGNATURE_HEADER};
pub use subscriptions::InMemorySubscriptionRepository;
pub use webhook_events::InMemoryWebhookEventRepository;
