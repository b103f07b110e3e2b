//! WebhookEventRepository port - tracks processed provider events.
//!
//! Providers redeliver identical events on timeouts and non-2xx responses,
//! and sometimes even after a 2xx they never saw. Recording each processed
//! `(provider, event_id)` turns those redeliveries into explicit no-ops.
//! Records keep the payload and outcome for support.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::DomainError;
use crate::domain::webhook::{WebhookEnvelope, WebhookOutcome};

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub provider: ProviderKind,

    /// Provider's event id (`evt_...`, `WH-...`, or a derived IPN id).
    pub event_id: String,

    /// Provider-native event type, e.g. `checkout.session.completed`.
    pub event_type: String,

    pub processed_at: DateTime<Utc>,

    /// `success`, `duplicate` or `ignored`.
    pub result: String,

    /// Why the event was ignored, when it was.
    pub detail: Option<String>,

    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn from_outcome(
        provider: ProviderKind,
        envelope: &WebhookEnvelope,
        outcome: &WebhookOutcome,
    ) -> Self {
        let detail = match outcome {
            WebhookOutcome::Ignored(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            provider,
            event_id: envelope.event_id.clone(),
            event_type: envelope.event_type.clone(),
            processed_at: Utc::now(),
            result: outcome.result_label().to_string(),
            detail,
            payload: envelope.payload.clone(),
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time seeing this event.
    Inserted,
    /// A concurrent delivery recorded it first.
    AlreadyExists,
}

/// Implementations should rely on a primary key over `(provider, event_id)`
/// so concurrent saves resolve to exactly one `Inserted`.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Deletes records processed before `timestamp`; returns how many.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError>;
}
