//! Provider events normalized into the handful of transitions the
//! checkout core cares about.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::checkout::PurchaseMetadata;
use crate::domain::foundation::Money;

/// A verified, parsed webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    /// Provider's own event identifier; the idempotency key. Providers
    /// without one get a deterministic id derived from transaction + status.
    pub event_id: String,
    /// Provider-native event type, kept for logs and the processed-event record.
    pub event_type: String,
    pub event: ProviderEvent,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Money has been collected for `transaction_id`.
    PaymentCompleted(CompletedPayment),
    /// Buyer approved, funds not captured yet (PayPal).
    PaymentApproved { transaction_id: String },
    PaymentFailed {
        transaction_id: String,
        reason: String,
    },
    /// Renewal: only the period end moves.
    SubscriptionUpdated {
        subscription_id: String,
        current_period_end: DateTime<Utc>,
    },
    SubscriptionDeleted { subscription_id: String },
    /// Authentic but irrelevant event type.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPayment {
    pub transaction_id: String,
    /// Metadata echoed back from initiation, when the provider supports it.
    pub metadata: PurchaseMetadata,
    pub subscription_id: Option<String>,
    pub amount: Option<Money>,
}

impl CompletedPayment {
    pub fn bare(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            metadata: PurchaseMetadata::default(),
            subscription_id: None,
            amount: None,
        }
    }
}

/// What processing a delivery amounted to. Every variant is acknowledged
/// to the provider with 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    /// Same transaction already handled through another event or a racing delivery.
    Duplicate,
    /// This exact event id was recorded before.
    AlreadyProcessed,
    Ignored(String),
}

impl WebhookOutcome {
    pub fn ignored(reason: impl Into<String>) -> Self {
        WebhookOutcome::Ignored(reason.into())
    }

    /// Label stored with the processed-event record.
    pub fn result_label(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "success",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::AlreadyProcessed => "already_processed",
            WebhookOutcome::Ignored(_) => "ignored",
        }
    }
}
