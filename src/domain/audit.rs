//! Append-only audit trail for support and dispute resolution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::foundation::GuildId;

/// Every state-changing action the checkout core performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    CheckoutInitiated,
    PaymentCompleted,
    PaymentFailed,
    RoleGranted,
    RoleGrantFailed,
    CodeIssued,
    PrefilledCodeIssued,
    PrefilledPoolExhausted,
    NothingToDeliver,
    SubscriptionActivated,
    SubscriptionRenewed,
    SubscriptionCancelled,
    RoleRevokeFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CheckoutInitiated => "checkout.initiated",
            AuditAction::PaymentCompleted => "payment.completed",
            AuditAction::PaymentFailed => "payment.failed",
            AuditAction::RoleGranted => "fulfillment.role_granted",
            AuditAction::RoleGrantFailed => "fulfillment.role_grant_failed",
            AuditAction::CodeIssued => "fulfillment.code_issued",
            AuditAction::PrefilledCodeIssued => "fulfillment.prefilled_issued",
            AuditAction::PrefilledPoolExhausted => "fulfillment.pool_exhausted",
            AuditAction::NothingToDeliver => "fulfillment.nothing_to_deliver",
            AuditAction::SubscriptionActivated => "subscription.activated",
            AuditAction::SubscriptionRenewed => "subscription.renewed",
            AuditAction::SubscriptionCancelled => "subscription.cancelled",
            AuditAction::RoleRevokeFailed => "subscription.role_revoke_failed",
        }
    }

    /// Actions support must follow up on by hand.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            AuditAction::RoleGrantFailed
                | AuditAction::PrefilledPoolExhausted
                | AuditAction::RoleRevokeFailed
        )
    }
}

/// Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub guild_id: Option<GuildId>,
    /// Who acted, e.g. `webhook:stripe` or `checkout`.
    pub actor: String,
    pub action: AuditAction,
    /// What was acted on, usually a provider transaction or subscription id.
    pub subject: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        guild_id: Option<GuildId>,
        actor: impl Into<String>,
        action: AuditAction,
        subject: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id,
            actor: actor.into(),
            action,
            subject: subject.into(),
            details,
            created_at: Utc::now(),
        }
    }
}
