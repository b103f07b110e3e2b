//! Post-commit hooks: side effects that run after a state change is durable.
//!
//! Hooks never influence the webhook response. A failing hook is logged and
//! the next one still runs; the committed state is the source of truth and
//! the audit row or announcement is best effort on top of it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

use crate::domain::audit::{AuditAction, AuditLogEntry};
use crate::domain::checkout::ProviderKind;
use crate::domain::foundation::{DiscordUserId, GuildId, OrderId, PaymentId, RoleId};
use crate::domain::shop::{ShopItem, ShopSubscription};
use crate::ports::{AuditLog, Notification, NotificationKind, NotificationSink};

use super::fulfillment::{Delivery, Revocation, RoleGrant};

const ACTOR: &str = "system:checkout";

// ════════════════════════════════════════════════════════════════════════════════
// Committed events
// ════════════════════════════════════════════════════════════════════════════════

/// A state change that has been committed and may now be announced.
#[derive(Debug, Clone)]
pub enum CommittedEvent {
    CheckoutInitiated {
        guild_id: Option<GuildId>,
        payment_id: PaymentId,
        provider: ProviderKind,
        transaction_id: String,
    },
    PaymentCompleted {
        guild_id: Option<GuildId>,
        order_id: OrderId,
        payment_id: PaymentId,
        provider: ProviderKind,
        transaction_id: String,
    },
    PaymentFailed {
        guild_id: Option<GuildId>,
        order_id: OrderId,
        payment_id: PaymentId,
        provider: ProviderKind,
        transaction_id: String,
        reason: String,
    },
    Fulfilled {
        guild_id: GuildId,
        buyer: DiscordUserId,
        item: ShopItem,
        provider: ProviderKind,
        transaction_id: String,
        delivery: Delivery,
    },
    SubscriptionRenewed {
        subscription: ShopSubscription,
        current_period_end: DateTime<Utc>,
    },
    SubscriptionCancelled {
        subscription: ShopSubscription,
        item_name: Option<String>,
        revocation: Revocation,
    },
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, event: &CommittedEvent) -> Result<(), HookError>;
}

/// Ordered hook chain. Audit first, announcements after.
#[derive(Clone, Default)]
pub struct PostCommitHooks {
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl PostCommitHooks {
    pub fn new(hooks: Vec<Arc<dyn PostCommitHook>>) -> Self {
        Self { hooks }
    }

    pub fn standard(audit: Arc<dyn AuditLog>, sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(vec![
            Arc::new(AuditHook::new(audit)),
            Arc::new(NotifyHook::new(sink)),
        ])
    }

    pub async fn run(&self, event: &CommittedEvent) {
        for hook in &self.hooks {
            if let Err(err) = hook.run(event).await {
                tracing::warn!(hook = hook.name(), error = %err, "post-commit hook failed");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Audit
// ════════════════════════════════════════════════════════════════════════════════

pub struct AuditHook {
    log: Arc<dyn AuditLog>,
}

impl AuditHook {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl PostCommitHook for AuditHook {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn run(&self, event: &CommittedEvent) -> Result<(), HookError> {
        let entry = audit_entry(event);
        if entry.action.needs_attention() {
            tracing::error!(
                action = entry.action.as_str(),
                subject = %entry.subject,
                details = %entry.details,
                "fulfillment needs manual attention"
            );
        }
        self.log
            .append(&entry)
            .await
            .map_err(|e| HookError(e.to_string()))
    }
}

pub fn audit_entry(event: &CommittedEvent) -> AuditLogEntry {
    match event {
        CommittedEvent::CheckoutInitiated {
            guild_id,
            payment_id,
            provider,
            transaction_id,
        } => AuditLogEntry::new(
            guild_id.clone(),
            ACTOR,
            AuditAction::CheckoutInitiated,
            format!("payment:{}", payment_id),
            json!({ "provider": provider.as_str(), "transaction_id": transaction_id }),
        ),
        CommittedEvent::PaymentCompleted {
            guild_id,
            order_id,
            payment_id,
            provider,
            transaction_id,
        } => AuditLogEntry::new(
            guild_id.clone(),
            ACTOR,
            AuditAction::PaymentCompleted,
            format!("order:{}", order_id),
            json!({
                "payment_id": payment_id.to_string(),
                "provider": provider.as_str(),
                "transaction_id": transaction_id,
            }),
        ),
        CommittedEvent::PaymentFailed {
            guild_id,
            order_id,
            payment_id,
            provider,
            transaction_id,
            reason,
        } => AuditLogEntry::new(
            guild_id.clone(),
            ACTOR,
            AuditAction::PaymentFailed,
            format!("order:{}", order_id),
            json!({
                "payment_id": payment_id.to_string(),
                "provider": provider.as_str(),
                "transaction_id": transaction_id,
                "reason": reason,
            }),
        ),
        CommittedEvent::Fulfilled {
            guild_id,
            buyer,
            item,
            provider,
            transaction_id,
            delivery,
        } => {
            let mut details = json!({
                "shop_item_id": item.id.to_string(),
                "item_name": item.name,
                "provider": provider.as_str(),
                "transaction_id": transaction_id,
            });
            let action = match delivery {
                Delivery::Role(grant) => {
                    annotate_role(&mut details, grant);
                    role_action(grant, AuditAction::RoleGranted)
                }
                Delivery::Subscription {
                    provider_subscription_id,
                    current_period_end,
                    role,
                } => {
                    details["provider_subscription_id"] = json!(provider_subscription_id);
                    details["current_period_end"] = json!(current_period_end);
                    annotate_role(&mut details, role);
                    role_action(role, AuditAction::SubscriptionActivated)
                }
                // Codes go to the buyer, never into the audit trail.
                Delivery::Code(_) => AuditAction::CodeIssued,
                Delivery::Prefilled(_) => AuditAction::PrefilledCodeIssued,
                Delivery::PoolExhausted => AuditAction::PrefilledPoolExhausted,
                Delivery::Nothing => AuditAction::NothingToDeliver,
            };
            AuditLogEntry::new(
                Some(guild_id.clone()),
                ACTOR,
                action,
                format!("user:{}", buyer),
                details,
            )
        }
        CommittedEvent::SubscriptionRenewed {
            subscription,
            current_period_end,
        } => AuditLogEntry::new(
            Some(subscription.key.guild_id.clone()),
            ACTOR,
            AuditAction::SubscriptionRenewed,
            format!("user:{}", subscription.key.discord_user_id),
            json!({
                "provider_subscription_id": subscription.provider_subscription_id,
                "shop_item_id": subscription.key.shop_item_id.to_string(),
                "current_period_end": current_period_end,
            }),
        ),
        CommittedEvent::SubscriptionCancelled {
            subscription,
            item_name,
            revocation,
        } => {
            let mut details = json!({
                "provider_subscription_id": subscription.provider_subscription_id,
                "shop_item_id": subscription.key.shop_item_id.to_string(),
                "item_name": item_name,
            });
            let action = match revocation {
                Revocation::Revoked(role) => {
                    details["role_id"] = json!(role.as_str());
                    AuditAction::SubscriptionCancelled
                }
                Revocation::Failed { role, error } => {
                    details["role_id"] = json!(role.as_str());
                    details["error"] = json!(error);
                    AuditAction::RoleRevokeFailed
                }
                Revocation::NoRole => AuditAction::SubscriptionCancelled,
            };
            AuditLogEntry::new(
                Some(subscription.key.guild_id.clone()),
                ACTOR,
                action,
                format!("user:{}", subscription.key.discord_user_id),
                details,
            )
        }
    }
}

fn role_action(grant: &RoleGrant, granted: AuditAction) -> AuditAction {
    match grant {
        RoleGrant::Failed { .. } => AuditAction::RoleGrantFailed,
        RoleGrant::Granted(_) | RoleGrant::NotConfigured => granted,
    }
}

fn annotate_role(details: &mut serde_json::Value, grant: &RoleGrant) {
    let role: Option<&RoleId> = match grant {
        RoleGrant::Granted(role) => Some(role),
        RoleGrant::Failed { role, error } => {
            details["error"] = json!(error);
            Some(role)
        }
        RoleGrant::NotConfigured => None,
    };
    details["role_id"] = json!(role.map(|r| r.as_str()));
}

// ════════════════════════════════════════════════════════════════════════════════
// Announcements
// ════════════════════════════════════════════════════════════════════════════════

pub struct NotifyHook {
    sink: Arc<dyn NotificationSink>,
}

impl NotifyHook {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl PostCommitHook for NotifyHook {
    fn name(&self) -> &'static str {
        "notify"
    }

    async fn run(&self, event: &CommittedEvent) -> Result<(), HookError> {
        let Some(notification) = notification_for(event) else {
            return Ok(());
        };
        self.sink
            .notify(&notification)
            .await
            .map_err(|e| HookError(e.to_string()))
    }
}

pub fn notification_for(event: &CommittedEvent) -> Option<Notification> {
    match event {
        CommittedEvent::Fulfilled {
            guild_id,
            buyer,
            item,
            ..
        } => Some(Notification {
            guild_id: guild_id.clone(),
            kind: NotificationKind::Purchase,
            content: format!("<@{}> purchased **{}**", buyer, item.name),
        }),
        CommittedEvent::SubscriptionCancelled {
            subscription,
            item_name,
            ..
        } => Some(Notification {
            guild_id: subscription.key.guild_id.clone(),
            kind: NotificationKind::Cancellation,
            content: format!(
                "<@{}> cancelled their **{}** subscription",
                subscription.key.discord_user_id,
                item_name.as_deref().unwrap_or("shop")
            ),
        }),
        _ => None,
    }
}
