//! WebhookProcessor - verifies, deduplicates and applies provider callbacks.
//!
//! Pipeline:
//!
//! 1. Resolve the active configuration the callback is addressed to.
//! 2. Verify the signature over the raw bytes (nothing is parsed before this).
//! 3. Parse into a normalized [`ProviderEvent`].
//! 4. Skip events already recorded as processed.
//! 5. Dispatch. Every mutation is a guarded transition, so a concurrent or
//!    redelivered copy of the same event turns into a no-op.
//! 6. Record the outcome. Errors are not recorded so the provider redelivers.

use std::sync::Arc;

use http::HeaderMap;

use crate::application::fulfillment::{FulfillmentEngine, Purchase};
use crate::application::post_commit::{CommittedEvent, PostCommitHooks};
use crate::domain::checkout::{
    OrderStatus, Payment, PaymentStatus, ProviderConfig, ProviderKind,
};
use crate::domain::foundation::{CouponId, DiscordUserId, DomainError, GuildId, Money, OrderId};
use crate::domain::shop::{ClaimOutcome, ShopItem, ShopOrder};
use crate::domain::webhook::{
    CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookError, WebhookOutcome,
};
use crate::ports::{
    CaptureStatus, OrderRepository, PaymentRepository, ProviderConfigStore, ProviderFactory,
    SaveResult, ShopRepository, SubscriptionRepository, WebhookEventRecord,
    WebhookEventRepository,
};

/// Raw callback as received over HTTP.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Provider path segment, e.g. `stripe`.
    pub provider: String,
    /// `guild_id` query parameter; absent for platform-owned accounts.
    pub guild_id: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Everything resolved about the destination before dispatch.
struct Destination {
    provider: ProviderKind,
    guild_id: Option<GuildId>,
    config: ProviderConfig,
}

impl Destination {
    /// A callback signed with a guild's secret may only touch that guild's
    /// records. Platform-addressed callbacks are signed with the platform's
    /// own secret and may settle any order it collected for.
    fn ensure_owns(&self, claimed: Option<&GuildId>) -> Result<(), WebhookError> {
        match &self.guild_id {
            None => Ok(()),
            Some(addressed) if claimed == Some(addressed) => Ok(()),
            Some(addressed) => {
                let claimed = claimed.map_or_else(|| "none".to_string(), |g| g.to_string());
                tracing::warn!(
                    security = true,
                    provider = self.provider.as_str(),
                    addressed_guild = %addressed,
                    claimed_guild = %claimed,
                    "webhook body names a different guild than its destination"
                );
                Err(WebhookError::CrossTenantMismatch {
                    addressed: addressed.to_string(),
                    claimed,
                })
            }
        }
    }
}

/// What a confirmed shop purchase needs before claiming.
struct ShopPurchase {
    guild_id: GuildId,
    buyer: DiscordUserId,
    item: ShopItem,
    transaction_id: String,
    amount: Money,
    coupon_id: Option<CouponId>,
    order_id: Option<OrderId>,
    subscription_id: Option<String>,
}

pub struct WebhookProcessor {
    configs: Arc<dyn ProviderConfigStore>,
    providers: Arc<dyn ProviderFactory>,
    events: Arc<dyn WebhookEventRepository>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    shop: Arc<dyn ShopRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    fulfillment: Arc<FulfillmentEngine>,
    hooks: Arc<PostCommitHooks>,
}

impl WebhookProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        configs: Arc<dyn ProviderConfigStore>,
        providers: Arc<dyn ProviderFactory>,
        events: Arc<dyn WebhookEventRepository>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        shop: Arc<dyn ShopRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        fulfillment: Arc<FulfillmentEngine>,
        hooks: Arc<PostCommitHooks>,
    ) -> Self {
        Self {
            configs,
            providers,
            events,
            orders,
            payments,
            shop,
            subscriptions,
            fulfillment,
            hooks,
        }
    }

    pub async fn process(&self, cmd: ProcessWebhookCommand) -> Result<WebhookOutcome, WebhookError> {
        let destination = self.resolve(&cmd).await?;
        let provider = destination.provider;

        let source = self.providers.webhooks(&destination.config)?;
        if let Err(err) = source.verify(&cmd.headers, &cmd.body).await {
            tracing::warn!(
                security = true,
                provider = provider.as_str(),
                guild_id = ?destination.guild_id,
                error = %err,
                "webhook signature rejected"
            );
            return Err(err);
        }

        let envelope = source.parse(&cmd.body)?;
        tracing::info!(
            provider = provider.as_str(),
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            "webhook received"
        );

        if self
            .events
            .find_by_event_id(provider, &envelope.event_id)
            .await?
            .is_some()
        {
            tracing::info!(
                provider = provider.as_str(),
                event_id = %envelope.event_id,
                "event already processed"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let outcome = match self.dispatch(&destination, &envelope).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    provider = provider.as_str(),
                    event_id = %envelope.event_id,
                    retryable = err.is_retryable(),
                    error = %err,
                    "webhook processing failed"
                );
                return Err(err);
            }
        };

        let record = WebhookEventRecord::from_outcome(provider, &envelope, &outcome);
        match self.events.save(record).await? {
            SaveResult::Inserted => {
                tracing::info!(
                    provider = provider.as_str(),
                    event_id = %envelope.event_id,
                    result = outcome.result_label(),
                    "webhook processed"
                );
                Ok(outcome)
            }
            SaveResult::AlreadyExists => {
                tracing::info!(
                    provider = provider.as_str(),
                    event_id = %envelope.event_id,
                    "concurrent delivery recorded first"
                );
                Ok(WebhookOutcome::AlreadyProcessed)
            }
        }
    }

    async fn resolve(&self, cmd: &ProcessWebhookCommand) -> Result<Destination, WebhookError> {
        let provider: ProviderKind = cmd
            .provider
            .parse()
            .map_err(|_| WebhookError::UnsupportedProvider(cmd.provider.clone()))?;

        let guild_id = cmd
            .guild_id
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .map(GuildId::new)
            .transpose()
            .map_err(|_| WebhookError::ParseError("guild_id is not a valid snowflake".into()))?;

        let unknown = || WebhookError::UnknownDestination {
            provider: provider.as_str().to_string(),
            destination: guild_id
                .as_ref()
                .map_or_else(|| "platform".to_string(), |g| format!("guild {}", g)),
        };

        let config = self
            .configs
            .find(guild_id.as_ref(), provider)
            .await?
            .filter(|c| c.active)
            .ok_or_else(unknown)?;

        Ok(Destination {
            provider,
            guild_id,
            config,
        })
    }

    async fn dispatch(
        &self,
        dest: &Destination,
        envelope: &WebhookEnvelope,
    ) -> Result<WebhookOutcome, WebhookError> {
        match &envelope.event {
            ProviderEvent::PaymentCompleted(completed) => {
                self.on_payment_completed(dest, completed).await
            }
            ProviderEvent::PaymentApproved { transaction_id } => {
                self.on_payment_approved(dest, transaction_id).await
            }
            ProviderEvent::PaymentFailed {
                transaction_id,
                reason,
            } => self.on_payment_failed(dest, transaction_id, reason).await,
            ProviderEvent::SubscriptionUpdated {
                subscription_id,
                current_period_end,
            } => {
                self.on_subscription_updated(dest, subscription_id, *current_period_end)
                    .await
            }
            ProviderEvent::SubscriptionDeleted { subscription_id } => {
                self.on_subscription_deleted(dest, subscription_id).await
            }
            ProviderEvent::Ignored => Ok(WebhookOutcome::ignored(format!(
                "unhandled event type {}",
                envelope.event_type
            ))),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payments
    // ════════════════════════════════════════════════════════════════════════════

    async fn on_payment_completed(
        &self,
        dest: &Destination,
        completed: &CompletedPayment,
    ) -> Result<WebhookOutcome, WebhookError> {
        if let Some(claimed) = &completed.metadata.guild_id {
            dest.ensure_owns(Some(claimed))?;
        }

        if let Some(payment) = self
            .payments
            .find_by_transaction(dest.provider, &completed.transaction_id)
            .await?
        {
            return self.settle_order_payment(dest, payment, completed).await;
        }

        // Crypto processors echo our payment id back before their own
        // transaction id has been recorded against it.
        if let Some(payment_id) = &completed.metadata.payment_id {
            if let Some(payment) = self.payments.find(payment_id).await? {
                if payment.provider != dest.provider {
                    tracing::warn!(
                        security = true,
                        payment_id = %payment.id,
                        payment_provider = payment.provider.as_str(),
                        provider = dest.provider.as_str(),
                        "callback names a payment made with another provider"
                    );
                    return Ok(WebhookOutcome::ignored("payment belongs to another provider"));
                }
                return self.settle_order_payment(dest, payment, completed).await;
            }
        }

        let Some(item_id) = completed.metadata.shop_item_id else {
            tracing::warn!(
                provider = dest.provider.as_str(),
                transaction_id = %completed.transaction_id,
                "completed payment matches no order or shop item"
            );
            return Ok(WebhookOutcome::ignored("no matching payment"));
        };

        let Some(item) = self.shop.find_item(&item_id).await? else {
            tracing::error!(
                shop_item_id = %item_id,
                transaction_id = %completed.transaction_id,
                "paid for a shop item that no longer exists"
            );
            return Ok(WebhookOutcome::ignored("unknown shop item"));
        };
        dest.ensure_owns(Some(&item.guild_id))?;
        if let Some(claimed) = &completed.metadata.guild_id {
            if claimed != &item.guild_id {
                tracing::warn!(
                    security = true,
                    item_guild = %item.guild_id,
                    claimed_guild = %claimed,
                    "shop item belongs to a different guild than the purchase metadata"
                );
                return Err(WebhookError::CrossTenantMismatch {
                    addressed: item.guild_id.to_string(),
                    claimed: claimed.to_string(),
                });
            }
        }

        let buyer = completed
            .metadata
            .discord_user_id
            .clone()
            .ok_or(WebhookError::MissingField("discord_user_id"))?;

        let purchase = ShopPurchase {
            guild_id: item.guild_id.clone(),
            buyer,
            amount: completed.amount.clone().unwrap_or_else(|| item.price.clone()),
            item,
            transaction_id: completed.transaction_id.clone(),
            coupon_id: completed.metadata.coupon_id,
            order_id: completed.metadata.order_id,
            subscription_id: completed.subscription_id.clone(),
        };
        self.claim_and_fulfill(dest, purchase).await
    }

    async fn settle_order_payment(
        &self,
        dest: &Destination,
        payment: Payment,
        completed: &CompletedPayment,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(order) = self.orders.find(&payment.order_id).await? else {
            tracing::error!(
                payment_id = %payment.id,
                order_id = %payment.order_id,
                "payment references a missing order"
            );
            return Ok(WebhookOutcome::ignored("order not found"));
        };
        dest.ensure_owns(order.guild_id.as_ref())?;

        // Every lookup and ownership check happens before the first write.
        let item = match order.item.shop_item_id() {
            Some(item_id) => {
                let item = self.shop.find_item(&item_id).await?;
                match &item {
                    Some(item) => dest.ensure_owns(Some(&item.guild_id))?,
                    None => tracing::error!(
                        shop_item_id = %item_id,
                        order_id = %order.id,
                        "paid order references a missing shop item"
                    ),
                }
                item
            }
            None => None,
        };
        let transaction_id = payment
            .transaction_id
            .clone()
            .unwrap_or_else(|| completed.transaction_id.clone());

        let newly_settled = self
            .payments
            .settle(&payment.id, PaymentStatus::Completed)
            .await?;
        if !newly_settled {
            let current = self.payments.find(&payment.id).await?.map(|p| p.status);
            if current != Some(PaymentStatus::Completed) {
                tracing::info!(
                    payment_id = %payment.id,
                    status = current.map_or("missing", |s| s.as_str()),
                    "payment already settled without completing"
                );
                return Ok(WebhookOutcome::Duplicate);
            }
        }

        // Re-run on redelivery: a previous attempt may have stopped between writes.
        let order_paid = self.orders.settle(&order.id, OrderStatus::Paid).await?;
        if newly_settled {
            if !order_paid {
                tracing::warn!(order_id = %order.id, "order was not pending when its payment completed");
            }
            self.hooks
                .run(&CommittedEvent::PaymentCompleted {
                    guild_id: order.guild_id.clone(),
                    order_id: order.id,
                    payment_id: payment.id,
                    provider: dest.provider,
                    transaction_id: transaction_id.clone(),
                })
                .await;
        }

        // The shop order claim, not the payment status, gates fulfillment.
        let Some(item) = item else {
            return Ok(if newly_settled {
                WebhookOutcome::Processed
            } else {
                WebhookOutcome::Duplicate
            });
        };

        let purchase = ShopPurchase {
            guild_id: item.guild_id.clone(),
            buyer: order.buyer.clone(),
            amount: completed.amount.clone().unwrap_or(payment.amount),
            item,
            transaction_id,
            coupon_id: completed.metadata.coupon_id,
            order_id: Some(order.id),
            subscription_id: completed.subscription_id.clone(),
        };
        self.claim_and_fulfill(dest, purchase).await
    }

    async fn claim_and_fulfill(
        &self,
        dest: &Destination,
        purchase: ShopPurchase,
    ) -> Result<WebhookOutcome, WebhookError> {
        let claim = ShopOrder {
            id: uuid::Uuid::new_v4(),
            guild_id: purchase.guild_id.clone(),
            shop_item_id: purchase.item.id,
            discord_user_id: purchase.buyer.clone(),
            provider: dest.provider,
            transaction_id: purchase.transaction_id.clone(),
            amount: purchase.amount,
            coupon_id: purchase.coupon_id,
            order_id: purchase.order_id,
            created_at: chrono::Utc::now(),
        };

        if self.shop.claim_order(&claim).await? == ClaimOutcome::AlreadyClaimed {
            tracing::info!(
                provider = dest.provider.as_str(),
                transaction_id = %purchase.transaction_id,
                "shop order already claimed"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        if let Some(coupon_id) = purchase.coupon_id {
            self.redeem_coupon(&coupon_id).await;
        }

        let fulfilled = self
            .fulfillment
            .fulfill(&Purchase {
                guild_id: purchase.guild_id,
                buyer: purchase.buyer,
                item: purchase.item,
                provider: dest.provider,
                transaction_id: purchase.transaction_id.clone(),
                subscription_id: purchase.subscription_id,
                config: dest.config.clone(),
            })
            .await;

        // The claim is committed; a redelivery would only see AlreadyClaimed.
        if let Err(err) = fulfilled {
            tracing::error!(
                provider = dest.provider.as_str(),
                transaction_id = %purchase.transaction_id,
                error = %err,
                "fulfillment failed after claim; needs manual remediation"
            );
        }
        Ok(WebhookOutcome::Processed)
    }

    async fn redeem_coupon(&self, coupon_id: &CouponId) {
        let result: Result<(), DomainError> = async {
            let Some(mut coupon) = self.shop.find_coupon(coupon_id).await? else {
                tracing::warn!(coupon_id = %coupon_id, "redeemed coupon not found");
                return Ok(());
            };
            coupon.record_redemption();
            self.shop.save_coupon_redemptions(&coupon).await
        }
        .await;

        if let Err(err) = result {
            tracing::error!(coupon_id = %coupon_id, error = %err, "failed to count coupon redemption");
        }
    }

    async fn on_payment_approved(
        &self,
        dest: &Destination,
        transaction_id: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        if !dest.config.auto_verify {
            return Ok(WebhookOutcome::ignored("approved; awaiting capture"));
        }

        let Some(payment) = self
            .payments
            .find_by_transaction(dest.provider, transaction_id)
            .await?
        else {
            return Ok(WebhookOutcome::ignored("no matching payment"));
        };
        if let Some(order) = self.orders.find(&payment.order_id).await? {
            dest.ensure_owns(order.guild_id.as_ref())?;
        }
        match payment.status {
            PaymentStatus::Pending => {}
            // Captured earlier; let the claim decide whether delivery still owes.
            PaymentStatus::Completed => {
                return self
                    .on_payment_completed(dest, &CompletedPayment::bare(transaction_id))
                    .await;
            }
            PaymentStatus::Failed => return Ok(WebhookOutcome::Duplicate),
        }

        let provider = self.providers.checkout(&dest.config)?;
        match provider.capture(transaction_id).await? {
            CaptureStatus::Completed => {
                self.on_payment_completed(dest, &CompletedPayment::bare(transaction_id))
                    .await
            }
            CaptureStatus::Pending => Ok(WebhookOutcome::ignored("capture pending")),
            CaptureStatus::Declined => {
                self.on_payment_failed(dest, transaction_id, "capture declined")
                    .await
            }
        }
    }

    async fn on_payment_failed(
        &self,
        dest: &Destination,
        transaction_id: &str,
        reason: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(payment) = self
            .payments
            .find_by_transaction(dest.provider, transaction_id)
            .await?
        else {
            return Ok(WebhookOutcome::ignored("no matching payment"));
        };
        let order = self.orders.find(&payment.order_id).await?;
        if let Some(order) = &order {
            dest.ensure_owns(order.guild_id.as_ref())?;
        }

        if !self.payments.settle(&payment.id, PaymentStatus::Failed).await? {
            return Ok(WebhookOutcome::Duplicate);
        }
        if let Some(order) = &order {
            self.orders.settle(&order.id, OrderStatus::Failed).await?;
        }

        tracing::info!(
            provider = dest.provider.as_str(),
            payment_id = %payment.id,
            reason,
            "payment failed"
        );
        self.hooks
            .run(&CommittedEvent::PaymentFailed {
                guild_id: order.and_then(|o| o.guild_id),
                order_id: payment.order_id,
                payment_id: payment.id,
                provider: dest.provider,
                transaction_id: transaction_id.to_string(),
                reason: reason.to_string(),
            })
            .await;
        Ok(WebhookOutcome::Processed)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    async fn on_subscription_updated(
        &self,
        dest: &Destination,
        subscription_id: &str,
        current_period_end: chrono::DateTime<chrono::Utc>,
    ) -> Result<WebhookOutcome, WebhookError> {
        // Renewals can arrive before the checkout that created the row.
        let Some(subscription) = self
            .subscriptions
            .find_active_by_provider_id(subscription_id)
            .await?
        else {
            tracing::info!(subscription_id, "renewal for unknown subscription; skipping");
            return Ok(WebhookOutcome::ignored("unknown subscription"));
        };
        dest.ensure_owns(Some(&subscription.key.guild_id))?;

        if !self
            .subscriptions
            .update_period_end(subscription_id, current_period_end)
            .await?
        {
            return Ok(WebhookOutcome::ignored("unknown subscription"));
        }

        self.hooks
            .run(&CommittedEvent::SubscriptionRenewed {
                subscription,
                current_period_end,
            })
            .await;
        Ok(WebhookOutcome::Processed)
    }

    async fn on_subscription_deleted(
        &self,
        dest: &Destination,
        subscription_id: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(subscription) = self
            .subscriptions
            .find_active_by_provider_id(subscription_id)
            .await?
        else {
            return Ok(WebhookOutcome::ignored("no active subscription"));
        };
        dest.ensure_owns(Some(&subscription.key.guild_id))?;

        if !self.subscriptions.cancel(&subscription.key).await? {
            return Ok(WebhookOutcome::Duplicate);
        }

        if let Err(err) = self.fulfillment.revoke(&subscription).await {
            tracing::error!(
                subscription_id,
                error = %err,
                "subscription cancelled but role revocation could not run"
            );
        }
        Ok(WebhookOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryAuditLog, InMemoryOrderStore, InMemoryProviderConfigStore,
        InMemoryShopRepository, InMemorySubscriptionRepository, InMemoryWebhookEventRepository,
        RecordingBotApi, RecordingNotificationSink, StubProviderFactory,
    };
    use crate::domain::checkout::{BillingPeriod, Order, OrderItem, PurchaseMetadata};
    use crate::domain::foundation::{RoleId, ShopItemId};
    use crate::domain::shop::{BillingType, Coupon, DeliveryType, ShopSubscription, SubscriptionKey};
    use chrono::Utc;
    use serde_json::json;

    const GUILD: &str = "111";
    const BUYER: &str = "222";
    const ROLE: &str = "333";

    struct Fixture {
        configs: Arc<InMemoryProviderConfigStore>,
        providers: Arc<StubProviderFactory>,
        events: Arc<InMemoryWebhookEventRepository>,
        store: Arc<InMemoryOrderStore>,
        shop: Arc<InMemoryShopRepository>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
        bot: Arc<RecordingBotApi>,
        processor: WebhookProcessor,
    }

    async fn fixture() -> Fixture {
        let configs = Arc::new(InMemoryProviderConfigStore::new());
        let providers = Arc::new(StubProviderFactory::new());
        let events = Arc::new(InMemoryWebhookEventRepository::new());
        let store = Arc::new(InMemoryOrderStore::new());
        let shop = Arc::new(InMemoryShopRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let bot = Arc::new(RecordingBotApi::new());
        let hooks = Arc::new(PostCommitHooks::standard(
            Arc::new(InMemoryAuditLog::new()),
            Arc::new(RecordingNotificationSink::new()),
        ));
        let fulfillment = Arc::new(FulfillmentEngine::new(
            shop.clone(),
            subscriptions.clone(),
            bot.clone(),
            providers.clone(),
            hooks.clone(),
        ));
        let processor = WebhookProcessor::new(
            configs.clone(),
            providers.clone(),
            events.clone(),
            store.clone(),
            store.clone(),
            shop.clone(),
            subscriptions.clone(),
            fulfillment,
            hooks,
        );

        configs.insert(config(ProviderKind::Stripe, false)).await;

        Fixture {
            configs,
            providers,
            events,
            store,
            shop,
            subscriptions,
            bot,
            processor,
        }
    }

    fn guild() -> GuildId {
        GuildId::new(GUILD).unwrap()
    }

    fn buyer() -> DiscordUserId {
        DiscordUserId::new(BUYER).unwrap()
    }

    fn config(provider: ProviderKind, auto_verify: bool) -> ProviderConfig {
        ProviderConfig {
            guild_id: Some(guild()),
            provider,
            active: true,
            auto_verify,
            sandbox: true,
            credentials: json!({}),
        }
    }

    fn role_item() -> ShopItem {
        ShopItem {
            id: ShopItemId::new(),
            guild_id: guild(),
            name: "VIP".to_string(),
            delivery_type: DeliveryType::Role,
            billing_type: BillingType::OneTime,
            discord_role_id: Some(RoleId::new(ROLE).unwrap()),
            price: Money::new(500, "USD").unwrap(),
        }
    }

    fn completed(txn: &str, item: &ShopItem) -> ProviderEvent {
        ProviderEvent::PaymentCompleted(CompletedPayment {
            transaction_id: txn.to_string(),
            metadata: PurchaseMetadata {
                guild_id: Some(guild()),
                discord_user_id: Some(buyer()),
                shop_item_id: Some(item.id),
                ..PurchaseMetadata::default()
            },
            subscription_id: None,
            amount: None,
        })
    }

    fn deliver(f: &Fixture, provider: ProviderKind, event_id: &str, event: ProviderEvent) -> ProcessWebhookCommand {
        let body = format!("{}:{}", provider.as_str(), event_id).into_bytes();
        f.providers.register_event(
            body.clone(),
            WebhookEnvelope {
                event_id: event_id.to_string(),
                event_type: "test.event".to_string(),
                event,
                payload: json!({ "id": event_id }),
            },
        );
        ProcessWebhookCommand {
            provider: provider.as_str().to_string(),
            guild_id: Some(GUILD.to_string()),
            headers: StubProviderFactory::signed_headers(),
            body,
        }
    }

    #[tokio::test]
    async fn shop_purchase_is_claimed_and_delivered_once() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;

        let first = deliver(&f, ProviderKind::Stripe, "evt_1", completed("cs_1", &item));
        assert_eq!(
            f.processor.process(first.clone()).await.unwrap(),
            WebhookOutcome::Processed
        );

        // Same event redelivered.
        assert_eq!(
            f.processor.process(first).await.unwrap(),
            WebhookOutcome::AlreadyProcessed
        );

        // Different event for the same transaction.
        let second = deliver(&f, ProviderKind::Stripe, "evt_2", completed("cs_1", &item));
        assert_eq!(
            f.processor.process(second).await.unwrap(),
            WebhookOutcome::Duplicate
        );

        assert_eq!(f.shop.orders().await.len(), 1);
        assert_eq!(f.bot.added().await.len(), 1);
        assert_eq!(f.events.records().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_signature_changes_nothing() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let mut cmd = deliver(&f, ProviderKind::Stripe, "evt_1", completed("cs_1", &item));
        cmd.headers.insert(
            crate::adapters::memory::STUB_SIGNATURE_HEADER,
            http::HeaderValue::from_static("forged"),
        );

        let err = f.processor.process(cmd).await.unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert!(f.shop.orders().await.is_empty());
        assert!(f.events.records().await.is_empty());
    }

    #[tokio::test]
    async fn unsupported_provider_and_unknown_destination_are_rejected() {
        let f = fixture().await;
        let item = role_item();

        let mut cmd = deliver(&f, ProviderKind::Stripe, "evt_1", completed("cs_1", &item));
        cmd.provider = "venmo".to_string();
        assert!(matches!(
            f.processor.process(cmd).await,
            Err(WebhookError::UnsupportedProvider(_))
        ));

        let cmd = deliver(&f, ProviderKind::PayPal, "evt_2", completed("cs_2", &item));
        assert!(matches!(
            f.processor.process(cmd).await,
            Err(WebhookError::UnknownDestination { .. })
        ));
    }

    #[tokio::test]
    async fn inactive_configuration_is_an_unknown_destination() {
        let f = fixture().await;
        let mut inactive = config(ProviderKind::Stripe, false);
        inactive.active = false;
        f.configs.insert(inactive).await;

        let cmd = deliver(&f, ProviderKind::Stripe, "evt_1", completed("cs_1", &role_item()));
        assert!(matches!(
            f.processor.process(cmd).await,
            Err(WebhookError::UnknownDestination { .. })
        ));
    }

    #[tokio::test]
    async fn metadata_for_another_guild_is_rejected_before_any_write() {
        let f = fixture().await;
        let mut item = role_item();
        item.guild_id = GuildId::new("999").unwrap();
        f.shop.add_item(item.clone()).await;
        let event = ProviderEvent::PaymentCompleted(CompletedPayment {
            transaction_id: "cs_1".to_string(),
            metadata: PurchaseMetadata {
                guild_id: Some(GuildId::new("999").unwrap()),
                discord_user_id: Some(buyer()),
                shop_item_id: Some(item.id),
                ..PurchaseMetadata::default()
            },
            subscription_id: None,
            amount: None,
        });

        let err = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_1", event))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::CrossTenantMismatch { .. }));
        assert!(f.shop.orders().await.is_empty());
        assert!(f.bot.added().await.is_empty());
        assert!(f.events.records().await.is_empty());
    }

    #[tokio::test]
    async fn shop_purchase_without_buyer_is_a_bad_request() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let event = ProviderEvent::PaymentCompleted(CompletedPayment {
            transaction_id: "cs_1".to_string(),
            metadata: PurchaseMetadata {
                guild_id: Some(guild()),
                shop_item_id: Some(item.id),
                ..PurchaseMetadata::default()
            },
            subscription_id: None,
            amount: None,
        });

        let err = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_1", event))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingField("discord_user_id")));
    }

    async fn pending_order(f: &Fixture, item: &ShopItem, provider: ProviderKind, txn: &str) -> Payment {
        let mut payment = unrecorded_order(f, item, provider).await;
        payment.transaction_id = Some(txn.to_string());
        f.store.insert_payment(payment.clone()).await;
        payment
    }

    /// Pending order whose provider transaction id is not known yet.
    async fn unrecorded_order(f: &Fixture, item: &ShopItem, provider: ProviderKind) -> Payment {
        let order = Order {
            id: OrderId::new(),
            order_number: "ORD-1".to_string(),
            guild_id: Some(guild()),
            buyer: buyer(),
            item: OrderItem::ShopItem {
                shop_item_id: item.id,
                name: item.name.clone(),
                billing_period: BillingPeriod::OneTime,
            },
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let payment = Payment::new_pending(order.id, provider, item.price.clone());
        f.store.insert_order(order).await;
        f.store.insert_payment(payment.clone()).await;
        payment
    }

    #[tokio::test]
    async fn order_payment_settles_order_and_fulfills() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::Stripe, "cs_9").await;

        let event = ProviderEvent::PaymentCompleted(CompletedPayment::bare("cs_9"));
        let outcome = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        let stored = f.store.payment(&payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        let order = f.store.order(&payment.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(f.shop.orders().await[0].order_id, Some(order.id));
        assert_eq!(f.bot.added().await.len(), 1);
    }

    #[tokio::test]
    async fn claim_failure_after_settling_is_fulfilled_on_redelivery() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::Stripe, "cs_9").await;
        f.shop.fail_next_claim().await;
        let event = || ProviderEvent::PaymentCompleted(CompletedPayment::bare("cs_9"));

        let first = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event()))
            .await;
        assert!(matches!(first, Err(WebhookError::Database(_))));
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Completed
        );
        assert!(f.events.records().await.is_empty());

        let redelivered = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event()))
            .await
            .unwrap();
        let later = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_10", event()))
            .await
            .unwrap();

        assert_eq!(redelivered, WebhookOutcome::Processed);
        assert_eq!(later, WebhookOutcome::Duplicate);
        assert_eq!(
            f.store.order(&payment.order_id).await.unwrap().status,
            OrderStatus::Paid
        );
        assert_eq!(f.shop.orders().await.len(), 1);
        assert_eq!(f.bot.added().await.len(), 1);
    }

    #[tokio::test]
    async fn item_lookup_failure_leaves_the_payment_pending() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::Stripe, "cs_9").await;
        f.shop.fail_next_item_lookup().await;
        let event = || ProviderEvent::PaymentCompleted(CompletedPayment::bare("cs_9"));

        let first = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event()))
            .await;
        assert!(matches!(first, Err(WebhookError::Database(_))));
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Pending
        );
        assert_eq!(
            f.store.order(&payment.order_id).await.unwrap().status,
            OrderStatus::Pending
        );

        let redelivered = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event()))
            .await
            .unwrap();

        assert_eq!(redelivered, WebhookOutcome::Processed);
        assert_eq!(f.shop.orders().await.len(), 1);
        assert_eq!(f.bot.added().await.len(), 1);
    }

    #[tokio::test]
    async fn order_for_another_guilds_item_is_rejected_before_settling() {
        let f = fixture().await;
        let mut item = role_item();
        item.guild_id = GuildId::new("999").unwrap();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::Stripe, "cs_9").await;

        let err = f
            .processor
            .process(deliver(
                &f,
                ProviderKind::Stripe,
                "evt_9",
                ProviderEvent::PaymentCompleted(CompletedPayment::bare("cs_9")),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::CrossTenantMismatch { .. }));
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Pending
        );
        assert_eq!(
            f.store.order(&payment.order_id).await.unwrap().status,
            OrderStatus::Pending
        );
        assert!(f.shop.orders().await.is_empty());
        assert!(f.events.records().await.is_empty());
    }

    fn completed_for_payment(txn: &str, payment: &Payment) -> ProviderEvent {
        ProviderEvent::PaymentCompleted(CompletedPayment {
            transaction_id: txn.to_string(),
            metadata: PurchaseMetadata {
                payment_id: Some(payment.id),
                ..PurchaseMetadata::default()
            },
            subscription_id: None,
            amount: None,
        })
    }

    #[tokio::test]
    async fn ipn_is_matched_through_the_echoed_payment_id() {
        let f = fixture().await;
        f.configs.insert(config(ProviderKind::NowPayments, false)).await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = unrecorded_order(&f, &item, ProviderKind::NowPayments).await;

        let outcome = f
            .processor
            .process(deliver(
                &f,
                ProviderKind::NowPayments,
                "5077125051:finished",
                completed_for_payment("5077125051", &payment),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Completed
        );
        assert_eq!(
            f.store.order(&payment.order_id).await.unwrap().status,
            OrderStatus::Paid
        );
        let claims = f.shop.orders().await;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].transaction_id, "5077125051");
        assert_eq!(f.bot.added().await.len(), 1);
    }

    #[tokio::test]
    async fn echoed_payment_id_from_another_provider_is_ignored() {
        let f = fixture().await;
        f.configs.insert(config(ProviderKind::NowPayments, false)).await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = unrecorded_order(&f, &item, ProviderKind::Stripe).await;

        let outcome = f
            .processor
            .process(deliver(
                &f,
                ProviderKind::NowPayments,
                "77:finished",
                completed_for_payment("77", &payment),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Pending
        );
        assert!(f.bot.added().await.is_empty());
    }

    #[tokio::test]
    async fn coupon_is_counted_once_per_completed_session() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let coupon = Coupon {
            id: CouponId::new(),
            guild_id: guild(),
            code: "LAUNCH".to_string(),
            redemption_count: 0,
            max_redemptions: Some(10),
        };
        f.shop.add_coupon(coupon.clone()).await;
        let with_coupon = || {
            ProviderEvent::PaymentCompleted(CompletedPayment {
                transaction_id: "cs_c".to_string(),
                metadata: PurchaseMetadata {
                    guild_id: Some(guild()),
                    discord_user_id: Some(buyer()),
                    shop_item_id: Some(item.id),
                    coupon_id: Some(coupon.id),
                    ..PurchaseMetadata::default()
                },
                subscription_id: None,
                amount: None,
            })
        };

        let first = deliver(&f, ProviderKind::Stripe, "evt_c1", with_coupon());
        let outcomes = vec![
            f.processor.process(first.clone()).await.unwrap(),
            f.processor.process(first).await.unwrap(),
            f.processor
                .process(deliver(&f, ProviderKind::Stripe, "evt_c2", with_coupon()))
                .await
                .unwrap(),
        ];

        assert_eq!(
            outcomes,
            vec![
                WebhookOutcome::Processed,
                WebhookOutcome::AlreadyProcessed,
                WebhookOutcome::Duplicate,
            ]
        );
        assert_eq!(f.shop.coupon(&coupon.id).await.unwrap().redemption_count, 1);
    }

    #[tokio::test]
    async fn failed_payment_marks_order_failed_without_delivery() {
        let f = fixture().await;
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::Stripe, "cs_9").await;

        let event = ProviderEvent::PaymentFailed {
            transaction_id: "cs_9".to_string(),
            reason: "expired".to_string(),
        };
        f.processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_9", event))
            .await
            .unwrap();

        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Failed
        );
        assert_eq!(
            f.store.order(&payment.order_id).await.unwrap().status,
            OrderStatus::Failed
        );
        assert!(f.bot.added().await.is_empty());
    }

    #[tokio::test]
    async fn approved_paypal_order_is_captured_when_auto_verify_is_on() {
        let f = fixture().await;
        f.configs.insert(config(ProviderKind::PayPal, true)).await;
        f.providers.set_capture_result(CaptureStatus::Completed);
        let item = role_item();
        f.shop.add_item(item.clone()).await;
        let payment = pending_order(&f, &item, ProviderKind::PayPal, "PAYPAL-1").await;

        let event = ProviderEvent::PaymentApproved {
            transaction_id: "PAYPAL-1".to_string(),
        };
        let outcome = f
            .processor
            .process(deliver(&f, ProviderKind::PayPal, "WH-1", event))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        assert_eq!(f.providers.captured(), vec!["PAYPAL-1".to_string()]);
        assert_eq!(
            f.store.payment(&payment.id).await.unwrap().status,
            PaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn approved_paypal_order_waits_without_auto_verify() {
        let f = fixture().await;
        f.configs.insert(config(ProviderKind::PayPal, false)).await;
        let event = ProviderEvent::PaymentApproved {
            transaction_id: "PAYPAL-1".to_string(),
        };

        let outcome = f
            .processor
            .process(deliver(&f, ProviderKind::PayPal, "WH-1", event))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert!(f.providers.captured().is_empty());
    }

    async fn active_subscription(f: &Fixture, id: &str) -> ShopSubscription {
        let mut item = role_item();
        item.delivery_type = DeliveryType::Subscription;
        item.billing_type = BillingType::Subscription;
        f.shop.add_item(item.clone()).await;
        let subscription = ShopSubscription::activate(
            SubscriptionKey {
                guild_id: guild(),
                shop_item_id: item.id,
                discord_user_id: buyer(),
            },
            id,
            None,
        );
        f.subscriptions.upsert_active(&subscription).await.unwrap();
        subscription
    }

    #[tokio::test]
    async fn subscription_deleted_twice_removes_role_once() {
        let f = fixture().await;
        active_subscription(&f, "sub_1").await;
        let deleted = || ProviderEvent::SubscriptionDeleted {
            subscription_id: "sub_1".to_string(),
        };

        let first = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_a", deleted()))
            .await
            .unwrap();
        let second = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_b", deleted()))
            .await
            .unwrap();

        assert_eq!(first, WebhookOutcome::Processed);
        assert!(matches!(second, WebhookOutcome::Ignored(_)));
        assert_eq!(f.bot.removed().await.len(), 1);
    }

    #[tokio::test]
    async fn renewal_extends_period_without_touching_roles() {
        let f = fixture().await;
        active_subscription(&f, "sub_1").await;
        let end = Utc::now() + chrono::Duration::days(30);

        let outcome = f
            .processor
            .process(deliver(
                &f,
                ProviderKind::Stripe,
                "evt_r",
                ProviderEvent::SubscriptionUpdated {
                    subscription_id: "sub_1".to_string(),
                    current_period_end: end,
                },
            ))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
        let stored = f
            .subscriptions
            .find_active_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.current_period_end, Some(end));
        assert!(f.bot.added().await.is_empty());
    }

    #[tokio::test]
    async fn renewal_before_activation_is_ignored() {
        let f = fixture().await;
        let outcome = f
            .processor
            .process(deliver(
                &f,
                ProviderKind::Stripe,
                "evt_r",
                ProviderEvent::SubscriptionUpdated {
                    subscription_id: "sub_unknown".to_string(),
                    current_period_end: Utc::now(),
                },
            ))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
    }

    #[tokio::test]
    async fn unhandled_events_are_recorded_as_ignored() {
        let f = fixture().await;
        let outcome = f
            .processor
            .process(deliver(&f, ProviderKind::Stripe, "evt_x", ProviderEvent::Ignored))
            .await
            .unwrap();

        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert_eq!(f.events.records().await[0].result, "ignored");
    }
}
