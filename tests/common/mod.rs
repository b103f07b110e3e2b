//! Shared wiring for integration tests: in-memory stores, the real provider
//! adapters pointed at a mock provider API, and the real bot API client
//! pointed at a mock bot.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use guild_checkout::adapters::bot_api::{ChannelAnnouncer, HttpBotApi};
use guild_checkout::adapters::http::{router, AppState};
use guild_checkout::adapters::memory::{
    InMemoryAuditLog, InMemoryOrderStore, InMemoryProviderConfigStore, InMemoryShopRepository,
    InMemorySubscriptionRepository, InMemoryWebhookEventRepository,
};
use guild_checkout::adapters::payments::{HttpProviderFactory, ProviderEndpoints};
use guild_checkout::application::{
    CheckoutInitiator, FulfillmentEngine, InitiateCheckoutHandler, PostCommitHooks,
    ProcessWebhookCommand, WebhookProcessor,
};
use guild_checkout::domain::checkout::{
    BillingPeriod, Order, OrderItem, OrderStatus, Payment, ProviderConfig, ProviderKind,
};
use guild_checkout::domain::foundation::{
    DiscordUserId, GuildId, Money, OrderId, RoleId, ShopItemId,
};
use guild_checkout::domain::shop::{BillingType, DeliveryType, ShopItem};
use guild_checkout::domain::webhook::signature::compute_timestamped_signature;
use guild_checkout::ports::BotApi;
use secrecy::SecretString;
use serde_json::json;
use wiremock::MockServer;

pub const GUILD: &str = "111111111111111111";
pub const OTHER_GUILD: &str = "999999999999999999";
pub const BUYER: &str = "222222222222222222";
pub const ROLE: &str = "333333333333333333";
pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const INTERNAL_SECRET: &str = "internal-api-secret";
pub const BOT_SECRET: &str = "bot-secret";
pub const PUBLIC_BASE_URL: &str = "https://checkout.example.com";

pub struct Harness {
    pub provider_api: MockServer,
    pub bot_api: MockServer,
    pub configs: Arc<InMemoryProviderConfigStore>,
    pub store: Arc<InMemoryOrderStore>,
    pub shop: Arc<InMemoryShopRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub events: Arc<InMemoryWebhookEventRepository>,
    pub audit: Arc<InMemoryAuditLog>,
    pub processor: Arc<WebhookProcessor>,
    pub checkout: Arc<InitiateCheckoutHandler>,
}

impl Harness {
    pub async fn new() -> Self {
        let provider_api = MockServer::start().await;
        let bot_api = MockServer::start().await;

        let configs = Arc::new(InMemoryProviderConfigStore::new());
        let store = Arc::new(InMemoryOrderStore::new());
        let shop = Arc::new(InMemoryShopRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let events = Arc::new(InMemoryWebhookEventRepository::new());
        let audit = Arc::new(InMemoryAuditLog::new());

        let providers = Arc::new(HttpProviderFactory::with_client(
            reqwest::Client::new(),
            ProviderEndpoints::all(&provider_api.uri()),
            chrono::Duration::minutes(10),
        ));
        let bot: Arc<dyn BotApi> = Arc::new(HttpBotApi::with_client(
            reqwest::Client::new(),
            &bot_api.uri(),
            BOT_SECRET.to_string(),
        ));
        let announcer = Arc::new(ChannelAnnouncer::new(shop.clone(), bot.clone()));
        let hooks = Arc::new(PostCommitHooks::standard(audit.clone(), announcer));

        let fulfillment = Arc::new(FulfillmentEngine::new(
            shop.clone(),
            subscriptions.clone(),
            bot,
            providers.clone(),
            hooks.clone(),
        ));
        let processor = Arc::new(WebhookProcessor::new(
            configs.clone(),
            providers.clone(),
            events.clone(),
            store.clone(),
            store.clone(),
            shop.clone(),
            subscriptions.clone(),
            fulfillment,
            hooks.clone(),
        ));
        let initiator = Arc::new(CheckoutInitiator::new(
            providers,
            store.clone(),
            hooks,
            PUBLIC_BASE_URL,
        ));
        let checkout = Arc::new(InitiateCheckoutHandler::new(
            store.clone(),
            store.clone(),
            configs.clone(),
            initiator,
        ));

        Self {
            provider_api,
            bot_api,
            configs,
            store,
            shop,
            subscriptions,
            events,
            audit,
            processor,
            checkout,
        }
    }

    pub fn router(&self) -> Router {
        router(
            AppState {
                webhooks: self.processor.clone(),
                checkout: self.checkout.clone(),
            },
            SecretString::new(INTERNAL_SECRET.to_string()),
            std::time::Duration::from_secs(10),
        )
    }

    /// Active Stripe configuration for [`GUILD`].
    pub async fn with_stripe(&self) {
        self.configs
            .insert(ProviderConfig {
                guild_id: Some(guild()),
                provider: ProviderKind::Stripe,
                active: true,
                auto_verify: false,
                sandbox: false,
                credentials: json!({
                    "secretKey": "sk_test_integration",
                    "webhookSecret": WEBHOOK_SECRET,
                }),
            })
            .await;
    }

    /// A pending shop order and payment for `item`.
    pub async fn pending_payment(&self, item: &ShopItem, provider: ProviderKind) -> Payment {
        let order = Order {
            id: OrderId::new(),
            order_number: "ORD-1001".to_string(),
            guild_id: Some(item.guild_id.clone()),
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
        self.store.insert_order(order).await;
        self.store.insert_payment(payment.clone()).await;
        payment
    }
}

pub fn guild() -> GuildId {
    GuildId::new(GUILD).unwrap()
}

pub fn buyer() -> DiscordUserId {
    DiscordUserId::new(BUYER).unwrap()
}

pub fn shop_item(delivery_type: DeliveryType, billing_type: BillingType) -> ShopItem {
    let grants_role = matches!(delivery_type, DeliveryType::Role | DeliveryType::Subscription);
    ShopItem {
        id: ShopItemId::new(),
        guild_id: guild(),
        name: "role-premium".to_string(),
        delivery_type,
        billing_type,
        discord_role_id: grants_role.then(|| RoleId::new(ROLE).unwrap()),
        price: Money::new(1000, "USD").unwrap(),
    }
}

/// Path the bot API client posts role grants to.
pub fn role_grant_path() -> String {
    format!("/discord/{}/users/{}/roles", GUILD, BUYER)
}

pub fn role_revoke_path() -> String {
    format!("/discord/{}/users/{}/roles/{}", GUILD, BUYER, ROLE)
}

pub fn stripe_signature(body: &[u8], timestamp: i64) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(compute_timestamped_signature(
            WEBHOOK_SECRET.as_bytes(),
            timestamp,
            body
        ))
    )
}

pub fn stripe_headers(body: &[u8]) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        "stripe-signature",
        http::HeaderValue::from_str(&stripe_signature(body, Utc::now().timestamp())).unwrap(),
    );
    headers
}

pub fn stripe_command(body: &[u8]) -> ProcessWebhookCommand {
    ProcessWebhookCommand {
        provider: "stripe".to_string(),
        guild_id: Some(GUILD.to_string()),
        headers: stripe_headers(body),
        body: body.to_vec(),
    }
}

/// `checkout.session.completed` for a shop item bought directly from the bot.
pub fn session_completed(
    event_id: &str,
    session_id: &str,
    item: &ShopItem,
    subscription: Option<&str>,
) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "amount_total": item.price.amount_cents(),
                "currency": "usd",
                "subscription": subscription,
                "metadata": {
                    "guild_id": item.guild_id.to_string(),
                    "discord_user_id": BUYER,
                    "shop_item_id": item.id.to_string(),
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub fn subscription_event(event_id: &str, event_type: &str, subscription_id: &str, period_end: i64) -> Vec<u8> {
    json!({
        "id": event_id,
        "type": event_type,
        "data": {
            "object": {
                "id": subscription_id,
                "status": "active",
                "current_period_end": period_end,
            }
        }
    })
    .to_string()
    .into_bytes()
}
