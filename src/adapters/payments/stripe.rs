//! Stripe adapter.
//!
//! Checkout uses hosted Checkout Sessions with inline `price_data`, so shop
//! items need no pre-created Stripe prices. Guilds selling through their own
//! connected account set `accountId`, sent as the `Stripe-Account` header.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{t}.{raw body}"` with constant-time comparison
//! - Timestamp validation in both directions for replay protection
//! - Secrets handled via `secrecy::SecretString`

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction, PurchaseMetadata,
};
use crate::domain::foundation::Money;
use crate::domain::webhook::signature::verify_timestamped_signature;
use crate::domain::webhook::{CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookError};
use crate::ports::{PaymentProvider, SubscriptionSnapshot, WebhookSource};

use super::factory::ProviderContext;
use super::http_util::{read_json, transport_error};

const KIND: ProviderKind = ProviderKind::Stripe;
const CONNECTED_ACCOUNT_PREFIX: &str = "acct_";
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

pub struct StripeProvider {
    ctx: ProviderContext,
    secret_key: SecretString,
    account_id: Option<String>,
}

impl StripeProvider {
    /// Rejects a malformed connected account id here, before any request.
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, CheckoutError> {
        let creds = config.credentials();
        let secret_key = creds.required_secret("secretKey")?;
        let account_id = creds.optional("accountId");
        if let Some(account) = &account_id {
            if !account.starts_with(CONNECTED_ACCOUNT_PREFIX) {
                return Err(CheckoutError::configuration(
                    KIND,
                    format!("accountId must start with `{}`", CONNECTED_ACCOUNT_PREFIX),
                ));
            }
        }
        Ok(Self {
            ctx,
            secret_key,
            account_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.ctx.endpoints.stripe_api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.basic_auth(self.secret_key.expose_secret(), Option::<&str>::None);
        match &self.account_id {
            Some(account) => builder.header("Stripe-Account", account),
            None => builder,
        }
    }
}

/// Form fields for a checkout session.
fn session_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let recurring = request.billing_period.interval();
    let mode = if recurring.is_some() { "subscription" } else { "payment" };

    let mut params: Vec<(String, String)> = vec![
        ("mode".into(), mode.into()),
        ("success_url".into(), request.urls.success.clone()),
        ("cancel_url".into(), request.urls.cancel.clone()),
        ("client_reference_id".into(), request.order_number.clone()),
        ("line_items[0][quantity]".into(), "1".into()),
        (
            "line_items[0][price_data][currency]".into(),
            request.amount.currency().to_ascii_lowercase(),
        ),
        (
            "line_items[0][price_data][unit_amount]".into(),
            request.amount.amount_cents().to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".into(),
            request.description.clone(),
        ),
    ];
    if let Some(interval) = recurring {
        params.push((
            "line_items[0][price_data][recurring][interval]".into(),
            interval.into(),
        ));
    }

    // Subscriptions copy metadata onto the subscription object so that
    // later lifecycle events carry it too.
    for (key, value) in request.metadata.to_pairs() {
        params.push((format!("metadata[{}]", key), value.clone()));
        if recurring.is_some() {
            params.push((format!("subscription_data[metadata][{}]", key), value));
        }
    }
    params
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    current_period_end: Option<i64>,
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        let response = self
            .authorized(self.ctx.client.post(self.url("/v1/checkout/sessions")))
            .form(&session_params(request))
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let session: StripeCheckoutSession = read_json(KIND, response).await?;

        let url = session
            .url
            .ok_or_else(|| CheckoutError::provider_api(KIND, "checkout session has no url"))?;

        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Redirect { url },
            transaction: ProviderTransaction {
                metadata: serde_json::json!({
                    "sessionId": session.id,
                    "accountId": self.account_id,
                }),
                transaction_id: session.id,
            },
        })
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, CheckoutError> {
        let response = self
            .authorized(
                self.ctx
                    .client
                    .get(self.url(&format!("/v1/subscriptions/{}", subscription_id))),
            )
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let subscription: StripeSubscription = read_json(KIND, response).await?;

        Ok(SubscriptionSnapshot {
            id: subscription.id,
            status: subscription.status,
            current_period_end: subscription
                .current_period_end
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

pub struct StripeWebhookSource {
    secret: SecretString,
    tolerance: chrono::Duration,
}

impl StripeWebhookSource {
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, WebhookError> {
        let secret = config
            .credentials()
            .required_secret("webhookSecret")
            .map_err(WebhookError::from)?;
        Ok(Self {
            secret,
            tolerance: ctx.signature_tolerance,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    subscription: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    current_period_end: Option<i64>,
}

fn object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> Result<T, WebhookError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| WebhookError::ParseError(format!("invalid {} object: {}", event.event_type, e)))
}

fn classify(event: &StripeEvent) -> Result<ProviderEvent, WebhookError> {
    Ok(match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: SessionObject = object(event)?;
            // Delayed payment methods complete later via async_payment_succeeded.
            if session.payment_status.as_deref() == Some("unpaid") {
                return Ok(ProviderEvent::Ignored);
            }
            let metadata = PurchaseMetadata::from_map(&session.metadata)
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
            let amount = match (session.amount_total, session.currency) {
                (Some(cents), Some(currency)) => Money::new(cents, currency).ok(),
                _ => None,
            };
            ProviderEvent::PaymentCompleted(CompletedPayment {
                transaction_id: session.id,
                metadata,
                subscription_id: session.subscription,
                amount,
            })
        }
        "checkout.session.async_payment_failed" | "checkout.session.expired" => {
            let session: SessionObject = object(event)?;
            ProviderEvent::PaymentFailed {
                transaction_id: session.id,
                reason: event.event_type.clone(),
            }
        }
        "customer.subscription.updated" => {
            let subscription: SubscriptionObject = object(event)?;
            match subscription
                .current_period_end
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            {
                Some(current_period_end) => ProviderEvent::SubscriptionUpdated {
                    subscription_id: subscription.id,
                    current_period_end,
                },
                None => ProviderEvent::Ignored,
            }
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = object(event)?;
            ProviderEvent::SubscriptionDeleted {
                subscription_id: subscription.id,
            }
        }
        _ => ProviderEvent::Ignored,
    })
}

#[async_trait]
impl WebhookSource for StripeWebhookSource {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                WebhookError::MalformedSignatureHeader("missing Stripe-Signature".to_string())
            })?;
        verify_timestamped_signature(
            self.secret.expose_secret().as_bytes(),
            header,
            body,
            Utc::now(),
            self.tolerance,
        )
    }

    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;
        let event: StripeEvent = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid event: {}", e)))?;

        Ok(WebhookEnvelope {
            event: classify(&event)?,
            event_id: event.id,
            event_type: event.event_type,
            payload,
        })
    }
}
