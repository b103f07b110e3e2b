//! PayPal adapter (Orders v2).
//!
//! Every call first exchanges the client credentials for a short-lived
//! bearer token. Webhooks are authenticated by PayPal itself through the
//! `verify-webhook-signature` endpoint, so verification is a network call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::domain::checkout::metadata::{DISCORD_USER_ID, GUILD_ID, PAYMENT_ID};
use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction, PurchaseMetadata,
};
use crate::domain::foundation::Money;
use crate::domain::webhook::signature::check_freshness;
use crate::domain::webhook::{CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookError};
use crate::ports::{CaptureStatus, PaymentProvider, WebhookSource};

use super::factory::ProviderContext;
use super::http_util::{read_json, transport_error};

const KIND: ProviderKind = ProviderKind::PayPal;

/// PayPal caps `custom_id` at 127 characters.
const CUSTOM_ID_MAX: usize = 127;

const HEADER_AUTH_ALGO: &str = "paypal-auth-algo";
const HEADER_CERT_URL: &str = "paypal-cert-url";
const HEADER_TRANSMISSION_ID: &str = "paypal-transmission-id";
const HEADER_TRANSMISSION_SIG: &str = "paypal-transmission-sig";
const HEADER_TRANSMISSION_TIME: &str = "paypal-transmission-time";

/// OAuth2 client-credentials access shared by the checkout and webhook halves.
#[derive(Clone)]
struct PayPalClient {
    ctx: ProviderContext,
    base: String,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

impl PayPalClient {
    fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, CheckoutError> {
        let creds = config.credentials();
        let base = ctx.endpoints.paypal(config.sandbox).trim_end_matches('/').to_string();
        Ok(Self {
            client_id: creds.required("clientId")?,
            client_secret: creds.required_secret("clientSecret")?,
            base,
            ctx,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn access_token(&self) -> Result<String, CheckoutError> {
        let response = self
            .ctx
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let token: AccessToken = read_json(KIND, response).await?;
        Ok(token.access_token)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

pub struct PayPalProvider {
    client: PayPalClient,
}

impl PayPalProvider {
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, CheckoutError> {
        Ok(Self {
            client: PayPalClient::from_config(ctx, config)?,
        })
    }
}

/// Metadata travels in `custom_id` as a form-encoded string. Only the keys
/// needed to route a capture fit in the length limit.
fn encode_custom_id(metadata: &PurchaseMetadata) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in metadata.to_pairs() {
        if matches!(key, PAYMENT_ID | GUILD_ID | DISCORD_USER_ID) {
            serializer.append_pair(key, &value);
        }
    }
    let mut encoded = serializer.finish();
    encoded.truncate(CUSTOM_ID_MAX);
    encoded
}

fn decode_custom_id(custom_id: Option<&str>) -> Result<PurchaseMetadata, WebhookError> {
    let Some(raw) = custom_id else {
        return Ok(PurchaseMetadata::default());
    };
    let map: HashMap<String, String> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();
    PurchaseMetadata::from_map(&map).map_err(|e| WebhookError::ParseError(e.to_string()))
}

fn order_body(request: &CheckoutRequest) -> serde_json::Value {
    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "reference_id": request.order_number,
            "invoice_id": request.payment_id.to_string(),
            "custom_id": encode_custom_id(&request.metadata),
            "description": request.description,
            "amount": {
                "currency_code": request.amount.currency(),
                "value": request.amount.to_decimal_string(),
            },
        }],
        "application_context": {
            "return_url": request.urls.success,
            "cancel_url": request.urls.cancel,
            "user_action": "PAY_NOW",
            "shipping_preference": "NO_SHIPPING",
        },
    })
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    id: String,
    status: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct CapturedOrder {
    status: String,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    payments: Option<CapturedPayments>,
}

#[derive(Debug, Deserialize)]
struct CapturedPayments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    status: String,
}

fn capture_status(order: &CapturedOrder) -> CaptureStatus {
    let capture = order
        .purchase_units
        .iter()
        .filter_map(|u| u.payments.as_ref())
        .flat_map(|p| p.captures.iter())
        .next();
    let status = capture.map_or(order.status.as_str(), |c| c.status.as_str());
    match status {
        "COMPLETED" => CaptureStatus::Completed,
        "PENDING" => CaptureStatus::Pending,
        _ => CaptureStatus::Declined,
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        if request.billing_period.is_recurring() {
            return Err(CheckoutError::InvalidRequest(
                "PayPal checkout supports one-time purchases only".to_string(),
            ));
        }

        let token = self.client.access_token().await?;
        let response = self
            .client
            .ctx
            .client
            .post(self.client.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&order_body(request))
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let order: CreatedOrder = read_json(KIND, response).await?;

        let approve = order
            .links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone())
            .ok_or_else(|| CheckoutError::provider_api(KIND, "order has no approval link"))?;

        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Redirect { url: approve },
            transaction: ProviderTransaction {
                metadata: json!({ "orderId": order.id, "status": order.status }),
                transaction_id: order.id,
            },
        })
    }

    async fn capture(&self, transaction_id: &str) -> Result<CaptureStatus, CheckoutError> {
        let token = self.client.access_token().await?;
        let response = self
            .client
            .ctx
            .client
            .post(
                self.client
                    .url(&format!("/v2/checkout/orders/{}/capture", transaction_id)),
            )
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await
            .map_err(transport_error(KIND))?;

        // A redelivered approval may race a capture that already went through.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if body.contains("ORDER_ALREADY_CAPTURED") {
                return Ok(CaptureStatus::Completed);
            }
            return Err(CheckoutError::provider_status(KIND, 422, body));
        }

        let order: CapturedOrder = read_json(KIND, response).await?;
        Ok(capture_status(&order))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

pub struct PayPalWebhookSource {
    client: PayPalClient,
    webhook_id: String,
    tolerance: chrono::Duration,
}

impl PayPalWebhookSource {
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, WebhookError> {
        let tolerance = ctx.signature_tolerance;
        let client = PayPalClient::from_config(ctx, config)?;
        let webhook_id = config.credentials().required("webhookId")?;
        Ok(Self {
            client,
            webhook_id,
            tolerance,
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WebhookError::MalformedSignatureHeader(format!("missing {}", name)))
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    verification_status: String,
}

#[derive(Debug, Deserialize)]
struct PayPalEvent {
    id: String,
    event_type: String,
    #[serde(default)]
    resource: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CaptureResource {
    id: String,
    custom_id: Option<String>,
    amount: Option<PayPalAmount>,
    supplementary_data: Option<SupplementaryData>,
}

#[derive(Debug, Deserialize)]
struct PayPalAmount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SupplementaryData {
    related_ids: Option<RelatedIds>,
}

#[derive(Debug, Deserialize)]
struct RelatedIds {
    order_id: Option<String>,
}

/// `"10.5"` / `"10.50"` -> 1050. Anything else is treated as unknown.
fn parse_amount(amount: &PayPalAmount) -> Option<Money> {
    let (whole, frac) = amount.value.split_once('.').unwrap_or((amount.value.as_str(), "0"));
    if frac.len() > 2 {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = format!("{:0<2}", frac).parse().ok()?;
    Money::new(whole.checked_mul(100)?.checked_add(frac)?, &amount.currency_code).ok()
}

impl CaptureResource {
    /// Payments are keyed by the order id returned at initiation, not the
    /// capture id.
    fn order_id(&self) -> Result<String, WebhookError> {
        self.supplementary_data
            .as_ref()
            .and_then(|s| s.related_ids.as_ref())
            .and_then(|r| r.order_id.clone())
            .ok_or(WebhookError::MissingField("supplementary_data.related_ids.order_id"))
    }
}

fn resource<T: serde::de::DeserializeOwned>(event: &PayPalEvent) -> Result<T, WebhookError> {
    serde_json::from_value(event.resource.clone())
        .map_err(|e| WebhookError::ParseError(format!("invalid {} resource: {}", event.event_type, e)))
}

fn classify(event: &PayPalEvent) -> Result<ProviderEvent, WebhookError> {
    Ok(match event.event_type.as_str() {
        "CHECKOUT.ORDER.APPROVED" => {
            let id = event
                .resource
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or(WebhookError::MissingField("resource.id"))?;
            ProviderEvent::PaymentApproved {
                transaction_id: id.to_string(),
            }
        }
        "PAYMENT.CAPTURE.COMPLETED" => {
            let capture: CaptureResource = resource(event)?;
            ProviderEvent::PaymentCompleted(CompletedPayment {
                transaction_id: capture.order_id()?,
                metadata: decode_custom_id(capture.custom_id.as_deref())?,
                subscription_id: None,
                amount: capture.amount.as_ref().and_then(parse_amount),
            })
        }
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => {
            let capture: CaptureResource = resource(event)?;
            tracing::debug!(capture_id = %capture.id, "PayPal capture denied");
            ProviderEvent::PaymentFailed {
                transaction_id: capture.order_id()?,
                reason: event.event_type.clone(),
            }
        }
        _ => ProviderEvent::Ignored,
    })
}

#[async_trait]
impl WebhookSource for PayPalWebhookSource {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let transmission_time = header(headers, HEADER_TRANSMISSION_TIME)?;
        let sent_at = DateTime::parse_from_rfc3339(transmission_time).map_err(|_| {
            WebhookError::MalformedSignatureHeader(format!("unreadable {}", HEADER_TRANSMISSION_TIME))
        })?;
        check_freshness(sent_at.timestamp(), Utc::now(), self.tolerance)?;

        let event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;
        let verification = json!({
            "auth_algo": header(headers, HEADER_AUTH_ALGO)?,
            "cert_url": header(headers, HEADER_CERT_URL)?,
            "transmission_id": header(headers, HEADER_TRANSMISSION_ID)?,
            "transmission_sig": header(headers, HEADER_TRANSMISSION_SIG)?,
            "transmission_time": transmission_time,
            "webhook_id": self.webhook_id,
            "webhook_event": event,
        });

        let token = self.client.access_token().await?;
        let response = self
            .client
            .ctx
            .client
            .post(self.client.url("/v1/notifications/verify-webhook-signature"))
            .bearer_auth(token)
            .json(&verification)
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let result: VerificationResponse = read_json(KIND, response).await?;

        if result.verification_status == "SUCCESS" {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }

    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;
        let event: PayPalEvent = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid event: {}", e)))?;

        Ok(WebhookEnvelope {
            event: classify(&event)?,
            event_id: event.id,
            event_type: event.event_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::payments::factory::ProviderEndpoints;
    use crate::domain::checkout::{BillingPeriod, ReturnUrls};
    use crate::domain::foundation::{DiscordUserId, GuildId, OrderId, PaymentId};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(base: &str) -> ProviderContext {
        ProviderContext {
            client: reqwest::Client::new(),
            endpoints: Arc::new(ProviderEndpoints::all(base)),
            signature_tolerance: chrono::Duration::minutes(10),
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig {
            guild_id: Some(GuildId::new("111").unwrap()),
            provider: KIND,
            active: true,
            auto_verify: true,
            sandbox: true,
            credentials: json!({
                "clientId": "client",
                "clientSecret": "secret",
                "webhookId": "WH-1"
            }),
        }
    }

    fn request() -> CheckoutRequest {
        let payment_id = PaymentId::new();
        CheckoutRequest {
            order_id: OrderId::new(),
            order_number: "ORD-9".to_string(),
            payment_id,
            amount: Money::new(1250, "EUR").unwrap(),
            guild_id: Some(GuildId::new("111").unwrap()),
            description: "VIP role".to_string(),
            billing_period: BillingPeriod::OneTime,
            buyer: DiscordUserId::new("222").unwrap(),
            metadata: PurchaseMetadata {
                payment_id: Some(payment_id),
                guild_id: Some(GuildId::new("111").unwrap()),
                discord_user_id: Some(DiscordUserId::new("222").unwrap()),
                ..PurchaseMetadata::default()
            },
            urls: ReturnUrls {
                success: "https://pay.example.com/checkout/success?order=ORD-9".into(),
                cancel: "https://pay.example.com/checkout/cancel?order=ORD-9".into(),
                notify: "https://pay.example.com/webhooks/paypal?guild_id=111".into(),
            },
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA",
                "token_type": "Bearer",
                "expires_in": 32400
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn custom_id_fits_and_round_trips_routing_keys() {
        let mut metadata = request().metadata;
        metadata.shop_item_id = Some(crate::domain::foundation::ShopItemId::new());
        let encoded = encode_custom_id(&metadata);

        assert!(encoded.len() <= CUSTOM_ID_MAX);
        let decoded = decode_custom_id(Some(&encoded)).unwrap();
        assert_eq!(decoded.payment_id, metadata.payment_id);
        assert_eq!(decoded.guild_id, metadata.guild_id);
        assert_eq!(decoded.discord_user_id, metadata.discord_user_id);
        assert!(decoded.shop_item_id.is_none());
    }

    #[test]
    fn decimal_amounts_parse_to_cents() {
        let amount = |value: &str| PayPalAmount {
            currency_code: "USD".into(),
            value: value.into(),
        };
        assert_eq!(parse_amount(&amount("10.00")).unwrap().amount_cents(), 1000);
        assert_eq!(parse_amount(&amount("10.5")).unwrap().amount_cents(), 1050);
        assert_eq!(parse_amount(&amount("7")).unwrap().amount_cents(), 700);
        assert!(parse_amount(&amount("1.234")).is_none());
    }

    #[tokio::test]
    async fn initiate_returns_approval_link() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(header_eq("authorization", "Bearer A21AA"))
            .and(body_partial_json(json!({
                "intent": "CAPTURE",
                "purchase_units": [{ "amount": { "currency_code": "EUR", "value": "12.50" } }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "5O190127TN364715T",
                "status": "CREATED",
                "links": [
                    { "href": "https://api.paypal.com/v2/checkout/orders/5O1", "rel": "self" },
                    { "href": "https://www.paypal.com/checkoutnow?token=5O1", "rel": "approve" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PayPalProvider::from_config(ctx(&server.uri()), &config()).unwrap();
        let initiated = provider.initiate(&request()).await.unwrap();

        assert_eq!(initiated.transaction.transaction_id, "5O190127TN364715T");
        assert_eq!(
            initiated.outcome,
            CheckoutOutcome::Redirect {
                url: "https://www.paypal.com/checkoutnow?token=5O1".into()
            }
        );
    }

    #[tokio::test]
    async fn token_failure_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let provider = PayPalProvider::from_config(ctx(&server.uri()), &config()).unwrap();
        let err = provider.initiate(&request()).await.err().unwrap();
        assert!(matches!(err, CheckoutError::ProviderApi { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn recurring_purchases_are_rejected_without_a_call() {
        let mut req = request();
        req.billing_period = BillingPeriod::Monthly;
        let provider = PayPalProvider::from_config(ctx("http://127.0.0.1:1"), &config()).unwrap();
        assert!(matches!(
            provider.initiate(&req).await,
            Err(CheckoutError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn capture_reads_capture_status_and_tolerates_double_capture() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-1/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "ORDER-1",
                "status": "COMPLETED",
                "purchase_units": [{ "payments": { "captures": [{ "id": "CAP", "status": "PENDING" }] } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ORDER-2/capture"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{ "issue": "ORDER_ALREADY_CAPTURED" }]
            })))
            .mount(&server)
            .await;

        let provider = PayPalProvider::from_config(ctx(&server.uri()), &config()).unwrap();
        assert_eq!(provider.capture("ORDER-1").await.unwrap(), CaptureStatus::Pending);
        assert_eq!(provider.capture("ORDER-2").await.unwrap(), CaptureStatus::Completed);
    }

    fn paypal_headers(sent_at: DateTime<Utc>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_AUTH_ALGO, "SHA256withRSA".parse().unwrap());
        headers.insert(HEADER_CERT_URL, "https://api.paypal.com/cert.pem".parse().unwrap());
        headers.insert(HEADER_TRANSMISSION_ID, "tx-1".parse().unwrap());
        headers.insert(HEADER_TRANSMISSION_SIG, "sig".parse().unwrap());
        headers.insert(HEADER_TRANSMISSION_TIME, sent_at.to_rfc3339().parse().unwrap());
        headers
    }

    async fn mount_verification(server: &MockServer, status: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .and(body_partial_json(json!({ "webhook_id": "WH-1", "transmission_id": "tx-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": status })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn verification_follows_paypal_verdict() {
        let body = br#"{"id":"WH-EVT","event_type":"CHECKOUT.ORDER.APPROVED","resource":{"id":"O1"}}"#;

        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_verification(&server, "SUCCESS").await;
        let source = PayPalWebhookSource::from_config(ctx(&server.uri()), &config()).unwrap();
        assert!(source.verify(&paypal_headers(Utc::now()), body).await.is_ok());

        let failing = MockServer::start().await;
        mount_token(&failing).await;
        mount_verification(&failing, "FAILURE").await;
        let source = PayPalWebhookSource::from_config(ctx(&failing.uri()), &config()).unwrap();
        assert!(matches!(
            source.verify(&paypal_headers(Utc::now()), body).await,
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn stale_or_incomplete_transmissions_are_rejected_locally() {
        let source = PayPalWebhookSource::from_config(ctx("http://127.0.0.1:1"), &config()).unwrap();
        let body = br#"{"id":"WH-EVT"}"#;

        let stale = paypal_headers(Utc::now() - chrono::Duration::hours(1));
        assert!(matches!(
            source.verify(&stale, body).await,
            Err(WebhookError::TimestampOutOfRange)
        ));

        let mut missing = paypal_headers(Utc::now());
        missing.remove(HEADER_TRANSMISSION_SIG);
        assert!(matches!(
            source.verify(&missing, body).await,
            Err(WebhookError::MalformedSignatureHeader(_))
        ));
    }

    #[test]
    fn webhook_source_requires_webhook_id() {
        let mut cfg = config();
        cfg.credentials = json!({ "clientId": "client", "clientSecret": "secret" });
        assert!(matches!(
            PayPalWebhookSource::from_config(ctx("http://127.0.0.1:1"), &cfg),
            Err(WebhookError::Misconfigured(_))
        ));
    }

    #[test]
    fn capture_events_are_keyed_by_order_id() {
        let source = PayPalWebhookSource::from_config(ctx("http://127.0.0.1:1"), &config()).unwrap();
        let body = json!({
            "id": "WH-2",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "CAPTURE-1",
                "custom_id": "guild_id=111&discord_user_id=222",
                "amount": { "currency_code": "EUR", "value": "12.50" },
                "supplementary_data": { "related_ids": { "order_id": "ORDER-1" } }
            }
        })
        .to_string();

        let envelope = source.parse(body.as_bytes()).unwrap();
        let ProviderEvent::PaymentCompleted(completed) = envelope.event else {
            panic!("expected completion");
        };
        assert_eq!(completed.transaction_id, "ORDER-1");
        assert_eq!(completed.metadata.guild_id, Some(GuildId::new("111").unwrap()));
        assert_eq!(completed.amount, Some(Money::new(1250, "EUR").unwrap()));

        let approved = json!({
            "id": "WH-3",
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "ORDER-1" }
        })
        .to_string();
        assert_eq!(
            source.parse(approved.as_bytes()).unwrap().event,
            ProviderEvent::PaymentApproved {
                transaction_id: "ORDER-1".into()
            }
        );
    }
}
