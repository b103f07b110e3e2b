//! NOWPayments adapter.
//!
//! Checkout creates a hosted invoice. IPN callbacks are signed with
//! `x-nowpayments-sig`: hex HMAC-SHA512 over the JSON body re-serialized
//! with keys sorted, keyed by the IPN secret.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::checkout::metadata::PAYMENT_ID;
use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction, PurchaseMetadata,
};
use crate::domain::webhook::signature::verify_hmac_sha512_hex;
use crate::domain::webhook::{CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookError};
use crate::ports::{PaymentProvider, WebhookSource};

use super::factory::ProviderContext;
use super::http_util::{read_json, transport_error};

const KIND: ProviderKind = ProviderKind::NowPayments;
pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

pub struct NowPaymentsProvider {
    ctx: ProviderContext,
    base: String,
    api_key: SecretString,
    pay_currency: Option<String>,
}

impl NowPaymentsProvider {
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, CheckoutError> {
        let creds = config.credentials();
        Ok(Self {
            base: ctx.endpoints.nowpayments(config.sandbox).trim_end_matches('/').to_string(),
            api_key: creds.required_secret("apiKey")?,
            pay_currency: creds.optional("payCurrency"),
            ctx,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Invoice {
    id: Value,
    invoice_url: String,
}

/// Ids come back as numbers or strings depending on the endpoint.
fn id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PaymentProvider for NowPaymentsProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        let mut body = json!({
            "price_amount": request.amount.as_major_units(),
            "price_currency": request.amount.currency().to_ascii_lowercase(),
            "order_id": request.payment_id.to_string(),
            "order_description": request.description,
            "ipn_callback_url": request.urls.notify,
            "success_url": request.urls.success,
            "cancel_url": request.urls.cancel,
        });
        if let Some(coin) = &self.pay_currency {
            body["pay_currency"] = json!(coin.to_ascii_lowercase());
        }

        let response = self
            .ctx
            .client
            .post(format!("{}/v1/invoice", self.base))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let invoice: Invoice = read_json(KIND, response).await?;

        let invoice_id = id_string(&invoice.id)
            .ok_or_else(|| CheckoutError::provider_api(KIND, "invoice has no id"))?;

        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Redirect {
                url: invoice.invoice_url,
            },
            transaction: ProviderTransaction {
                metadata: json!({ "invoiceId": invoice_id }),
                transaction_id: invoice_id,
            },
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// IPN
// ════════════════════════════════════════════════════════════════════════════════

pub struct NowPaymentsWebhookSource {
    ipn_secret: SecretString,
}

impl NowPaymentsWebhookSource {
    pub(super) fn from_config(config: &ProviderConfig) -> Result<Self, WebhookError> {
        Ok(Self {
            ipn_secret: config.credentials().required_secret("ipnSecret")?,
        })
    }
}

/// Re-serializes with object keys sorted at every depth.
fn sorted_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sorted_json(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_json).collect()),
        other => other.clone(),
    }
}

fn canonical_body(body: &[u8]) -> Result<String, WebhookError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;
    Ok(sorted_json(&value).to_string())
}

#[derive(Debug, Deserialize)]
struct Ipn {
    payment_id: Value,
    #[serde(default)]
    invoice_id: Value,
    payment_status: String,
    order_id: Option<String>,
}

fn classify(ipn: &Ipn) -> Result<ProviderEvent, WebhookError> {
    // Invoices are what initiation stores; bare payments fall back to their own id.
    let transaction_id = id_string(&ipn.invoice_id)
        .or_else(|| id_string(&ipn.payment_id))
        .ok_or(WebhookError::MissingField("invoice_id"))?;

    Ok(match ipn.payment_status.as_str() {
        "finished" => {
            let map: HashMap<String, String> = ipn
                .order_id
                .iter()
                .map(|id| (PAYMENT_ID.to_string(), id.clone()))
                .collect();
            ProviderEvent::PaymentCompleted(CompletedPayment {
                transaction_id,
                metadata: PurchaseMetadata::from_map(&map)
                    .map_err(|e| WebhookError::ParseError(e.to_string()))?,
                subscription_id: None,
                amount: None,
            })
        }
        "failed" | "expired" => ProviderEvent::PaymentFailed {
            transaction_id,
            reason: ipn.payment_status.clone(),
        },
        _ => ProviderEvent::Ignored,
    })
}

#[async_trait]
impl WebhookSource for NowPaymentsWebhookSource {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                WebhookError::MalformedSignatureHeader(format!("missing {}", SIGNATURE_HEADER))
            })?;
        let canonical = canonical_body(body)?;
        verify_hmac_sha512_hex(
            self.ipn_secret.expose_secret().as_bytes(),
            canonical.as_bytes(),
            provided,
        )
    }

    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(format!("invalid JSON: {}", e)))?;
        let ipn: Ipn = serde_json::from_value(payload.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid IPN: {}", e)))?;
        let payment_id = id_string(&ipn.payment_id).ok_or(WebhookError::MissingField("payment_id"))?;

        Ok(WebhookEnvelope {
            event: classify(&ipn)?,
            event_id: format!("{}:{}", payment_id, ipn.payment_status),
            event_type: format!("payment.{}", ipn.payment_status),
            payload,
        })
    }
}
