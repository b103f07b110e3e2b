//! CoinPayments adapter.
//!
//! The legacy API is a single form-POST endpoint (`api.php`) where the
//! command is a field and the whole form body is authenticated with an
//! `HMAC` header (hex HMAC-SHA512 keyed by the private key). IPN callbacks
//! use the same scheme keyed by the IPN secret.

use std::collections::HashMap;

use async_trait::async_trait;
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::domain::checkout::metadata::PAYMENT_ID;
use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction, PurchaseMetadata,
};
use crate::domain::webhook::signature::{hmac_sha512_hex, verify_hmac_sha512_hex};
use crate::domain::webhook::{CompletedPayment, ProviderEvent, WebhookEnvelope, WebhookError};
use crate::ports::{PaymentProvider, WebhookSource};

use super::factory::ProviderContext;
use super::http_util::{read_json, transport_error};

const KIND: ProviderKind = ProviderKind::CoinPayments;
const API_VERSION: &str = "1";
pub const SIGNATURE_HEADER: &str = "hmac";

/// Status codes from the IPN documentation: 2 is "queued for payout",
/// anything at or above 100 is complete, negatives are failures.
const STATUS_QUEUED_FOR_PAYOUT: i64 = 2;
const STATUS_COMPLETE: i64 = 100;

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

pub struct CoinPaymentsProvider {
    ctx: ProviderContext,
    public_key: String,
    private_key: SecretString,
    /// Coin the merchant receives; defaults to the price currency.
    receive_currency: Option<String>,
}

impl CoinPaymentsProvider {
    pub(super) fn from_config(ctx: ProviderContext, config: &ProviderConfig) -> Result<Self, CheckoutError> {
        let creds = config.credentials();
        Ok(Self {
            public_key: creds.required("publicKey")?,
            private_key: creds.required_secret("privateKey")?,
            receive_currency: creds.optional("receiveCurrency"),
            ctx,
        })
    }

    fn transaction_form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let metadata: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(request.metadata.to_pairs())
            .finish();
        vec![
            ("version", API_VERSION.to_string()),
            ("cmd", "create_transaction".to_string()),
            ("key", self.public_key.clone()),
            ("format", "json".to_string()),
            ("amount", request.amount.to_decimal_string()),
            ("currency1", request.amount.currency().to_string()),
            (
                "currency2",
                self.receive_currency
                    .clone()
                    .unwrap_or_else(|| request.amount.currency().to_string()),
            ),
            ("item_name", request.description.clone()),
            ("invoice", request.payment_id.to_string()),
            ("custom", metadata),
            ("ipn_url", request.urls.notify.clone()),
            ("success_url", request.urls.success.clone()),
            ("cancel_url", request.urls.cancel.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    error: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedTransaction {
    txn_id: String,
    checkout_url: String,
    address: Option<String>,
    amount: Option<String>,
}

#[async_trait]
impl PaymentProvider for CoinPaymentsProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.transaction_form(request))
            .finish();
        let signature = hmac_sha512_hex(self.private_key.expose_secret().as_bytes(), body.as_bytes());

        let response = self
            .ctx
            .client
            .post(&self.ctx.endpoints.coinpayments_api_url)
            .header("HMAC", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(transport_error(KIND))?;
        let api: ApiResponse<CreatedTransaction> = read_json(KIND, response).await?;

        // The API answers 200 with the failure in `error`.
        if api.error != "ok" {
            return Err(CheckoutError::provider_api(KIND, api.error));
        }
        let created = api
            .result
            .ok_or_else(|| CheckoutError::provider_api(KIND, "response has no result"))?;

        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Redirect {
                url: created.checkout_url,
            },
            transaction: ProviderTransaction {
                metadata: json!({
                    "txnId": created.txn_id,
                    "address": created.address,
                    "amount": created.amount,
                }),
                transaction_id: created.txn_id,
            },
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// IPN
// ════════════════════════════════════════════════════════════════════════════════

pub struct CoinPaymentsWebhookSource {
    ipn_secret: SecretString,
    merchant_id: String,
}

impl CoinPaymentsWebhookSource {
    pub(super) fn from_config(config: &ProviderConfig) -> Result<Self, WebhookError> {
        let creds = config.credentials();
        Ok(Self {
            ipn_secret: creds.required_secret("ipnSecret")?,
            merchant_id: creds.required("merchantId")?,
        })
    }
}

fn form_field<'a>(form: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, WebhookError> {
    form.get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingField(key))
}

fn metadata_from_custom(form: &HashMap<String, String>) -> Result<PurchaseMetadata, WebhookError> {
    let mut map: HashMap<String, String> = form
        .get("custom")
        .map(|custom| url::form_urlencoded::parse(custom.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    // Older transactions carried the payment id only in `invoice`.
    if let Some(invoice) = form.get("invoice") {
        map.entry(PAYMENT_ID.to_string()).or_insert_with(|| invoice.clone());
    }
    PurchaseMetadata::from_map(&map).map_err(|e| WebhookError::ParseError(e.to_string()))
}

fn classify(form: &HashMap<String, String>) -> Result<ProviderEvent, WebhookError> {
    if form.get("ipn_type").map(String::as_str) != Some("api") {
        return Ok(ProviderEvent::Ignored);
    }
    let txn_id = form_field(form, "txn_id")?.to_string();
    let status: i64 = form_field(form, "status")?
        .trim()
        .parse()
        .map_err(|_| WebhookError::ParseError("status is not an integer".to_string()))?;

    Ok(if status >= STATUS_COMPLETE || status == STATUS_QUEUED_FOR_PAYOUT {
        ProviderEvent::PaymentCompleted(CompletedPayment {
            transaction_id: txn_id,
            metadata: metadata_from_custom(form)?,
            subscription_id: None,
            amount: None,
        })
    } else if status < 0 {
        ProviderEvent::PaymentFailed {
            transaction_id: txn_id,
            reason: form
                .get("status_text")
                .cloned()
                .unwrap_or_else(|| format!("status {}", status)),
        }
    } else {
        ProviderEvent::Ignored
    })
}

#[async_trait]
impl WebhookSource for CoinPaymentsWebhookSource {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| WebhookError::MalformedSignatureHeader("missing HMAC".to_string()))?;
        verify_hmac_sha512_hex(self.ipn_secret.expose_secret().as_bytes(), body, provided)?;

        // Signed, but for another merchant's account.
        let form: HashMap<String, String> = url::form_urlencoded::parse(body).into_owned().collect();
        if form.get("merchant").map(String::as_str) != Some(self.merchant_id.as_str()) {
            tracing::warn!(security = true, provider = KIND.as_str(), "IPN merchant id mismatch");
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError> {
        let form: HashMap<String, String> = url::form_urlencoded::parse(body).into_owned().collect();
        let event = classify(&form)?;
        let txn_id = form_field(&form, "txn_id")?;
        let status = form_field(&form, "status")?;

        Ok(WebhookEnvelope {
            // IPNs carry no id of their own; one status per transaction is one event.
            event_id: format!("{}:{}", txn_id, status),
            event_type: format!("ipn:{}", form.get("ipn_type").map_or("unknown", String::as_str)),
            payload: json!(form),
            event,
        })
    }
}
