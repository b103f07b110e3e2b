//! Stub provider factory for tests.
//!
//! Hands out providers and webhook sources that share one configurable
//! state:
//! - initiation succeeds with `stub_txn_<n>` or fails with a given status
//! - webhook bodies are mapped to pre-registered envelopes
//! - a request passes verification when `x-stub-signature: valid` is set
//! - subscription lookups and captures return configured answers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;

use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction,
};
use crate::domain::webhook::{WebhookEnvelope, WebhookError};
use crate::ports::{
    CaptureStatus, PaymentProvider, ProviderFactory, SubscriptionSnapshot, WebhookSource,
};

pub const STUB_SIGNATURE_HEADER: &str = "x-stub-signature";

#[derive(Default)]
struct StubState {
    initiated: Vec<CheckoutRequest>,
    initiation_failure: Option<u16>,
    events: HashMap<Vec<u8>, WebhookEnvelope>,
    periods: HashMap<String, Option<DateTime<Utc>>>,
    capture: Option<CaptureStatus>,
    captured: Vec<String>,
}

#[derive(Clone, Default)]
pub struct StubProviderFactory {
    inner: Arc<Mutex<StubState>>,
}

impl StubProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.inner.lock().expect("StubProviderFactory: lock poisoned")
    }

    pub fn fail_initiation(&self, status: u16) {
        self.state().initiation_failure = Some(status);
    }

    pub fn initiated_requests(&self) -> Vec<CheckoutRequest> {
        self.state().initiated.clone()
    }

    /// `body` will parse into `envelope`.
    pub fn register_event(&self, body: impl Into<Vec<u8>>, envelope: WebhookEnvelope) {
        self.state().events.insert(body.into(), envelope);
    }

    pub fn set_subscription_period(&self, subscription_id: &str, end: Option<DateTime<Utc>>) {
        self.state().periods.insert(subscription_id.to_string(), end);
    }

    pub fn set_capture_result(&self, status: CaptureStatus) {
        self.state().capture = Some(status);
    }

    pub fn captured(&self) -> Vec<String> {
        self.state().captured.clone()
    }

    /// Headers that pass stub verification.
    pub fn signed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(STUB_SIGNATURE_HEADER, http::HeaderValue::from_static("valid"));
        headers
    }
}

struct StubProvider {
    kind: ProviderKind,
    factory: StubProviderFactory,
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        let mut state = self.factory.state();
        if let Some(status) = state.initiation_failure {
            return Err(CheckoutError::provider_status(self.kind, status, "stubbed failure"));
        }
        state.initiated.push(request.clone());
        let transaction_id = format!("stub_txn_{}", state.initiated.len());
        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Redirect {
                url: format!("https://checkout.invalid/{}", transaction_id),
            },
            transaction: ProviderTransaction {
                transaction_id,
                metadata: serde_json::json!({ "stub": true }),
            },
        })
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, CheckoutError> {
        match self.factory.state().periods.get(subscription_id) {
            Some(end) => Ok(SubscriptionSnapshot {
                id: subscription_id.to_string(),
                status: "active".to_string(),
                current_period_end: *end,
            }),
            None => Err(CheckoutError::provider_status(self.kind, 404, "no such subscription")),
        }
    }

    async fn capture(&self, transaction_id: &str) -> Result<CaptureStatus, CheckoutError> {
        let mut state = self.factory.state();
        state.captured.push(transaction_id.to_string());
        state
            .capture
            .ok_or_else(|| CheckoutError::provider_api(self.kind, "capture not stubbed"))
    }
}

struct StubWebhookSource {
    kind: ProviderKind,
    factory: StubProviderFactory,
}

#[async_trait]
impl WebhookSource for StubWebhookSource {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn verify(&self, headers: &HeaderMap, _body: &[u8]) -> Result<(), WebhookError> {
        match headers.get(STUB_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
            Some("valid") => Ok(()),
            Some(_) => Err(WebhookError::InvalidSignature),
            None => Err(WebhookError::MalformedSignatureHeader(
                "missing stub signature".to_string(),
            )),
        }
    }

    fn parse(&self, body: &[u8]) -> Result<WebhookEnvelope, WebhookError> {
        self.factory
            .state()
            .events
            .get(body)
            .cloned()
            .ok_or_else(|| WebhookError::ParseError("unregistered body".to_string()))
    }
}

impl ProviderFactory for StubProviderFactory {
    fn checkout(&self, config: &ProviderConfig) -> Result<Box<dyn PaymentProvider>, CheckoutError> {
        Ok(Box::new(StubProvider {
            kind: config.provider,
            factory: self.clone(),
        }))
    }

    fn webhooks(&self, config: &ProviderConfig) -> Result<Box<dyn WebhookSource>, WebhookError> {
        Ok(Box::new(StubWebhookSource {
            kind: config.provider,
            factory: self.clone(),
        }))
    }
}
