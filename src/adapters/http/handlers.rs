//! HTTP handlers for webhook ingress and checkout initiation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::application::{
    InitiateCheckoutCommand, InitiateCheckoutHandler, ProcessWebhookCommand, WebhookProcessor,
};
use crate::domain::checkout::CheckoutError;
use crate::domain::foundation::PaymentId;
use crate::domain::webhook::WebhookError;

use super::dto::{
    ErrorResponse, HealthResponse, InitiateCheckoutRequest, InitiateCheckoutResponse, WebhookAck,
    WebhookQuery,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub webhooks: Arc<WebhookProcessor>,
    pub checkout: Arc<InitiateCheckoutHandler>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /webhooks/{provider}?guild_id={id}
///
/// The body is handed over as raw bytes; signatures are computed over
/// exactly what the provider sent.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookApiError> {
    let cmd = ProcessWebhookCommand {
        provider,
        guild_id: query.guild_id,
        headers,
        body: body.to_vec(),
    };

    state.webhooks.process(cmd).await?;

    Ok(Json(WebhookAck::received()))
}

/// POST /api/checkout
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Json(request): Json<InitiateCheckoutRequest>,
) -> Result<Json<InitiateCheckoutResponse>, CheckoutApiError> {
    let payment_id: PaymentId = request.payment_id.trim().parse().map_err(|_| {
        CheckoutError::InvalidRequest(format!("'{}' is not a payment id", request.payment_id))
    })?;

    let outcome = state
        .checkout
        .handle(InitiateCheckoutCommand { payment_id })
        .await?;

    Ok(Json(InitiateCheckoutResponse {
        payment_id: payment_id.to_string(),
        checkout: outcome,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Maps webhook failures onto the status codes providers act on.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let message = if status.is_server_error() {
            "Webhook could not be processed, retry later".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}

/// API error type that converts checkout errors to HTTP responses.
pub struct CheckoutApiError(CheckoutError);

impl From<CheckoutError> for CheckoutApiError {
    fn from(err: CheckoutError) -> Self {
        Self(err)
    }
}

impl IntoResponse for CheckoutApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            CheckoutError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            CheckoutError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CheckoutError::AlreadyInitiated(_) => (StatusCode::CONFLICT, "ALREADY_INITIATED"),
            CheckoutError::ProviderInactive(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PROVIDER_INACTIVE")
            }
            CheckoutError::Configuration { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PROVIDER_MISCONFIGURED")
            }
            CheckoutError::ProviderApi { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            CheckoutError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = match &self.0 {
            CheckoutError::Storage(err) => {
                tracing::error!(error = %err, "checkout storage failure");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(error_code, message))).into_response()
    }
}
