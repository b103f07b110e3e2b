//! Axum router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::SecretString;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{health, initiate_checkout, receive_webhook, AppState};
use super::middleware::require_internal_secret;

/// Builds the service router.
///
/// # Routes
/// - `GET /health` - liveness
/// - `POST /webhooks/{provider}` - provider callbacks, signature verified
/// - `POST /api/checkout` - initiate checkout, internal secret required
pub fn router(state: AppState, internal_secret: SecretString, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/checkout", post(initiate_checkout))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(internal_secret),
            require_internal_secret,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/webhooks/:provider", post(receive_webhook))
        .nest("/api", api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
