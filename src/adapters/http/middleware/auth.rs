//! Shared-secret authentication for internal endpoints.
//!
//! The dashboard and bot call `/api/*` with
//! `Authorization: Bearer <internal_api_secret>`. Webhook routes are not
//! behind this layer; they are authenticated by provider signatures.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};

use crate::adapters::http::dto::ErrorResponse;
use crate::domain::webhook::signature::constant_time_compare;

/// Middleware state - the expected bearer token.
pub type InternalSecret = Arc<SecretString>;

/// Rejects requests whose bearer token is not the internal secret.
pub async fn require_internal_secret(
    State(secret): State<InternalSecret>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token)
            if constant_time_compare(token.as_bytes(), secret.expose_secret().as_bytes()) =>
        {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!(
                security = true,
                path = %request.uri().path(),
                "internal API call with wrong secret"
            );
            unauthorized()
        }
        None => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "AUTHENTICATION_REQUIRED",
            "A valid internal API secret is required",
        )),
    )
        .into_response()
}
