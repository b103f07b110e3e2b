//! Webhook error types.
//!
//! The HTTP status decides what the provider does next: 2xx stops
//! redelivery, 4xx is a permanent rejection for most providers, 5xx is
//! retried. Only transient infrastructure failures map to 5xx.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// Computed digest does not match the one the provider sent.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature header absent or unreadable.
    #[error("Malformed signature header: {0}")]
    MalformedSignatureHeader(String),

    /// Signed timestamp is outside the freshness window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Failed to parse webhook payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// No active provider configuration for the addressed guild.
    #[error("No active {provider} configuration for {destination}")]
    UnknownDestination {
        provider: String,
        destination: String,
    },

    /// Guild in the signed body differs from the guild in the URL.
    #[error("Guild mismatch: addressed to {addressed}, body names {claimed}")]
    CrossTenantMismatch { addressed: String, claimed: String },

    /// Provider call made while handling the event failed.
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    #[error("Provider misconfigured: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_) | WebhookError::ProviderApi(_) | WebhookError::Misconfigured(_)
        )
    }

    /// Security-relevant rejections are logged for review.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidSignature
                | WebhookError::MalformedSignatureHeader(_)
                | WebhookError::TimestampOutOfRange
                | WebhookError::CrossTenantMismatch { .. }
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::MalformedSignatureHeader(_)
            | WebhookError::TimestampOutOfRange => StatusCode::UNAUTHORIZED,

            WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::UnsupportedProvider(_)
            | WebhookError::UnknownDestination { .. }
            | WebhookError::CrossTenantMismatch { .. } => StatusCode::BAD_REQUEST,

            WebhookError::ProviderApi(_) => StatusCode::BAD_GATEWAY,
            WebhookError::Misconfigured(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::MalformedSignatureHeader(_)
            | WebhookError::TimestampOutOfRange => "INVALID_SIGNATURE",
            WebhookError::ParseError(_) => "INVALID_PAYLOAD",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            WebhookError::UnknownDestination { .. } => "UNKNOWN_DESTINATION",
            WebhookError::CrossTenantMismatch { .. } => "GUILD_MISMATCH",
            WebhookError::ProviderApi(_) => "PROVIDER_ERROR",
            WebhookError::Misconfigured(_) | WebhookError::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

/// Provider calls made while handling a webhook (capture, subscription
/// lookups) surface as webhook errors. Bad credentials stay a 5xx so the
/// provider keeps redelivering until the tenant fixes them.
impl From<crate::domain::checkout::CheckoutError> for WebhookError {
    fn from(err: crate::domain::checkout::CheckoutError) -> Self {
        use crate::domain::checkout::CheckoutError;
        match err {
            CheckoutError::Configuration { .. } | CheckoutError::ProviderInactive(_) => {
                WebhookError::Misconfigured(err.to_string())
            }
            CheckoutError::Storage(inner) => WebhookError::Database(inner.to_string()),
            other => WebhookError::ProviderApi(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_are_unauthorized() {
        for err in [
            WebhookError::InvalidSignature,
            WebhookError::MalformedSignatureHeader("missing t".into()),
            WebhookError::TimestampOutOfRange,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(!err.is_retryable());
            assert!(err.is_security_event());
        }
    }

    #[test]
    fn cross_tenant_mismatch_is_a_bad_request_flagged_for_review() {
        let err = WebhookError::CrossTenantMismatch {
            addressed: "1".into(),
            claimed: "2".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_security_event());
        assert_eq!(err.to_string(), "Guild mismatch: addressed to 1, body names 2");
    }

    #[test]
    fn missing_fields_are_bad_requests() {
        let err = WebhookError::MissingField("discord_user_id");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(format!("{}", err), "Missing field: discord_user_id");
    }

    #[test]
    fn infrastructure_failures_ask_for_redelivery() {
        let db = WebhookError::Database("pool timed out".into());
        assert!(db.is_retryable());
        assert!(db.status_code().is_server_error());

        let api = WebhookError::ProviderApi("capture failed".into());
        assert!(api.is_retryable());
        assert!(api.status_code().is_server_error());
    }
}
