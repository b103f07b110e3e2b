//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::domain::checkout::CheckoutOutcome;

/// Query string of `POST /webhooks/{provider}`.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    /// Absent for callbacks addressed to the platform's own account.
    pub guild_id: Option<String>,
}

/// Acknowledgement returned for every authenticated, parseable event.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// Body of `POST /api/checkout`.
#[derive(Debug, Deserialize)]
pub struct InitiateCheckoutRequest {
    pub payment_id: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateCheckoutResponse {
    pub payment_id: String,
    pub checkout: CheckoutOutcome,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Standard error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serializes_as_received_true() {
        let json = serde_json::to_value(WebhookAck::received()).unwrap();
        assert_eq!(json, serde_json::json!({ "received": true }));
    }

    #[test]
    fn checkout_response_tags_the_outcome() {
        let response = InitiateCheckoutResponse {
            payment_id: "p1".to_string(),
            checkout: CheckoutOutcome::Redirect {
                url: "https://pay.example/1".to_string(),
            },
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["checkout"]["type"], "redirect");
        assert_eq!(json["checkout"]["url"], "https://pay.example/1");
    }
}
