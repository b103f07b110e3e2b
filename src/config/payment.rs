//! Payment provider configuration
//!
//! Per-guild provider credentials live in the `payment_provider_configs`
//! table. This section only holds process-wide knobs: outbound timeouts,
//! webhook freshness and retention, and provider API base URLs (overridable
//! so tests can point adapters at a local mock server).

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Public URL of this service, used for return and IPN URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Timeout applied to every outbound provider call
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Maximum distance between a signed timestamp and now
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// How long processed webhook event ids are kept
    #[serde(default = "default_retention_days")]
    pub webhook_retention_days: i64,

    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,

    #[serde(default = "default_paypal_live_api_base")]
    pub paypal_live_api_base: String,

    #[serde(default = "default_paypal_sandbox_api_base")]
    pub paypal_sandbox_api_base: String,

    #[serde(default = "default_coinpayments_api_url")]
    pub coinpayments_api_url: String,

    #[serde(default = "default_nowpayments_live_api_base")]
    pub nowpayments_live_api_base: String,

    #[serde(default = "default_nowpayments_sandbox_api_base")]
    pub nowpayments_sandbox_api_base: String,
}

impl PaymentConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn signature_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.signature_tolerance_secs)
    }

    pub fn webhook_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.webhook_retention_days)
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.provider_timeout_secs == 0 || self.provider_timeout_secs > 60 {
            return Err(ValidationError::InvalidOutboundTimeout("payment providers"));
        }
        if self.signature_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.webhook_retention_days < 1 {
            return Err(ValidationError::InvalidRetention);
        }

        let urls: [(&'static str, &str); 7] = [
            ("payment.public_base_url", &self.public_base_url),
            ("payment.stripe_api_base", &self.stripe_api_base),
            ("payment.paypal_live_api_base", &self.paypal_live_api_base),
            ("payment.paypal_sandbox_api_base", &self.paypal_sandbox_api_base),
            ("payment.coinpayments_api_url", &self.coinpayments_api_url),
            ("payment.nowpayments_live_api_base", &self.nowpayments_live_api_base),
            (
                "payment.nowpayments_sandbox_api_base",
                &self.nowpayments_sandbox_api_base,
            ),
        ];
        for (name, value) in urls {
            let parsed = url::Url::parse(value).map_err(|_| ValidationError::InvalidUrl(name))?;
            if *environment == Environment::Production && parsed.scheme() != "https" {
                return Err(ValidationError::MustBeHttps(name));
            }
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            provider_timeout_secs: default_provider_timeout(),
            signature_tolerance_secs: default_signature_tolerance(),
            webhook_retention_days: default_retention_days(),
            stripe_api_base: default_stripe_api_base(),
            paypal_live_api_base: default_paypal_live_api_base(),
            paypal_sandbox_api_base: default_paypal_sandbox_api_base(),
            coinpayments_api_url: default_coinpayments_api_url(),
            nowpayments_live_api_base: default_nowpayments_live_api_base(),
            nowpayments_sandbox_api_base: default_nowpayments_sandbox_api_base(),
        }
    }
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_provider_timeout() -> u64 {
    15
}

fn default_signature_tolerance() -> i64 {
    600
}

fn default_retention_days() -> i64 {
    30
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_paypal_live_api_base() -> String {
    "https://api-m.paypal.com".to_string()
}

fn default_paypal_sandbox_api_base() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

fn default_coinpayments_api_url() -> String {
    "https://www.coinpayments.net/api.php".to_string()
}

fn default_nowpayments_live_api_base() -> String {
    "https://api.nowpayments.io".to_string()
}

fn default_nowpayments_sandbox_api_base() -> String {
    "https://api-sandbox.nowpayments.io".to_string()
}
