//! Payment provider identity and per-tenant provider configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{GuildId, ValidationError};

use super::CheckoutError;

/// The payment providers a guild can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "paypal")]
    PayPal,
    Stripe,
    #[serde(rename = "coinpayments")]
    CoinPayments,
    #[serde(rename = "nowpayments")]
    NowPayments,
    DirectWallet,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::PayPal,
        ProviderKind::Stripe,
        ProviderKind::CoinPayments,
        ProviderKind::NowPayments,
        ProviderKind::DirectWallet,
    ];

    /// Stable name used in URLs and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::PayPal => "paypal",
            ProviderKind::Stripe => "stripe",
            ProviderKind::CoinPayments => "coinpayments",
            ProviderKind::NowPayments => "nowpayments",
            ProviderKind::DirectWallet => "direct_wallet",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::invalid_format("provider", format!("unknown provider '{}'", s)))
    }
}

/// One row of provider configuration. `guild_id = None` is the platform's
/// own account, used for premium tier sales.
///
/// Credentials are kept as the raw JSON blob and parsed into a typed struct
/// by each provider adapter, so a missing key is reported against the
/// provider that needs it.
#[derive(Clone)]
pub struct ProviderConfig {
    pub guild_id: Option<GuildId>,
    pub provider: ProviderKind,
    pub active: bool,
    /// PayPal: capture approved orders automatically.
    pub auto_verify: bool,
    /// Route calls to the provider's sandbox environment.
    pub sandbox: bool,
    pub credentials: serde_json::Value,
}

impl ProviderConfig {
    pub fn credentials(&self) -> Credentials<'_> {
        Credentials {
            provider: self.provider,
            blob: &self.credentials,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("guild_id", &self.guild_id)
            .field("provider", &self.provider)
            .field("active", &self.active)
            .field("auto_verify", &self.auto_verify)
            .field("sandbox", &self.sandbox)
            .field("credentials", &"[REDACTED]")
            .finish()
    }
}

/// Typed read access to a credential blob. Field names are the camelCase
/// keys stored by the dashboard.
pub struct Credentials<'a> {
    provider: ProviderKind,
    blob: &'a serde_json::Value,
}

impl Credentials<'_> {
    /// A non-empty string field, or a configuration error naming it.
    pub fn required(&self, field: &'static str) -> Result<String, CheckoutError> {
        self.optional(field)
            .ok_or_else(|| CheckoutError::missing_credential(self.provider, field))
    }

    pub fn required_secret(&self, field: &'static str) -> Result<SecretString, CheckoutError> {
        self.required(field).map(SecretString::new)
    }

    pub fn optional(&self, field: &str) -> Option<String> {
        self.blob
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn optional_secret(&self, field: &str) -> Option<SecretString> {
        self.optional(field).map(SecretString::new)
    }

    /// An array field; absent or non-array yields an empty slice.
    pub fn list(&self, field: &str) -> &[serde_json::Value] {
        self.blob
            .get(field)
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn config(provider: ProviderKind, credentials: serde_json::Value) -> ProviderConfig {
        ProviderConfig {
            guild_id: None,
            provider,
            active: true,
            auto_verify: false,
            sandbox: false,
            credentials,
        }
    }

    #[test]
    fn provider_names_parse_back() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("PayPal".parse::<ProviderKind>().unwrap(), ProviderKind::PayPal);
        assert!("bitpay".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn serde_names_match_url_names() {
        for kind in ProviderKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn missing_credential_names_the_field() {
        let cfg = config(
            ProviderKind::CoinPayments,
            json!({ "publicKey": "pub", "privateKey": "  " }),
        );
        let err = cfg.credentials().required("privateKey").unwrap_err();
        match err {
            CheckoutError::Configuration { provider, reason } => {
                assert_eq!(provider, ProviderKind::CoinPayments);
                assert!(reason.contains("privateKey"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn secrets_are_readable_and_redacted_in_debug() {
        let cfg = config(ProviderKind::Stripe, json!({ "secretKey": "sk_test_123" }));
        let secret = cfg.credentials().required_secret("secretKey").unwrap();
        assert_eq!(secret.expose_secret(), "sk_test_123");
        assert!(!format!("{cfg:?}").contains("sk_test_123"));
    }

    #[test]
    fn list_tolerates_absent_field() {
        let cfg = config(ProviderKind::DirectWallet, json!({}));
        assert!(cfg.credentials().list("wallets").is_empty());
    }
}
