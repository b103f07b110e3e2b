//! Builds provider adapters from tenant configuration.

use std::sync::Arc;

use chrono::Duration;

use crate::config::PaymentConfig;
use crate::domain::checkout::{CheckoutError, ProviderConfig, ProviderKind};
use crate::domain::webhook::WebhookError;
use crate::ports::{PaymentProvider, ProviderFactory, WebhookSource};

use super::coinpayments::{CoinPaymentsProvider, CoinPaymentsWebhookSource};
use super::direct_wallet::DirectWalletProvider;
use super::nowpayments::{NowPaymentsProvider, NowPaymentsWebhookSource};
use super::paypal::{PayPalProvider, PayPalWebhookSource};
use super::stripe::{StripeProvider, StripeWebhookSource};

/// Provider API base URLs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub stripe_api_base: String,
    pub paypal_live_api_base: String,
    pub paypal_sandbox_api_base: String,
    pub coinpayments_api_url: String,
    pub nowpayments_live_api_base: String,
    pub nowpayments_sandbox_api_base: String,
}

impl ProviderEndpoints {
    /// Every provider pointed at one base URL.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            stripe_api_base: base.clone(),
            paypal_live_api_base: base.clone(),
            paypal_sandbox_api_base: base.clone(),
            coinpayments_api_url: format!("{}/api.php", base),
            nowpayments_live_api_base: base.clone(),
            nowpayments_sandbox_api_base: base,
        }
    }

    pub fn paypal(&self, sandbox: bool) -> &str {
        if sandbox {
            &self.paypal_sandbox_api_base
        } else {
            &self.paypal_live_api_base
        }
    }

    pub fn nowpayments(&self, sandbox: bool) -> &str {
        if sandbox {
            &self.nowpayments_sandbox_api_base
        } else {
            &self.nowpayments_live_api_base
        }
    }
}

impl From<&PaymentConfig> for ProviderEndpoints {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            stripe_api_base: config.stripe_api_base.clone(),
            paypal_live_api_base: config.paypal_live_api_base.clone(),
            paypal_sandbox_api_base: config.paypal_sandbox_api_base.clone(),
            coinpayments_api_url: config.coinpayments_api_url.clone(),
            nowpayments_live_api_base: config.nowpayments_live_api_base.clone(),
            nowpayments_sandbox_api_base: config.nowpayments_sandbox_api_base.clone(),
        }
    }
}

/// Shared pieces handed to every adapter instance.
#[derive(Clone)]
pub(super) struct ProviderContext {
    pub client: reqwest::Client,
    pub endpoints: Arc<ProviderEndpoints>,
    pub signature_tolerance: Duration,
}

/// Production [`ProviderFactory`]: real HTTP clients for every provider.
#[derive(Clone)]
pub struct HttpProviderFactory {
    ctx: ProviderContext,
}

impl HttpProviderFactory {
    pub fn new(config: &PaymentConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.provider_timeout())
            .build()?;
        Ok(Self::with_client(
            client,
            ProviderEndpoints::from(config),
            config.signature_tolerance(),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoints: ProviderEndpoints,
        signature_tolerance: Duration,
    ) -> Self {
        Self {
            ctx: ProviderContext {
                client,
                endpoints: Arc::new(endpoints),
                signature_tolerance,
            },
        }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn checkout(&self, config: &ProviderConfig) -> Result<Box<dyn PaymentProvider>, CheckoutError> {
        let ctx = self.ctx.clone();
        Ok(match config.provider {
            ProviderKind::Stripe => Box::new(StripeProvider::from_config(ctx, config)?),
            ProviderKind::PayPal => Box::new(PayPalProvider::from_config(ctx, config)?),
            ProviderKind::CoinPayments => Box::new(CoinPaymentsProvider::from_config(ctx, config)?),
            ProviderKind::NowPayments => Box::new(NowPaymentsProvider::from_config(ctx, config)?),
            ProviderKind::DirectWallet => Box::new(DirectWalletProvider::from_config(config)?),
        })
    }

    fn webhooks(&self, config: &ProviderConfig) -> Result<Box<dyn WebhookSource>, WebhookError> {
        let ctx = self.ctx.clone();
        Ok(match config.provider {
            ProviderKind::Stripe => Box::new(StripeWebhookSource::from_config(ctx, config)?),
            ProviderKind::PayPal => Box::new(PayPalWebhookSource::from_config(ctx, config)?),
            ProviderKind::CoinPayments => {
                Box::new(CoinPaymentsWebhookSource::from_config(config)?)
            }
            ProviderKind::NowPayments => Box::new(NowPaymentsWebhookSource::from_config(config)?),
            ProviderKind::DirectWallet => {
                return Err(WebhookError::UnsupportedProvider(
                    "direct_wallet payments are confirmed manually".to_string(),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn factory() -> HttpProviderFactory {
        HttpProviderFactory::with_client(
            reqwest::Client::new(),
            ProviderEndpoints::all("http://127.0.0.1:1"),
            Duration::minutes(10),
        )
    }

    fn config(provider: ProviderKind, credentials: serde_json::Value) -> ProviderConfig {
        ProviderConfig {
            guild_id: None,
            provider,
            active: true,
            auto_verify: false,
            sandbox: true,
            credentials,
        }
    }

    #[test]
    fn every_provider_builds_from_complete_credentials() {
        let f = factory();
        let cases = [
            (ProviderKind::Stripe, json!({ "secretKey": "sk_test" })),
            (
                ProviderKind::PayPal,
                json!({ "clientId": "id", "clientSecret": "secret" }),
            ),
            (
                ProviderKind::CoinPayments,
                json!({ "publicKey": "pub", "privateKey": "priv" }),
            ),
            (ProviderKind::NowPayments, json!({ "apiKey": "key" })),
            (
                ProviderKind::DirectWallet,
                json!({ "wallets": [{ "currency": "BTC", "address": "bc1q" }] }),
            ),
        ];
        for (kind, credentials) in cases {
            let provider = f.checkout(&config(kind, credentials)).unwrap();
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn direct_wallet_has_no_webhook_source() {
        let err = factory()
            .webhooks(&config(ProviderKind::DirectWallet, json!({})))
            .err()
            .unwrap();
        assert!(matches!(err, WebhookError::UnsupportedProvider(_)));
    }

    #[test]
    fn webhook_source_without_secret_is_misconfigured() {
        let err = factory()
            .webhooks(&config(ProviderKind::Stripe, json!({ "secretKey": "sk" })))
            .err()
            .unwrap();
        assert!(matches!(err, WebhookError::Misconfigured(_)));
    }
}
