//! Payment provider adapters.
//!
//! One module per provider, each implementing [`PaymentProvider`] for the
//! outbound checkout call and [`WebhookSource`] for the inbound callback.
//! [`HttpProviderFactory`] builds them per request from tenant
//! configuration, sharing one timeout-bounded HTTP client.
//!
//! [`PaymentProvider`]: crate::ports::PaymentProvider
//! [`WebhookSource`]: crate::ports::WebhookSource

mod coinpayments;
mod direct_wallet;
mod factory;
mod http_util;
mod nowpayments;
mod paypal;
mod stripe;

pub use coinpayments::{CoinPaymentsProvider, CoinPaymentsWebhookSource};
pub use direct_wallet::DirectWalletProvider;
pub use factory::{HttpProviderFactory, ProviderEndpoints};
pub use nowpayments::{NowPaymentsProvider, NowPaymentsWebhookSource};
pub use paypal::{PayPalProvider, PayPalWebhookSource};
pub use stripe::{StripeProvider, StripeWebhookSource};
