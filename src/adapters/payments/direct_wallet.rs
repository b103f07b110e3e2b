//! Direct wallet "provider": no API, just the guild's own addresses.
//!
//! The buyer is shown where to send funds; staff confirm receipt outside
//! this service, so there is no webhook source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderConfig,
    ProviderKind, ProviderTransaction,
};
use crate::ports::PaymentProvider;

const KIND: ProviderKind = ProviderKind::DirectWallet;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Wallet {
    pub currency: String,
    pub address: String,
    #[serde(default)]
    pub network: Option<String>,
}

pub struct DirectWalletProvider {
    wallets: Vec<Wallet>,
}

impl DirectWalletProvider {
    /// Entries that do not parse or have a blank address are skipped; at
    /// least one usable wallet is required.
    pub(super) fn from_config(config: &ProviderConfig) -> Result<Self, CheckoutError> {
        let wallets: Vec<Wallet> = config
            .credentials()
            .list("wallets")
            .iter()
            .filter_map(|entry| serde_json::from_value::<Wallet>(entry.clone()).ok())
            .filter(|w| !w.address.trim().is_empty() && !w.currency.trim().is_empty())
            .collect();
        if wallets.is_empty() {
            return Err(CheckoutError::missing_credential(KIND, "wallets"));
        }
        Ok(Self { wallets })
    }
}

fn instruction(wallet: &Wallet) -> String {
    match &wallet.network {
        Some(network) => format!("{} ({}): {}", wallet.currency, network, wallet.address),
        None => format!("{}: {}", wallet.currency, wallet.address),
    }
}

#[async_trait]
impl PaymentProvider for DirectWalletProvider {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<InitiatedCheckout, CheckoutError> {
        let reference = format!("manual_{}", request.payment_id);
        Ok(InitiatedCheckout {
            outcome: CheckoutOutcome::Manual {
                title: format!("Pay {} by wallet transfer", request.amount),
                description: format!(
                    "Send exactly {} for {} and include reference {} so staff can match it.",
                    request.amount, request.description, reference
                ),
                instructions: self.wallets.iter().map(instruction).collect(),
            },
            transaction: ProviderTransaction {
                metadata: json!({
                    "reference": reference,
                    "wallets": self
                        .wallets
                        .iter()
                        .map(|w| json!({ "currency": w.currency, "address": w.address }))
                        .collect::<Vec<_>>(),
                }),
                transaction_id: reference,
            },
        })
    }
}
