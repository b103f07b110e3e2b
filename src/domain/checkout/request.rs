//! Provider-neutral checkout request and result types.

use serde::Serialize;

use crate::domain::foundation::{DiscordUserId, GuildId, Money, OrderId, PaymentId};

use super::{
    BillingPeriod, CheckoutError, Order, Payment, ProviderConfig, ProviderKind, PurchaseMetadata,
};

/// Where the provider sends the buyer and its server-to-server callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnUrls {
    pub success: String,
    pub cancel: String,
    /// Webhook/IPN endpoint, addressed to the owning guild.
    pub notify: String,
}

impl ReturnUrls {
    pub fn build(
        base_url: &str,
        provider: ProviderKind,
        guild_id: Option<&GuildId>,
        order_number: &str,
    ) -> Result<Self, CheckoutError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| CheckoutError::InvalidRequest(format!("invalid base url: {}", e)))?;

        let page = |path: &str| -> Result<String, CheckoutError> {
            let mut url = base
                .join(path)
                .map_err(|e| CheckoutError::InvalidRequest(e.to_string()))?;
            url.query_pairs_mut().append_pair("order", order_number);
            Ok(url.into())
        };

        let mut notify = base
            .join(&format!("webhooks/{}", provider.as_str()))
            .map_err(|e| CheckoutError::InvalidRequest(e.to_string()))?;
        if let Some(guild) = guild_id {
            notify.query_pairs_mut().append_pair("guild_id", guild.as_str());
        }

        Ok(Self {
            success: page("checkout/success")?,
            cancel: page("checkout/cancel")?,
            notify: notify.into(),
        })
    }
}

/// Everything a provider strategy needs to open a transaction.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub guild_id: Option<GuildId>,
    pub description: String,
    pub billing_period: BillingPeriod,
    pub buyer: DiscordUserId,
    pub metadata: PurchaseMetadata,
    pub urls: ReturnUrls,
}

impl CheckoutRequest {
    /// The notify URL is addressed to the owner of `config`, since that is
    /// whose secret signs the callbacks.
    pub fn for_payment(
        order: &Order,
        payment: &Payment,
        config: &ProviderConfig,
        base_url: &str,
    ) -> Result<Self, CheckoutError> {
        let urls = ReturnUrls::build(
            base_url,
            payment.provider,
            config.guild_id.as_ref(),
            &order.order_number,
        )?;
        let metadata = PurchaseMetadata {
            order_id: Some(order.id),
            payment_id: Some(payment.id),
            guild_id: order.guild_id.clone(),
            discord_user_id: Some(order.buyer.clone()),
            shop_item_id: order.item.shop_item_id(),
            coupon_id: None,
        };
        Ok(Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            payment_id: payment.id,
            amount: payment.amount.clone(),
            guild_id: order.guild_id.clone(),
            description: order.item.description(),
            billing_period: order.item.billing_period(),
            buyer: order.buyer.clone(),
            metadata,
            urls,
        })
    }
}

/// What the buyer is shown after initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Hosted checkout page.
    Redirect { url: String },
    /// Out-of-band payment instructions (wallet addresses).
    Manual {
        title: String,
        description: String,
        instructions: Vec<String>,
    },
}

/// The provider-side identity of a newly opened transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTransaction {
    pub transaction_id: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct InitiatedCheckout {
    pub outcome: CheckoutOutcome,
    pub transaction: ProviderTransaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_url_is_addressed_to_the_guild() {
        let guild = GuildId::new("123").unwrap();
        let urls = ReturnUrls::build(
            "https://pay.example.com/",
            ProviderKind::CoinPayments,
            Some(&guild),
            "ORD-1",
        )
        .unwrap();

        assert_eq!(urls.notify, "https://pay.example.com/webhooks/coinpayments?guild_id=123");
        assert_eq!(urls.success, "https://pay.example.com/checkout/success?order=ORD-1");
        assert_eq!(urls.cancel, "https://pay.example.com/checkout/cancel?order=ORD-1");
    }

    #[test]
    fn platform_notify_url_has_no_guild() {
        let urls = ReturnUrls::build("https://pay.example.com", ProviderKind::PayPal, None, "A").unwrap();
        assert_eq!(urls.notify, "https://pay.example.com/webhooks/paypal");
    }

    #[test]
    fn invalid_base_url_is_an_invalid_request() {
        let err = ReturnUrls::build("not a url", ProviderKind::Stripe, None, "A").unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidRequest(_)));
    }

    #[test]
    fn outcome_serializes_with_type_tag() {
        let json = serde_json::to_value(CheckoutOutcome::Redirect {
            url: "https://x".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "redirect");
        assert_eq!(json["url"], "https://x");
    }
}
