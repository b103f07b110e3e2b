//! CheckoutInitiator - opens a provider-side transaction for a pending payment.
//!
//! The provider call happens first and the payment row is written exactly
//! once afterwards. A provider failure leaves the payment untouched so the
//! buyer can simply retry.

use std::sync::Arc;

use crate::application::post_commit::{CommittedEvent, PostCommitHooks};
use crate::domain::checkout::{
    CheckoutError, CheckoutOutcome, CheckoutRequest, Order, Payment, ProviderConfig,
};
use crate::domain::foundation::{ErrorCode, PaymentId};
use crate::ports::{
    OrderRepository, PaymentRepository, ProviderConfigStore, ProviderFactory,
};

pub struct CheckoutInitiator {
    providers: Arc<dyn ProviderFactory>,
    payments: Arc<dyn PaymentRepository>,
    hooks: Arc<PostCommitHooks>,
    public_base_url: String,
}

impl CheckoutInitiator {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        payments: Arc<dyn PaymentRepository>,
        hooks: Arc<PostCommitHooks>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            providers,
            payments,
            hooks,
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn initiate(
        &self,
        config: &ProviderConfig,
        order: &Order,
        payment: &Payment,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if config.provider != payment.provider {
            return Err(CheckoutError::InvalidRequest(format!(
                "payment uses {} but configuration is for {}",
                payment.provider.as_str(),
                config.provider.as_str()
            )));
        }
        if !config.active {
            return Err(CheckoutError::ProviderInactive(config.provider));
        }
        if payment.order_id != order.id {
            return Err(CheckoutError::InvalidRequest(
                "payment does not belong to order".to_string(),
            ));
        }
        if !payment.can_initiate() || !order.is_pending() {
            return Err(CheckoutError::AlreadyInitiated(payment.id));
        }

        let request = CheckoutRequest::for_payment(order, payment, config, &self.public_base_url)?;
        let provider = self.providers.checkout(config)?;

        let initiated = provider.initiate(&request).await.map_err(|err| {
            tracing::warn!(
                provider = config.provider.as_str(),
                payment_id = %payment.id,
                retryable = err.is_retryable(),
                error = %err,
                "checkout initiation failed"
            );
            err
        })?;

        self.payments
            .record_initiation(&payment.id, &initiated.transaction)
            .await
            .map_err(|err| match err.code {
                ErrorCode::Conflict => CheckoutError::AlreadyInitiated(payment.id),
                _ => CheckoutError::Storage(err),
            })?;

        tracing::info!(
            provider = config.provider.as_str(),
            payment_id = %payment.id,
            transaction_id = %initiated.transaction.transaction_id,
            "checkout initiated"
        );

        self.hooks
            .run(&CommittedEvent::CheckoutInitiated {
                guild_id: order.guild_id.clone(),
                payment_id: payment.id,
                provider: config.provider,
                transaction_id: initiated.transaction.transaction_id.clone(),
            })
            .await;

        Ok(initiated.outcome)
    }
}

/// Command to start checkout for an existing pending payment.
#[derive(Debug, Clone)]
pub struct InitiateCheckoutCommand {
    pub payment_id: PaymentId,
}

/// Loads the payment, its order and the collecting account's configuration,
/// then delegates to [`CheckoutInitiator`].
pub struct InitiateCheckoutHandler {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    configs: Arc<dyn ProviderConfigStore>,
    initiator: Arc<CheckoutInitiator>,
}

impl InitiateCheckoutHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        configs: Arc<dyn ProviderConfigStore>,
        initiator: Arc<CheckoutInitiator>,
    ) -> Self {
        Self {
            orders,
            payments,
            configs,
            initiator,
        }
    }

    pub async fn handle(&self, cmd: InitiateCheckoutCommand) -> Result<CheckoutOutcome, CheckoutError> {
        let payment = self
            .payments
            .find(&cmd.payment_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("payment {}", cmd.payment_id)))?;

        let order = self
            .orders
            .find(&payment.order_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("order {}", payment.order_id)))?;

        let config = self
            .configs
            .find(order.config_owner(), payment.provider)
            .await?
            .ok_or_else(|| {
                CheckoutError::configuration(payment.provider, "no provider configuration")
            })?;

        self.initiator.initiate(&config, &order, &payment).await
    }
}
