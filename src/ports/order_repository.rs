//! Order and payment persistence ports.
//!
//! Orders and payments are created elsewhere. These ports only expose the
//! reads and the guarded single-step transitions the checkout core needs.
//! Every transition is conditional on the current state so that concurrent
//! handlers racing on the same event cannot both win.

use async_trait::async_trait;

use crate::domain::checkout::{
    Order, OrderStatus, Payment, PaymentStatus, ProviderKind, ProviderTransaction,
};
use crate::domain::foundation::{DomainError, OrderId, PaymentId};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, DomainError>;

    /// Moves a pending order to `status`. Returns false when the order was
    /// not pending.
    async fn settle(&self, id: &OrderId, status: OrderStatus) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    async fn find_by_transaction(
        &self,
        provider: ProviderKind,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Binds the provider transaction to a pending, unbound payment.
    ///
    /// Fails with `ErrorCode::Conflict` if the payment is already bound or
    /// the `(provider, transaction_id)` pair is taken.
    async fn record_initiation(
        &self,
        id: &PaymentId,
        transaction: &ProviderTransaction,
    ) -> Result<(), DomainError>;

    /// Moves a pending payment to `status`. Returns false when the payment
    /// was not pending.
    async fn settle(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool, DomainError>;
}
