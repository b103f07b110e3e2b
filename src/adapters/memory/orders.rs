//! In-memory order and payment store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::checkout::{
    Order, OrderStatus, Payment, PaymentStatus, ProviderKind, ProviderTransaction,
};
use crate::domain::foundation::{DomainError, ErrorCode, OrderId, PaymentId, StateMachine};
use crate::ports::{OrderRepository, PaymentRepository};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    initiation_writes: usize,
}

/// Backs both [`OrderRepository`] and [`PaymentRepository`] so a single
/// lock covers the pair, like one database would.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: RwLock<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    pub async fn insert_payment(&self, payment: Payment) {
        self.state.write().await.payments.insert(payment.id, payment);
    }

    pub async fn order(&self, id: &OrderId) -> Option<Order> {
        self.state.read().await.orders.get(id).cloned()
    }

    pub async fn payment(&self, id: &PaymentId) -> Option<Payment> {
        self.state.read().await.payments.get(id).cloned()
    }

    /// Number of successful `record_initiation` writes.
    pub async fn initiation_writes(&self) -> usize {
        self.state.read().await.initiation_writes
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.order(id).await)
    }

    async fn settle(&self, id: &OrderId, status: OrderStatus) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(id) {
            Some(order) if order.status.can_transition_to(&status) => {
                order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryOrderStore {
    async fn find(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payment(id).await)
    }

    async fn find_by_transaction(
        &self,
        provider: ProviderKind,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.provider == provider && p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn record_initiation(
        &self,
        id: &PaymentId,
        transaction: &ProviderTransaction,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(id)
            .ok_or_else(|| DomainError::new(ErrorCode::PaymentNotFound, format!("payment {}", id)))?;
        payment
            .record_initiation(transaction)
            .map_err(|e| DomainError::new(ErrorCode::Conflict, e.to_string()))?;
        state.initiation_writes += 1;
        Ok(())
    }

    async fn settle(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.payments.get_mut(id) {
            Some(payment) if payment.status.can_transition_to(&status) => {
                payment.status = status;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Money;

    #[tokio::test]
    async fn settle_is_conditional_on_pending() {
        let store = InMemoryOrderStore::new();
        let payment = Payment::new_pending(
            OrderId::new(),
            ProviderKind::PayPal,
            Money::new(100, "USD").unwrap(),
        );
        store.insert_payment(payment.clone()).await;

        assert!(PaymentRepository::settle(&store, &payment.id, PaymentStatus::Completed)
            .await
            .unwrap());
        assert!(!PaymentRepository::settle(&store, &payment.id, PaymentStatus::Completed)
            .await
            .unwrap());
        assert!(!PaymentRepository::settle(&store, &payment.id, PaymentStatus::Failed)
            .await
            .unwrap());
    }
}
