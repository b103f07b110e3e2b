//! Payment aggregate: one attempt to pay for an order through one provider.
//!
//! Lifecycle: `pending -> completed | failed`, both terminal. The provider
//! transaction id is written once by checkout initiation and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{Money, OrderId, PaymentId, StateMachine, ValidationError};

use super::{ProviderKind, ProviderTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PaymentStatus::Pending => vec![PaymentStatus::Completed, PaymentStatus::Failed],
            PaymentStatus::Completed | PaymentStatus::Failed => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub provider: ProviderKind,
    pub amount: Money,
    /// Provider-assigned id; `None` until initiation succeeds.
    pub transaction_id: Option<String>,
    /// Provider-specific data (session id, order id, deposit address...).
    pub metadata: serde_json::Value,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new_pending(order_id: OrderId, provider: ProviderKind, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            provider,
            amount,
            transaction_id: None,
            metadata: serde_json::Value::Object(Default::default()),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pending and not yet bound to a provider transaction.
    pub fn can_initiate(&self) -> bool {
        self.status == PaymentStatus::Pending && self.transaction_id.is_none()
    }

    pub fn record_initiation(&mut self, transaction: &ProviderTransaction) -> Result<(), ValidationError> {
        if !self.can_initiate() {
            return Err(ValidationError::invalid_format(
                "transaction_id",
                "payment already bound to a provider transaction",
            ));
        }
        self.transaction_id = Some(transaction.transaction_id.clone());
        self.metadata = transaction.metadata.clone();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(PaymentStatus::Completed)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(PaymentStatus::Failed)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
