//! Checkout initiation error taxonomy.

use thiserror::Error;

use crate::domain::foundation::{DomainError, PaymentId};

use super::ProviderKind;

/// Failures of `initiate`. None of them leave a partial write behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Missing or malformed provider credentials. Fatal, not retried.
    #[error("{provider} is misconfigured: {reason}")]
    Configuration {
        provider: ProviderKind,
        reason: String,
    },

    /// Non-2xx or network failure from the provider. The payment stays
    /// pending and initiation may be retried.
    #[error("{provider} API error: {message}")]
    ProviderApi {
        provider: ProviderKind,
        message: String,
        status: Option<u16>,
    },

    #[error("{0} is not enabled for this destination")]
    ProviderInactive(ProviderKind),

    #[error("Payment {0} was already initiated or is no longer pending")]
    AlreadyInitiated(PaymentId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DomainError),
}

impl CheckoutError {
    pub fn configuration(provider: ProviderKind, reason: impl Into<String>) -> Self {
        CheckoutError::Configuration {
            provider,
            reason: reason.into(),
        }
    }

    pub fn missing_credential(provider: ProviderKind, field: &'static str) -> Self {
        Self::configuration(provider, format!("missing credential `{}`", field))
    }

    pub fn provider_api(provider: ProviderKind, message: impl Into<String>) -> Self {
        CheckoutError::ProviderApi {
            provider,
            message: message.into(),
            status: None,
        }
    }

    pub fn provider_status(provider: ProviderKind, status: u16, body: impl Into<String>) -> Self {
        CheckoutError::ProviderApi {
            provider,
            message: format!("HTTP {}: {}", status, body.into()),
            status: Some(status),
        }
    }

    /// Whether the caller may retry the same initiation.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::ProviderApi { status, .. } => {
                status.map_or(true, |s| s >= 500 || s == 429)
            }
            CheckoutError::Storage(_) => true,
            _ => false,
        }
    }
}
