//! Checkout context: orders, payments, provider configuration and the
//! provider-neutral request/outcome types exchanged with provider adapters.

mod errors;
pub mod metadata;
mod order;
mod payment;
mod provider;
mod request;

pub use errors::CheckoutError;
pub use metadata::PurchaseMetadata;
pub use order::{BillingPeriod, Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use provider::{Credentials, ProviderConfig, ProviderKind};
pub use request::{
    CheckoutOutcome, CheckoutRequest, InitiatedCheckout, ProviderTransaction, ReturnUrls,
};
