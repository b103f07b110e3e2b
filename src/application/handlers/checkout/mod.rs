//! Checkout command handlers.

mod initiate_checkout;

pub use initiate_checkout::{CheckoutInitiator, InitiateCheckoutCommand, InitiateCheckoutHandler};
