//! Guild Checkout - payment checkout and webhook fulfillment for guild shops.
//!
//! Opens checkouts with PayPal, Stripe, CoinPayments, NOWPayments or a
//! direct crypto wallet, verifies and deduplicates the providers' webhooks,
//! and delivers what was bought: Discord roles, generated or prefilled
//! codes, and recurring subscriptions.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
