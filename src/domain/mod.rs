//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, money, errors, state machines)
//! - `checkout` - Orders, payments and provider configuration
//! - `shop` - Guild shop items, subscriptions, codes and coupons
//! - `webhook` - Signature schemes and normalized provider events
//! - `audit` - Append-only audit entries

pub mod audit;
pub mod checkout;
pub mod foundation;
pub mod shop;
pub mod webhook;
