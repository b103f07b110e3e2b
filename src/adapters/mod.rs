//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `payments` - PayPal, Stripe, CoinPayments, NOWPayments and direct wallet clients
//! - `postgres` - sqlx repositories
//! - `memory` - in-memory repositories and recording doubles
//! - `bot_api` - internal bot API client and channel announcements
//! - `http` - axum routes for webhooks and checkout

pub mod bot_api;
pub mod http;
pub mod memory;
pub mod payments;
pub mod postgres;
