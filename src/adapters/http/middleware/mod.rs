//! HTTP middleware for axum.
//!
//! - `auth` - shared-secret guard for internal endpoints

pub mod auth;

pub use auth::{require_internal_secret, InternalSecret};
