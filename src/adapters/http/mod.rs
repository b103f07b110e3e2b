//! HTTP adapter - the axum surface of the service.
//!
//! - `POST /webhooks/{provider}?guild_id={id}` - provider callbacks
//! - `POST /api/checkout` - start checkout for a pending payment
//! - `GET /health` - liveness

pub mod dto;
pub mod handlers;
pub mod middleware;
mod routes;

pub use handlers::AppState;
pub use routes::router;
