//! Axum HTTP handlers.

pub mod jwks;

pub use jwks::{JwksState, jwks_handler, jwks_router};
