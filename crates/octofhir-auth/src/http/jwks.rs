//! JWKS endpoint HTTP handler.
//!
//! Publishes the public half of the client's signing keys so the
//! authorization server can verify client assertions. The URL of this
//! endpoint is what gets registered as the client's JWK Set URL.
//!
//! # References
//!
//! - [RFC 7517 - JSON Web Key](https://tools.ietf.org/html/rfc7517)
//! - [SMART Backend Services](https://hl7.org/fhir/smart-app-launch/backend-services.html)

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::token::KeyStore;

/// State for the JWKS endpoint.
#[derive(Clone)]
pub struct JwksState {
    /// The key store holding the signing keys.
    pub key_store: Arc<KeyStore>,
}

impl JwksState {
    /// Creates a new JWKS state.
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self { key_store }
    }
}

/// Handler for `GET /jwks`.
///
/// Returns 200 OK with the public keys and a `Cache-Control` header allowing
/// caching for 1 hour.
pub async fn jwks_handler(State(state): State<JwksState>) -> impl IntoResponse {
    let jwks = state.key_store.public_jwks();
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(jwks),
    )
}

/// Router serving the JWKS at `/jwks` and `/.well-known/jwks.json`.
pub fn jwks_router(key_store: Arc<KeyStore>) -> Router {
    Router::new()
        .route("/jwks", get(jwks_handler))
        .route("/.well-known/jwks.json", get(jwks_handler))
        .with_state(JwksState::new(key_store))
}
