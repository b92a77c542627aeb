//! # octofhir-auth
//!
//! SMART Backend Services client authentication for OctoFHIR Lab Watch.
//!
//! This crate provides:
//! - A typed key store loaded from a private JWKS file
//! - RFC 7523 client assertions signed with RS256/RS384/ES384 keys
//! - The client credentials token exchange
//! - An axum handler publishing the public JWKS
//!
//! ## Modules
//!
//! - [`config`] - Client authentication configuration
//! - [`token`] - Signing keys and the key store
//! - [`oauth`] - Assertion signing and token exchange
//! - [`http`] - Axum HTTP handler for the JWKS endpoint

pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod token;

pub use config::{AuthConfig, CLIENT_ASSERTION_TYPE, MAX_ASSERTION_LIFETIME};
pub use error::{AuthError, ErrorCategory};
pub use http::{JwksState, jwks_handler, jwks_router};
pub use oauth::{AccessToken, AssertionClaims, AssertionSigner, TokenExchanger, TokenResponse};
pub use token::{Jwk, Jwks, KeyStore, SigningAlgorithm, SigningKeyPair};

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
