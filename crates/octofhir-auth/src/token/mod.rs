//! Signing keys and JWT encoding.
//!
//! - [`jwt`] - Signing algorithms, private/public JWK types, signing keys
//! - [`key_store`] - JWKS-file backed key store with lookup by `kid`

pub mod jwt;
pub mod key_store;

pub use jwt::{Jwk, Jwks, PrivateJwk, SigningAlgorithm, SigningKeyPair};
pub use key_store::KeyStore;
