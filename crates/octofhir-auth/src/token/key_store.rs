//! Typed signing key store.
//!
//! The key store is loaded from a JWKS file holding private keys. Every key is
//! validated and converted into a [`SigningKeyPair`] at load time, so a broken
//! key fails startup instead of the first signing attempt. Keys are looked up
//! by their `kid`; the default signing key is either configured explicitly or
//! the first signing key in file order.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::jwt::{Jwks, PrivateJwk, SigningKeyPair};
use crate::AuthResult;
use crate::error::AuthError;

#[derive(Deserialize)]
struct PrivateJwks {
    keys: Vec<PrivateJwk>,
}

/// Validated set of private signing keys.
#[derive(Debug)]
pub struct KeyStore {
    keys: Vec<SigningKeyPair>,
    default_kid: String,
}

impl KeyStore {
    /// Loads a key store from a JWKS file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyMaterial` if the file cannot be read or any
    /// signing key in it is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::key_material(format!("Failed to read {}: {e}", path.display()))
        })?;
        let store = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            keys = store.len(),
            default_kid = %store.default_kid,
            "Signing keys loaded"
        );
        Ok(store)
    }

    /// Parses a key store from JWKS JSON.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyMaterial` if the JSON is not a key set, the set
    /// has no signing keys, a key is malformed, or two keys share a `kid`.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let jwks: PrivateJwks = serde_json::from_str(json)
            .map_err(|e| AuthError::key_material(format!("Invalid JWKS document: {e}")))?;

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for jwk in jwks.keys.iter().filter(|k| k.is_signing_key()) {
            let key = SigningKeyPair::from_jwk(jwk)?;
            if !seen.insert(key.kid.clone()) {
                return Err(AuthError::key_material(format!(
                    "Duplicate key id in JWKS: {}",
                    key.kid
                )));
            }
            keys.push(key);
        }

        let default_kid = keys
            .first()
            .map(|k| k.kid.clone())
            .ok_or_else(|| AuthError::key_material("JWKS contains no signing keys"))?;

        Ok(Self { keys, default_kid })
    }

    /// Selects the key used by [`KeyStore::default_key`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyNotFound` if no key has this `kid`.
    pub fn with_default_key(mut self, kid: &str) -> AuthResult<Self> {
        self.signing_key(kid)?;
        self.default_kid = kid.to_string();
        Ok(self)
    }

    /// Returns the signing key with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyNotFound` if no key has this `kid`.
    pub fn signing_key(&self, kid: &str) -> AuthResult<&SigningKeyPair> {
        self.keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| AuthError::key_not_found(kid))
    }

    /// Returns the default signing key.
    #[must_use]
    pub fn default_key(&self) -> &SigningKeyPair {
        // `from_json` guarantees the set is non-empty and `with_default_key`
        // only accepts known ids.
        self.keys
            .iter()
            .find(|k| k.kid == self.default_kid)
            .unwrap_or(&self.keys[0])
    }

    /// Returns the identifier of the default signing key.
    #[must_use]
    pub fn default_kid(&self) -> &str {
        &self.default_kid
    }

    /// Returns the number of signing keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always `false`: an empty key store cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the public half of every signing key.
    #[must_use]
    pub fn public_jwks(&self) -> Jwks {
        let mut jwks = Jwks::new();
        for key in &self.keys {
            jwks.add_key(key.to_jwk());
        }
        jwks
    }
}
