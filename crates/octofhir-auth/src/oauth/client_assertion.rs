//! JWT client assertions for Backend Services.
//!
//! This module builds and signs client assertions per RFC 7523 (JSON Web
//! Token Bearer Assertion) for the OAuth 2.0 client credentials flow in
//! SMART Backend Services.
//!
//! # Assertion Claims
//!
//! - `iss` (issuer): the client_id
//! - `sub` (subject): the client_id
//! - `aud` (audience): the token endpoint URL
//! - `jti` (JWT ID): a fresh UUID for every assertion
//! - `exp` (expiration): `iat` + the configured window (at most 5 minutes)
//! - `nbf` / `iat`: the signing time
//!
//! Assertions are single use. Call [`AssertionSigner::sign`] for every token
//! request; never cache the result.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::{AuthConfig, MAX_ASSERTION_LIFETIME};
use crate::error::AuthError;
use crate::token::KeyStore;

/// JWT claims for a client assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    /// Issuer - the client_id.
    pub iss: String,

    /// Subject - the client_id.
    pub sub: String,

    /// Audience - the token endpoint URL.
    pub aud: String,

    /// JWT ID - unique per assertion to prevent replay.
    pub jti: String,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// Not-before time as Unix timestamp.
    pub nbf: i64,

    /// Issued-at time as Unix timestamp.
    pub iat: i64,
}

impl AssertionClaims {
    /// Builds claims issued at `now` and valid for `lifetime`.
    ///
    /// Lifetimes below one second are rounded up so that `exp > iat` holds.
    #[must_use]
    pub fn new(
        client_id: &str,
        audience: &str,
        lifetime: Duration,
        now: OffsetDateTime,
    ) -> Self {
        let issued_at = now.unix_timestamp();
        let window = i64::try_from(lifetime.as_secs().max(1)).unwrap_or(i64::MAX);
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            exp: issued_at.saturating_add(window),
            nbf: issued_at,
            iat: issued_at,
        }
    }
}

/// Builds and signs client assertions with a key from the [`KeyStore`].
///
/// # Example
///
/// ```ignore
/// use octofhir_auth::oauth::AssertionSigner;
///
/// let signer = AssertionSigner::new(key_store, "client-123", token_endpoint);
/// let assertion = signer.sign()?;
/// ```
#[derive(Debug, Clone)]
pub struct AssertionSigner {
    key_store: Arc<KeyStore>,
    client_id: String,
    audience: String,
    lifetime: Duration,
    key_id: Option<String>,
}

impl AssertionSigner {
    /// Creates a signer using the store's default key and a 4 minute window.
    #[must_use]
    pub fn new(
        key_store: Arc<KeyStore>,
        client_id: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            key_store,
            client_id: client_id.into(),
            audience: audience.into(),
            lifetime: Duration::from_secs(240),
            key_id: None,
        }
    }

    /// Creates a signer from the auth configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured `key_id` is not in the key store or
    /// the lifetime exceeds the 5 minute maximum.
    pub fn from_config(config: &AuthConfig, key_store: Arc<KeyStore>) -> AuthResult<Self> {
        let mut signer = Self::new(key_store, &config.client_id, &config.token_endpoint)
            .with_lifetime(config.assertion_lifetime)?;
        if let Some(kid) = &config.key_id {
            signer = signer.with_key_id(kid)?;
        }
        Ok(signer)
    }

    /// Sets the assertion validity window.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the window is zero or exceeds
    /// five minutes.
    pub fn with_lifetime(mut self, lifetime: Duration) -> AuthResult<Self> {
        if lifetime.is_zero() || lifetime > MAX_ASSERTION_LIFETIME {
            return Err(AuthError::configuration(format!(
                "Assertion lifetime must be between 1s and {}s",
                MAX_ASSERTION_LIFETIME.as_secs()
            )));
        }
        self.lifetime = lifetime;
        Ok(self)
    }

    /// Signs with a specific key instead of the store default.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyNotFound` if the key is not in the store.
    pub fn with_key_id(mut self, kid: impl Into<String>) -> AuthResult<Self> {
        let kid = kid.into();
        self.key_store.signing_key(&kid)?;
        self.key_id = Some(kid);
        Ok(self)
    }

    /// Returns the audience (token endpoint URL).
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Returns the client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Builds a fresh set of claims for the current time.
    #[must_use]
    pub fn claims(&self) -> AssertionClaims {
        AssertionClaims::new(
            &self.client_id,
            &self.audience,
            self.lifetime,
            OffsetDateTime::now_utc(),
        )
    }

    /// Builds and signs a new assertion.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key cannot be found or signing fails.
    pub fn sign(&self) -> AuthResult<String> {
        self.sign_claims(&self.claims())
    }

    /// Signs the given claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key cannot be found or signing fails.
    pub fn sign_claims(&self, claims: &AssertionClaims) -> AuthResult<String> {
        let key = match &self.key_id {
            Some(kid) => self.key_store.signing_key(kid)?,
            None => self.key_store.default_key(),
        };
        tracing::debug!(kid = %key.kid, jti = %claims.jti, exp = claims.exp, "Signing client assertion");
        key.sign(claims)
    }
}
