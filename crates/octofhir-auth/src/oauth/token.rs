//! Client credentials token exchange.
//!
//! Exchanges a signed client assertion for a bearer access token at the
//! authorization server's token endpoint:
//!
//! ```text
//! POST /oauth2/token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=client_credentials
//! &client_assertion_type=urn:ietf:params:oauth:client-assertion-type:jwt-bearer
//! &client_assertion=eyJ...
//! ```
//!
//! There is no retry: a rejected or failed request fails the current cycle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client_assertion::AssertionSigner;
use crate::AuthResult;
use crate::config::{AuthConfig, CLIENT_ASSERTION_TYPE};
use crate::error::AuthError;
use crate::token::KeyStore;

/// Form body of a client credentials token request.
#[derive(Debug, Clone, Serialize)]
pub struct ClientCredentialsRequest<'a> {
    /// Always `client_credentials`.
    pub grant_type: &'static str,
    /// Always the JWT bearer assertion type.
    pub client_assertion_type: &'static str,
    /// The signed assertion.
    pub client_assertion: &'a str,
}

impl<'a> ClientCredentialsRequest<'a> {
    /// Creates a request carrying the given assertion.
    #[must_use]
    pub fn new(client_assertion: &'a str) -> Self {
        Self {
            grant_type: "client_credentials",
            client_assertion_type: CLIENT_ASSERTION_TYPE,
            client_assertion,
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, normally "Bearer".
    #[serde(default)]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// Granted scopes (space-separated).
    #[serde(default)]
    pub scope: Option<String>,
}

/// Bearer access token for the current export cycle. Never persisted.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_in: Option<Duration>,
    scope: Option<String>,
}

impl AccessToken {
    /// Wraps a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_in: None,
            scope: None,
        }
    }

    /// Returns the raw bearer string for the `Authorization` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Lifetime declared by the server, if any.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// Granted scopes, if reported.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        Self {
            token: response.access_token,
            expires_in: response.expires_in.map(Duration::from_secs),
            scope: response.scope,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Obtains access tokens with signed client assertions.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    signer: AssertionSigner,
}

impl TokenExchanger {
    /// Creates an exchanger posting to the signer's audience.
    #[must_use]
    pub fn new(http: reqwest::Client, signer: AssertionSigner) -> Self {
        Self { http, signer }
    }

    /// Creates an exchanger from the auth configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer cannot be built or the HTTP client
    /// cannot be created.
    pub fn from_config(config: &AuthConfig, key_store: Arc<KeyStore>) -> AuthResult<Self> {
        let signer = AssertionSigner::from_config(config, key_store)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::new(http, signer))
    }

    /// Returns the assertion signer.
    #[must_use]
    pub fn signer(&self) -> &AssertionSigner {
        &self.signer
    }

    /// Signs a fresh assertion and exchanges it for an access token.
    ///
    /// # Errors
    ///
    /// See [`TokenExchanger::exchange`].
    pub async fn fetch_token(&self) -> AuthResult<AccessToken> {
        let assertion = self.signer.sign()?;
        self.exchange(&assertion).await
    }

    /// Exchanges a signed assertion for an access token.
    ///
    /// # Errors
    ///
    /// - `AuthError::Transport` if the endpoint cannot be reached
    /// - `AuthError::TokenRequest` on a non-success status
    /// - `AuthError::InvalidTokenResponse` if the body is not a token response
    pub async fn exchange(&self, assertion: &str) -> AuthResult<AccessToken> {
        let endpoint = self.signer.audience();
        let response = self
            .http
            .post(endpoint)
            .header("Accept", "application/json")
            .form(&ClientCredentialsRequest::new(assertion))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %endpoint, error = %e, "Token endpoint unreachable");
                AuthError::transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Token request rejected");
            return Err(AuthError::TokenRequest {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::invalid_token_response(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::invalid_token_response("access_token is empty"));
        }

        tracing::info!(
            expires_in = ?parsed.expires_in,
            scope = ?parsed.scope,
            "Access token obtained"
        );
        Ok(parsed.into())
    }
}
