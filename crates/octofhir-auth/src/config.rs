//! Backend-services client configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! client_id = "0f8c1b2a-..."
//! token_endpoint = "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/token"
//! jwks_path = "keys.json"
//! assertion_lifetime = "4m"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest assertion lifetime accepted by SMART Backend Services token endpoints.
pub const MAX_ASSERTION_LIFETIME: Duration = Duration::from_secs(300);

/// Client assertion type for `private_key_jwt` authentication (RFC 7523).
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Authentication configuration for the export client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Registered client ID. Used as both `iss` and `sub` of every assertion.
    pub client_id: String,

    /// OAuth 2.0 token endpoint. Used as the assertion `aud`.
    pub token_endpoint: String,

    /// Path of the JWKS file holding the private signing keys.
    pub jwks_path: PathBuf,

    /// Key ID to sign with. Defaults to the first signing key in the set.
    pub key_id: Option<String>,

    /// Validity window of each assertion.
    #[serde(with = "humantime_serde")]
    pub assertion_lifetime: Duration,

    /// Timeout for the token request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            token_endpoint: "https://fhir.epic.com/interconnect-fhir-oauth/oauth2/token"
                .to_string(),
            jwks_path: PathBuf::from("keys.json"),
            key_id: None,
            assertion_lifetime: Duration::from_secs(240), // 4 minutes
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("auth.client_id must not be empty".into());
        }
        if url::Url::parse(&self.token_endpoint).is_err() {
            return Err(format!(
                "auth.token_endpoint is not a valid URL: {}",
                self.token_endpoint
            ));
        }
        if self.assertion_lifetime.is_zero() {
            return Err("auth.assertion_lifetime must be > 0".into());
        }
        if self.assertion_lifetime > MAX_ASSERTION_LIFETIME {
            return Err(format!(
                "auth.assertion_lifetime must not exceed {}s",
                MAX_ASSERTION_LIFETIME.as_secs()
            ));
        }
        if self.request_timeout.is_zero() {
            return Err("auth.request_timeout must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig {
            client_id: "client-123".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_lifetime_is_four_minutes() {
        assert_eq!(AuthConfig::default().assertion_lifetime.as_secs(), 240);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_client_id() {
        let err = AuthConfig::default().validate().unwrap_err();
        assert!(err.contains("client_id"));
    }

    #[test]
    fn test_validate_lifetime_bounds() {
        let mut cfg = valid();
        cfg.assertion_lifetime = Duration::from_secs(301);
        assert!(cfg.validate().unwrap_err().contains("assertion_lifetime"));

        cfg.assertion_lifetime = Duration::ZERO;
        assert!(cfg.validate().is_err());

        cfg.assertion_lifetime = MAX_ASSERTION_LIFETIME;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_token_endpoint() {
        let mut cfg = valid();
        cfg.token_endpoint = "not a url".to_string();
        assert!(cfg.validate().unwrap_err().contains("token_endpoint"));
    }

    #[test]
    fn test_humantime_deserialize() {
        let cfg: AuthConfig = serde_json::from_str(
            r#"{"client_id":"c","assertion_lifetime":"2m","request_timeout":"5s"}"#,
        )
        .unwrap();
        assert_eq!(cfg.assertion_lifetime, Duration::from_secs(120));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }
}
