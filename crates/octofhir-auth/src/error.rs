//! Authentication error types.
//!
//! This module defines the errors that can occur while loading signing keys,
//! building client assertions and exchanging them for access tokens.

use std::fmt;

/// Errors that can occur during backend-services authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The key set could not be read or contains a malformed key.
    #[error("Invalid key material: {message}")]
    KeyMaterial {
        /// Description of why the key material is unusable.
        message: String,
    },

    /// No signing key with the requested identifier exists.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was requested.
        kid: String,
    },

    /// Signing the assertion failed.
    #[error("Failed to sign assertion: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The token endpoint rejected the request.
    #[error("Token request rejected (HTTP {status}): {body}")]
    TokenRequest {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Response body, usually an OAuth error document.
        body: String,
    },

    /// The token endpoint answered with a body that is not a token response.
    #[error("Invalid token response: {message}")]
    InvalidTokenResponse {
        /// Description of what was wrong with the body.
        message: String,
    },

    /// The token endpoint could not be reached.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the network failure.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `KeyMaterial` error.
    #[must_use]
    pub fn key_material(message: impl Into<String>) -> Self {
        Self::KeyMaterial {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidTokenResponse` error.
    #[must_use]
    pub fn invalid_token_response(message: impl Into<String>) -> Self {
        Self::InvalidTokenResponse {
            message: message.into(),
        }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the failure is related to keys or a rejected assertion.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::KeyMaterial { .. }
                | Self::KeyNotFound { .. }
                | Self::Signing { .. }
                | Self::TokenRequest { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::KeyMaterial { .. } => ErrorCategory::Authentication,
            Self::KeyNotFound { .. } => ErrorCategory::Authentication,
            Self::Signing { .. } => ErrorCategory::Authentication,
            Self::TokenRequest { .. } => ErrorCategory::Authentication,
            Self::InvalidTokenResponse { .. } => ErrorCategory::Protocol,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Key material or assertion problems.
    Authentication,
    /// Network failures talking to the token endpoint.
    Transport,
    /// Responses that do not have the expected shape.
    Protocol,
    /// Invalid configuration.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Transport => write!(f, "transport"),
            Self::Protocol => write!(f, "protocol"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
