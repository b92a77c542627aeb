//! Bulk export error types.

use std::time::Duration;

use octofhir_labs::RecordError;
use thiserror::Error;

/// Errors raised while running a bulk export.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The server could not be reached or the connection failed.
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a status the protocol does not allow here.
    #[error("Unexpected HTTP {status} from {url}: {message}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        message: String,
    },

    /// `Content-Location` is not a usable URL.
    #[error("Invalid status location '{location}': {message}")]
    InvalidLocation { location: String, message: String },

    /// The completion body is not an export manifest.
    #[error("Invalid export manifest from {url}: {message}")]
    InvalidManifest { url: String, message: String },

    /// The job did not complete within the polling budget.
    #[error("Export did not complete after {attempts} status checks ({elapsed:?})")]
    PollExhausted { attempts: u32, elapsed: Duration },

    /// The manifest lists a resource kind that cannot be ingested.
    #[error("Unsupported resource kind in export output: {kind}")]
    UnknownResourceKind { kind: String },

    /// An NDJSON line could not be turned into a typed record.
    #[error("Invalid record in {url} at line {line}: {source}")]
    Record {
        url: String,
        line: usize,
        #[source]
        source: RecordError,
    },

    /// Export settings are invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl BulkError {
    #[must_use]
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_manifest(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Connection-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Failures caused by a response that does not follow the bulk data protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::InvalidLocation { .. }
                | Self::InvalidManifest { .. }
                | Self::PollExhausted { .. }
                | Self::UnknownResourceKind { .. }
                | Self::Record { .. }
        )
    }

    /// Whether the error came from an HTTP 401/403.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { status: 401 | 403, .. })
    }
}

pub type BulkResult<T> = Result<T, BulkError>;
