use thiserror::Error;

/// Errors raised while turning raw JSON into typed lab records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing resourceType")]
    MissingResourceType,

    #[error("Expected resourceType {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
}

pub type Result<T> = std::result::Result<T, RecordError>;
