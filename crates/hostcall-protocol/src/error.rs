//! Errors raised while reading or writing wire documents.

/// Wire document (de)serialization errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported protocol version {version}; expected {expected}")]
    UnsupportedVersion { version: i32, expected: i32 },
}
