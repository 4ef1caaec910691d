//! Common error types for trailpack.

use thiserror::Error;

/// Common error type for trailpack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Fetch from environment {environment} failed: {reason}")]
    SourceFetch { environment: String, reason: String },

    #[error("Fetch from environment {environment} timed out after {seconds}s")]
    Timeout { environment: String, seconds: u64 },

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Manifest format error: {0}")]
    Format(String),

    #[error("Deployment package already exists: {0}")]
    DuplicatePackage(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] for callers that branch on the
/// failure class rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    SourceFetch,
    Format,
    Persistence,
    Cancelled,
    Other,
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Shorthand for a manifest format failure.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Config(_) => ErrorKind::Validation,
            Error::SourceFetch { .. } | Error::Timeout { .. } | Error::UnknownEnvironment(_) => {
                ErrorKind::SourceFetch
            }
            Error::Format(_) => ErrorKind::Format,
            Error::DuplicatePackage(_) | Error::Persistence(_) => ErrorKind::Persistence,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) | Error::Json(_) | Error::Other(_) => ErrorKind::Other,
        }
    }
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
