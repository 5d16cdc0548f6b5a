//! Error types for the rlmgate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! classifies every failure into one of the caller-visible [`ErrorKind`]s.

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::Usage;

/// The top-level error type for all rlmgate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("{0}")]
    Provider(#[from] ProviderError),

    // --- Session storage errors ---
    #[error("{0}")]
    Storage(#[from] StorageError),

    // --- Configuration errors ---
    #[error("{message}")]
    Config { message: String },

    // --- Request validation ---
    #[error("{0}")]
    Validation(String),

    // --- Serialization ---
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The caller-visible classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field was missing or malformed.
    Validation,
    /// Missing credential, unknown model or backend.
    Configuration,
    /// The backend call failed or returned an error payload.
    Backend,
    /// Reading or writing session state failed.
    Storage,
    /// A bug in rlmgate itself.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation error"),
            Self::Configuration => write!(f, "configuration error"),
            Self::Backend => write!(f, "backend failure"),
            Self::Storage => write!(f, "storage error"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl Error {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify this error for the outer request handler.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(e) => e.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config { .. } => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("unknown model: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The backend billed the call but its reply was unusable.
    #[error("Backend returned an unusable reply: {message}")]
    Partial { message: String, usage: Usage },
}

impl ProviderError {
    /// Configuration problems are detected before any network traffic.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelNotFound(_) | Self::NotConfigured(_) => ErrorKind::Configuration,
            _ => ErrorKind::Backend,
        }
    }

    /// Usage the backend reported even though the call failed.
    pub fn partial_usage(&self) -> Option<&Usage> {
        match self {
            Self::Partial { usage, .. } => Some(usage),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failure on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("corrupted record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
