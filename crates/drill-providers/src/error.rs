//! Error types for the catalog and chat backend.

use std::path::PathBuf;

use drill_engine::{ServiceError, ServiceErrorKind};

/// A specialized `Result` type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised while loading the catalog or talking to the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // ========================================================================
    // Catalog Errors
    // ========================================================================
    /// Catalog file does not exist.
    #[error("Error catalog not found: {path}\n\nSuggestion: Point `catalog` in drill.json at a catalog file")]
    CatalogNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Catalog file is larger than allowed.
    #[error("Error catalog '{path}' is too large ({size} bytes, max {max} bytes)")]
    CatalogTooLarge {
        /// Path to the catalog file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// Catalog file is not valid catalog JSON.
    #[error("Invalid error catalog '{path}': {message}")]
    CatalogParse {
        /// Path to the catalog file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    // ========================================================================
    // Chat Errors
    // ========================================================================
    /// The API key environment variable is not set.
    #[error("Environment variable {var} is not set\n\nSuggestion: Export your API key as {var}")]
    MissingApiKey {
        /// Name of the variable.
        var: String,
    },

    /// The chat service answered with a non-success status.
    #[error("Chat API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The chat service answered without any content.
    #[error("Chat API returned no choices")]
    EmptyResponse,

    /// The answer could not be understood.
    #[error("Unexpected chat response: {message}")]
    InvalidResponse {
        /// What was wrong with the answer.
        message: String,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Creates a new `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Classifies this error for the engine.
    #[must_use]
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::Api { status: 429, .. } => ServiceErrorKind::RateLimit,
            Self::Api { status, .. } if *status >= 500 => ServiceErrorKind::Unavailable,
            Self::Http(e) if e.is_timeout() => ServiceErrorKind::Timeout,
            Self::Http(e) if e.is_connect() => ServiceErrorKind::Unavailable,
            Self::EmptyResponse | Self::InvalidResponse { .. } => {
                ServiceErrorKind::InvalidResponse
            }
            _ => ServiceErrorKind::Other,
        }
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
