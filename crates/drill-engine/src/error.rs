//! Error types for the practice-session engine.
//!
//! [`DrillError`] covers configuration loading, validation, generation, the
//! session layer and state persistence. [`ServiceError`] is what external
//! collaborators return; the controllers absorb most of those into fallback
//! values, so a `ServiceError` only reaches the caller wrapped in
//! [`DrillError::GenerationFailure`].

use std::path::PathBuf;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, DrillError>;

/// Errors that can occur while running a practice session.
#[derive(Debug, thiserror::Error)]
pub enum DrillError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your drill.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Terminal Workflow Errors
    // ========================================================================
    /// Session parameters were rejected before any external call was made.
    #[error("Validation failed: {message}")]
    ValidationError {
        /// What was wrong with the session parameters.
        message: String,
    },

    /// Code generation failed and no regeneration will be attempted.
    #[error("Code generation failed: {message}")]
    GenerationFailure {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Review Submission Errors
    // ========================================================================
    /// The learner's review text was empty or too short.
    #[error("Review rejected: {message}")]
    ReviewSubmissionError {
        /// Why the review was rejected.
        message: String,
    },

    // ========================================================================
    // Session Layer Errors
    // ========================================================================
    /// The per-session lock could not be acquired in time.
    #[error("Session {session_id} is busy (lock not acquired within {timeout_secs}s)\n\nSuggestion: Wait for the current request to finish and retry")]
    SessionBusy {
        /// Identifier of the locked session.
        session_id: String,
        /// How long the caller waited.
        timeout_secs: u64,
    },

    /// The requested operation is not allowed in the session's current phase.
    #[error("Cannot {operation} while session is in phase '{phase}'")]
    InvalidPhase {
        /// Operation that was attempted.
        operation: String,
        /// Phase the session was in.
        phase: String,
    },

    /// A review was submitted for an iteration that is no longer current.
    #[error("Submission for iteration {submitted} is stale (current iteration is {current})")]
    StaleSubmission {
        /// Iteration the caller submitted for.
        submitted: u32,
        /// Iteration the session is waiting for.
        current: u32,
    },

    /// No session exists with the given identifier.
    #[error("Session not found: '{session_id}'")]
    SessionNotFound {
        /// The unknown identifier.
        session_id: String,
    },

    // ========================================================================
    // State Persistence Errors
    // ========================================================================
    /// State file contains malformed JSON that cannot be recovered.
    #[error("Corrupted state file '{path}': {message}\n\nSuggestion: Remove the state file to start fresh")]
    StateFileCorrupted {
        /// Path to the corrupted state file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DrillError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ValidationError`.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a new `GenerationFailure`.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailure {
            message: message.into(),
        }
    }

    /// Creates a new `ReviewSubmissionError`.
    #[must_use]
    pub fn review_rejected(message: impl Into<String>) -> Self {
        Self::ReviewSubmissionError {
            message: message.into(),
        }
    }

    /// Creates a new `SessionBusy` error.
    #[must_use]
    pub fn session_busy(session_id: impl Into<String>, timeout_secs: u64) -> Self {
        Self::SessionBusy {
            session_id: session_id.into(),
            timeout_secs,
        }
    }

    /// Creates a new `InvalidPhase` error.
    #[must_use]
    pub fn invalid_phase(operation: impl Into<String>, phase: impl std::fmt::Display) -> Self {
        Self::InvalidPhase {
            operation: operation.into(),
            phase: phase.to_string(),
        }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Creates a new `StateFileCorrupted` error.
    #[must_use]
    pub fn state_corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StateFileCorrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error stops the workflow and is recorded on the session.
    ///
    /// Everything else either degrades to a fallback inside the controllers or
    /// is reported to the caller without touching the session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ValidationError { .. } | Self::GenerationFailure { .. }
        )
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionBusy { .. })
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Categories of collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The service could not be reached or refused the request.
    Unavailable,
    /// Rate limit exceeded.
    RateLimit,
    /// The service did not answer in time.
    Timeout,
    /// The service answered with something that could not be interpreted.
    InvalidResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    /// What went wrong.
    pub kind: ServiceErrorKind,
    /// Detail from the collaborator.
    pub message: String,
}

impl ServiceError {
    /// Creates a new service error.
    #[must_use]
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unavailable, message)
    }

    /// Creates an `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidResponse, message)
    }
}

/// Result type returned by collaborators.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
