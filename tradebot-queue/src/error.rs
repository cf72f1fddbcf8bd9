use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations.
///
/// "No job available" and "retry budget exhausted" are not errors; they
/// surface as `Ok(None)` from `dequeue` and `FailOutcome::DeadLettered`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Queue misconfigured: {0}")]
    Configuration(String),

    #[error("Backend {operation} failed on '{key}': {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Serialization error during {operation}: {message}")]
    Serialization {
        operation: &'static str,
        message: String,
    },

    #[error("Dead-letter entry not found at index {0}")]
    DeadLetterNotFound(usize),

    #[error("Handler already registered for job type: {0}")]
    HandlerAlreadyRegistered(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Wrap a store failure with the command and key it was issued against
    pub fn backend(operation: &'static str, key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Wrap an encode/decode failure with the operation it happened in
    pub fn serialization(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            operation,
            message: err.to_string(),
        }
    }

    /// Check whether this error came from the backing store
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Job execution outcome reported by handlers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// Handler ran and failed
    #[error("{0}")]
    Failed(String),

    /// No handler is registered for the job type
    #[error("No handler registered for job type: {0}")]
    NoHandler(String),
}

impl JobError {
    /// Create a handler failure
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        match self {
            Self::Failed(msg) | Self::NoHandler(msg) => msg,
        }
    }
}
