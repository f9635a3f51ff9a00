//! Error types for generation and orchestration.

use thiserror::Error;

/// Result type for generation operations.
pub type GenResult<T> = Result<T, GenError>;

/// Errors that can occur while driving generation jobs.
#[derive(Debug, Error)]
pub enum GenError {
    /// The service rejected a create call (bad prompt, quota, network).
    #[error("generation service rejected create call: {message}")]
    Submission { message: String },

    /// The service reached a terminal `failed` state; `reason` is the
    /// service-provided text, verbatim.
    #[error("generation failed: {reason}")]
    Generation { reason: String },

    /// No terminal state within the configured deadline.
    #[error("generation did not reach a terminal state within {waited_secs}s")]
    PollTimeout { waited_secs: u64 },

    #[error("generation cancelled")]
    Cancelled,

    #[error("unexpected service response: {0}")]
    InvalidResponse(String),

    #[error("asset download failed: {message}")]
    Download { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenError {
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}
