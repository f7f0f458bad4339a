//! Error types for the fauna pipeline.

use thiserror::Error;

/// Result type alias using fauna's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fauna operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Asset not found
    #[error("Asset not found: {0}")]
    AssetNotFound(uuid::Uuid),

    /// Owning user does not exist
    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Inference service call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// An external call exceeded its deadline
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Validation failures and missing owners are permanent; everything that
    /// crossed a network or storage boundary is considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Inference(_)
                | Error::Request(_)
                | Error::Timeout(_)
                | Error::Io(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
