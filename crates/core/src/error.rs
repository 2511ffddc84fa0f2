//! Error types for the policy assistant.
//!
//! A single enum covers configuration, I/O, provider, index, store and prompt
//! failures. Input problems during indexing (missing file, unreadable
//! document, empty embedding) are not errors; the pipeline reports those as
//! an outcome value instead.

use thiserror::Error;

/// Unified error type for the policy assistant.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credential, bad connection string, invalid settings.
    /// Fatal at process start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generative provider failures
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding provider failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index file errors (corrupt file, dimension mismatch)
    #[error("Vector index error: {0}")]
    Index(String),

    /// Segment metadata store errors
    #[error("Metadata store error: {0}")]
    Store(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from an upstream service call.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::Llm(_) | AppError::Embedding(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
