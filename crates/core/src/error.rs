//! Error types shared across the convrag workspace.
//!
//! `AppError` covers configuration, I/O and every external collaborator the
//! RAG pipeline talks to (embedding, vector retrieval, text generation).
//! Pipeline stages wrap these into stage-tagged errors of their own.

use thiserror::Error;

/// Unified error type for convrag crates.
///
/// All fallible functions return `Result<T, AppError>`; nothing panics on
/// a collaborator failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding client failures, including unexpected vector dimensionality
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index query failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Generation client failures
    #[error("Generation error: {0}")]
    Generation(String),

    /// Ingestion and index management errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_errors_name_their_source() {
        assert!(AppError::Embedding("boom".into())
            .to_string()
            .starts_with("Embedding error"));
        assert!(AppError::Retrieval("boom".into())
            .to_string()
            .starts_with("Retrieval error"));
        assert!(AppError::Generation("boom".into())
            .to_string()
            .starts_with("Generation error"));
    }

    #[test]
    fn test_json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Serialization(_)));
    }
}
