//! Embedding providers.
//!
//! Every provider returns vectors of the configured dimensionality or fails
//! with `AppError::Embedding`.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, ensure_dimensions, EmbeddingProvider};
