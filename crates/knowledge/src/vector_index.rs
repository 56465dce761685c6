//! Vector index abstraction.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval.

use crate::types::{IndexRecord, IndexStats, QueryMatch};
use convrag_core::AppResult;

/// Trait for vector index backends.
///
/// Queries fail with `AppError::Retrieval`; writes and maintenance fail
/// with `AppError::Knowledge`.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name (e.g., "pinecone", "sqlite").
    fn backend_name(&self) -> &str;

    /// Return the `top_k` nearest records, ordered by descending score.
    ///
    /// Metadata is only populated when `include_metadata` is set.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> AppResult<Vec<QueryMatch>>;

    /// Insert or replace records by id.
    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()>;

    /// Remove every record whose metadata `source` equals `source`.
    async fn delete_source(&self, source: &str) -> AppResult<()>;

    /// Get statistics about the index.
    async fn stats(&self) -> AppResult<IndexStats>;

    /// Remove every record.
    async fn reset(&self) -> AppResult<()>;
}
