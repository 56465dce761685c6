//! Evidence context assembly from vector search.

use super::error::RagError;
use crate::embeddings::EmbeddingProvider;
use crate::types::RetrievedPassage;
use crate::vector_index::VectorIndex;
use convrag_core::AppError;
use std::sync::Arc;

/// Embeds a question, searches the index, and joins the hits.
///
/// Holds no conversation state.
pub struct ContextAssembler {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    dimensions: usize,
    top_k: usize,
    separator: String,
}

impl ContextAssembler {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        dimensions: usize,
        top_k: usize,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            dimensions,
            top_k,
            separator: separator.into(),
        }
    }

    /// Passages for `question`, in the order the index ranked them.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedPassage>, RagError> {
        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(RagError::Embedding)?;

        if vector.len() != self.dimensions {
            return Err(RagError::Embedding(AppError::Embedding(format!(
                "Question embedding has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            ))));
        }

        let matches = self
            .index
            .query(&vector, self.top_k, true)
            .await
            .map_err(RagError::Retrieval)?;

        let mut passages = Vec::with_capacity(matches.len());
        for hit in matches {
            tracing::debug!(id = %hit.id, score = hit.score, "Match");
            let text = hit.text().ok_or_else(|| {
                RagError::Retrieval(AppError::Retrieval(format!(
                    "Match {} has no text metadata",
                    hit.id
                )))
            })?;
            passages.push(RetrievedPassage {
                text: text.to_string(),
                score: hit.score,
            });
        }

        tracing::info!(matches = passages.len(), top_k = self.top_k, "Retrieved passages");
        Ok(passages)
    }

    /// Evidence context for `question`; empty when nothing matched.
    pub async fn assemble(&self, question: &str) -> Result<String, RagError> {
        let passages = self.retrieve(question).await?;
        let context = join_passages(&passages, &self.separator);
        tracing::info!(context_len = context.len(), "Assembled evidence context");
        Ok(context)
    }
}

/// Join passage texts with `separator`, preserving order.
pub fn join_passages(passages: &[RetrievedPassage], separator: &str) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
