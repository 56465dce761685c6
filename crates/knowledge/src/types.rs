//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata key under which ingestion stores a chunk's text.
pub const TEXT_METADATA_KEY: &str = "text";

/// Metadata key holding the originating source path.
pub const SOURCE_METADATA_KEY: &str = "source";

/// Metadata key holding the chunk's position within its source.
pub const CHUNK_METADATA_KEY: &str = "chunk";

/// Vector metadata as stored by the index.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single hit returned by a vector index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,

    /// Similarity score, higher is closer
    pub score: f32,

    #[serde(default)]
    pub metadata: Metadata,
}

impl QueryMatch {
    /// The chunk text stored under [`TEXT_METADATA_KEY`], if present.
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .get(TEXT_METADATA_KEY)
            .and_then(|value| value.as_str())
    }
}

/// Passage text and score handed to the context assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
}

/// A vector with its id and metadata, ready to upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Statistics for a vector index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Backend name ("pinecone", "sqlite")
    pub backend: String,

    /// Number of stored vectors
    pub vector_count: u64,

    /// Vector dimensionality, when the backend reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    /// Number of indexed sources, when the backend tracks them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_count: Option<u64>,

    /// On-disk size in bytes (local backends only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Options for an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Files or directories to index
    pub paths: Vec<PathBuf>,

    /// Clear the index before writing
    pub reset: bool,
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Number of sources indexed
    pub sources: u32,

    /// Number of chunks written
    pub chunks: u32,

    /// Bytes of extracted text
    pub bytes: u64,

    /// Sources skipped because they could not be read
    pub skipped: u32,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// A chunk of source text before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub source: String,
    pub position: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_match_text() {
        let mut metadata = Metadata::new();
        metadata.insert(
            TEXT_METADATA_KEY.to_string(),
            serde_json::json!("Lahore Resolution, 1940"),
        );
        let hit = QueryMatch {
            id: "a".to_string(),
            score: 0.9,
            metadata,
        };
        assert_eq!(hit.text(), Some("Lahore Resolution, 1940"));

        let bare = QueryMatch {
            id: "b".to_string(),
            score: 0.1,
            metadata: Metadata::new(),
        };
        assert_eq!(bare.text(), None);
    }

    #[test]
    fn test_non_string_text_is_absent() {
        let mut metadata = Metadata::new();
        metadata.insert(TEXT_METADATA_KEY.to_string(), serde_json::json!(42));
        let hit = QueryMatch {
            id: "c".to_string(),
            score: 0.5,
            metadata,
        };
        assert_eq!(hit.text(), None);
    }
}
