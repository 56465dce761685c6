//! Knowledge layer for conversational retrieval-augmented generation.
//!
//! - [`ingest`] turns documents into embedded chunks in a [`VectorIndex`]
//! - [`rag`] answers questions against that index, one conversation at a time
//!
//! Index backends live in [`index`]; embedding providers in [`embeddings`].

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod parser;
pub mod rag;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::open_index;
pub use ingest::Ingestor;
pub use rag::{Conversation, ConversationHistory, PipelineStage, RagError, RagPipeline};
pub use types::{IndexStats, IngestOptions, IngestStats, QueryMatch, RetrievedPassage};
pub use vector_index::VectorIndex;
