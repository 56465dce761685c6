//! Pipeline error type.

use super::pipeline::PipelineStage;
use convrag_core::AppError;
use thiserror::Error;

/// Failure of one question, tagged with the stage that produced it.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Query transformation failed: {0}")]
    QueryTransformation(#[source] AppError),

    #[error("Question embedding failed: {0}")]
    Embedding(#[source] AppError),

    #[error("Passage retrieval failed: {0}")]
    Retrieval(#[source] AppError),

    #[error("Answer generation failed: {0}")]
    AnswerGeneration(#[source] AppError),

    /// Rollback was attempted on an empty history. Indicates a logic bug.
    #[error("Conversation history is empty")]
    EmptyHistory,
}

impl RagError {
    /// The pipeline stage that failed, if the error came from one.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            Self::QueryTransformation(_) => Some(PipelineStage::Transforming),
            Self::Embedding(_) | Self::Retrieval(_) => Some(PipelineStage::Retrieving),
            Self::AnswerGeneration(_) => Some(PipelineStage::Generating),
            Self::EmptyHistory => None,
        }
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        AppError::Other(err.to_string())
    }
}
