//! Conversational retrieval-augmented generation.
//!
//! Each question runs through three stages:
//! 1. [`QueryTransformer`] rewrites it into a standalone question, using the
//!    history only transiently
//! 2. [`ContextAssembler`] embeds that question and joins the top-K passages
//! 3. [`AnswerGenerator`] answers from those passages and commits the
//!    exchange to history
//!
//! [`RagPipeline`] sequences them; [`Conversation`] pairs a shared pipeline
//! with the history of one conversation.

pub mod answer;
pub mod context;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod transform;


pub use answer::AnswerGenerator;
pub use context::{join_passages, ContextAssembler};
pub use error::RagError;
pub use history::ConversationHistory;
pub use pipeline::{Conversation, PipelineStage, RagPipeline};
pub use transform::QueryTransformer;
