//! Question pipeline: transform, retrieve, generate.

use super::answer::AnswerGenerator;
use super::context::ContextAssembler;
use super::error::RagError;
use super::history::ConversationHistory;
use super::transform::QueryTransformer;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index::open_index;
use crate::vector_index::VectorIndex;
use convrag_core::{AppConfig, AppResult};
use convrag_llm::{create_client, GenerationClient};
use convrag_prompt::PromptSet;
use serde::Serialize;
use std::sync::Arc;

/// Where a question is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Received,
    Transforming,
    Retrieving,
    Generating,
    Committed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Transforming => "transforming",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs stage transitions for one question.
struct StageTracker {
    current: PipelineStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: PipelineStage::Received,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        tracing::debug!(from = %self.current, to = %next, "Pipeline stage");
        self.current = next;
    }

    fn fail(&mut self, err: &RagError) {
        tracing::warn!(stage = %self.current, error = %err, "Pipeline failed");
        self.current = PipelineStage::Failed;
    }
}

/// The shared, immutable part of a RAG conversation.
///
/// One pipeline may serve many conversations; each passes its own history.
pub struct RagPipeline {
    transformer: QueryTransformer,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
}

impl RagPipeline {
    pub fn new(
        transformer: QueryTransformer,
        assembler: ContextAssembler,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            transformer,
            assembler,
            generator,
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let client = create_client(&config.generation, config.generation_api_key().as_deref())?;
        let embedder = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;
        let index = open_index(config).await?;
        let prompts = PromptSet::load(&config.prompts_dir())?;

        tracing::info!(
            generation = %format!("{}/{}", client.provider_name(), client.model_name()),
            embedding = %format!("{}/{}", embedder.provider_name(), embedder.model_name()),
            index = index.backend_name(),
            "RAG pipeline ready"
        );

        Ok(Self::with_components(client, embedder, index, prompts, config))
    }

    /// Assemble a pipeline around ready-made collaborators.
    pub fn with_components(
        client: Arc<dyn GenerationClient>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        prompts: PromptSet,
        config: &AppConfig,
    ) -> Self {
        let rag = &config.rag;
        let temperature = config.generation.temperature;

        let transformer =
            QueryTransformer::new(Arc::clone(&client), prompts.rewrite).with_temperature(temperature);
        let assembler = ContextAssembler::new(
            embedder,
            index,
            config.embedding.dimensions,
            rag.top_k,
            rag.separator.clone(),
        );
        let generator = AnswerGenerator::new(
            client,
            prompts.answer,
            rag.persona.clone(),
            rag.fallback_answer.clone(),
        )
        .with_language(rag.language.clone())
        .with_rollback_on_failure(rag.rollback_failed_answer)
        .with_temperature(temperature);

        Self::new(transformer, assembler, generator)
    }

    /// Answer one question against `history`.
    ///
    /// On success `history` gains exactly one `user` and one `model` turn.
    /// The first failing stage ends the run; nothing is retried.
    pub async fn answer(
        &self,
        history: &mut ConversationHistory,
        question: &str,
    ) -> Result<String, RagError> {
        let mut stage = StageTracker::new();
        tracing::info!(question = %question, history_len = history.len(), "Question received");

        stage.advance(PipelineStage::Transforming);
        let standalone = self
            .transformer
            .transform(history, question)
            .await
            .inspect_err(|e| stage.fail(e))?;

        stage.advance(PipelineStage::Retrieving);
        let context = self
            .assembler
            .assemble(&standalone)
            .await
            .inspect_err(|e| stage.fail(e))?;

        stage.advance(PipelineStage::Generating);
        let answer = self
            .generator
            .generate(history, &standalone, &context)
            .await
            .inspect_err(|e| stage.fail(e))?;

        stage.advance(PipelineStage::Committed);
        Ok(answer)
    }
}

/// One conversation: a shared pipeline plus the history it owns.
///
/// `answer` takes `&mut self`, so questions on one conversation never overlap.
pub struct Conversation {
    pipeline: Arc<RagPipeline>,
    history: ConversationHistory,
}

impl Conversation {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            history: ConversationHistory::new(),
        }
    }

    pub async fn answer(&mut self, question: &str) -> Result<String, RagError> {
        self.pipeline.answer(&mut self.history, question).await
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}
