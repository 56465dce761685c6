//! Grounded answer generation.

use super::error::RagError;
use super::history::{ConversationHistory, PendingExchange};
use convrag_llm::{GenerationClient, GenerationRequest};
use convrag_prompt::{build_answer_instruction, AnswerVariables, PromptDefinition};
use std::sync::Arc;

/// Answers a standalone question from the evidence context and records the
/// exchange in history.
pub struct AnswerGenerator {
    client: Arc<dyn GenerationClient>,
    prompt: PromptDefinition,
    persona: String,
    language: Option<String>,
    fallback: String,
    rollback_on_failure: bool,
    temperature: Option<f32>,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        prompt: PromptDefinition,
        persona: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            client,
            prompt,
            persona: persona.into(),
            language: None,
            fallback: fallback.into(),
            rollback_on_failure: true,
            temperature: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Whether a failed call removes the question turn again.
    pub fn with_rollback_on_failure(mut self, rollback: bool) -> Self {
        self.rollback_on_failure = rollback;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// System instruction embedding `context` verbatim.
    pub fn instruction(&self, context: &str) -> Result<String, RagError> {
        build_answer_instruction(
            &self.prompt,
            &AnswerVariables {
                persona: &self.persona,
                language: self.language.as_deref(),
                fallback: &self.fallback,
                context,
            },
        )
        .map_err(RagError::AnswerGeneration)
    }

    /// Generate the answer and commit the `user`/`model` pair.
    pub async fn generate(
        &self,
        history: &mut ConversationHistory,
        question: &str,
        context: &str,
    ) -> Result<String, RagError> {
        let instruction = self.instruction(context)?;

        let pending = PendingExchange::begin(history, question, self.rollback_on_failure);
        let mut request = GenerationRequest::new(pending.history().snapshot(), instruction);
        if let Some(t) = self.temperature {
            request = request.with_temperature(t);
        }

        let response = self
            .client
            .generate(&request)
            .await
            .map_err(RagError::AnswerGeneration)?;

        pending.commit(&response.content);

        tracing::info!(
            answer_len = response.content.len(),
            model = %response.model,
            "Answer committed"
        );
        Ok(response.content)
    }
}
