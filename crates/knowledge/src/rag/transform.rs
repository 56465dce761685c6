//! Follow-up question rewriting.

use super::error::RagError;
use super::history::{ConversationHistory, TransientTurn};
use convrag_core::AppError;
use convrag_llm::{GenerationClient, GenerationRequest, Turn};
use convrag_prompt::{build_rewrite_instruction, PromptDefinition};
use std::sync::Arc;

/// Rewrites the latest question into one that stands on its own.
pub struct QueryTransformer {
    client: Arc<dyn GenerationClient>,
    prompt: PromptDefinition,
    temperature: Option<f32>,
}

impl QueryTransformer {
    pub fn new(client: Arc<dyn GenerationClient>, prompt: PromptDefinition) -> Self {
        Self {
            client,
            prompt,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Produce the standalone form of `question`.
    ///
    /// The question is visible to the model as the trailing user turn and is
    /// removed again before returning, so `history` has the same length
    /// afterwards on every path.
    pub async fn transform(
        &self,
        history: &mut ConversationHistory,
        question: &str,
    ) -> Result<String, RagError> {
        let instruction =
            build_rewrite_instruction(&self.prompt).map_err(RagError::QueryTransformation)?;

        let response = {
            let guard = TransientTurn::push(history, Turn::user(question));
            let mut request = GenerationRequest::new(guard.history().snapshot(), instruction);
            if let Some(t) = self.temperature {
                request = request.with_temperature(t);
            }
            self.client.generate(&request).await
        }
        .map_err(RagError::QueryTransformation)?;

        let standalone = response.content.trim();
        if standalone.is_empty() {
            return Err(RagError::QueryTransformation(AppError::Generation(
                "Model returned an empty standalone question".to_string(),
            )));
        }

        tracing::info!(standalone = %standalone, "Rewrote question");
        Ok(standalone.to_string())
    }
}
