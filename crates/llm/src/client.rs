//! Generation client abstraction and request/response types.

use convrag_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::types::Turn;

/// Chat generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Ordered conversation, oldest turn first
    pub turns: Vec<Turn>,

    /// Instruction the model must treat as a hard constraint
    pub system_instruction: String,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a new request from a conversation and a system instruction.
    pub fn new(turns: Vec<Turn>, system_instruction: impl Into<String>) -> Self {
        Self {
            turns,
            system_instruction: system_instruction.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Generated turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    #[serde(default)]
    pub usage: GenerationUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl GenerationUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for generation providers.
///
/// Implementations receive the conversation in order and must fail with
/// `AppError::Generation` when the provider errors or returns no text.
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    /// Get the provider name (e.g., "gemini", "ollama").
    fn provider_name(&self) -> &str;

    /// Get the model identifier.
    fn model_name(&self) -> &str;

    /// Generate one turn for the given conversation.
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse>;
}
