//! Gemini generation provider (Google Generative Language API).

use crate::client::{GenerationClient, GenerationRequest, GenerationResponse, GenerationUsage};
use crate::types::Role;
use convrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini generation client.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client for the given model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> AppResult<Self> {
        Self::with_options(DEFAULT_GEMINI_URL, api_key, model, Duration::from_secs(60))
    }

    /// Create a client with a custom endpoint and request timeout.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn to_gemini_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let contents = request
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role() {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: turn.text().to_string(),
                }],
            })
            .collect();

        let system_instruction = if request.system_instruction.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part {
                    text: request.system_instruction.clone(),
                }],
            })
        };

        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }

    fn convert_response(&self, response: GenerateContentResponse) -> AppResult<GenerationResponse> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Generation("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Generation(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = response
            .usage_metadata
            .map(|u| GenerationUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(GenerationResponse {
            content: text,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl GenerationClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse> {
        tracing::debug!(
            "Sending generateContent request to Gemini ({} turns, model {})",
            request.turns.len(),
            self.model
        );

        let body = self.to_gemini_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to send request to Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Failed to parse Gemini response: {}", e))
        })?;

        let converted = self.convert_response(gemini_response)?;

        tracing::debug!(
            "Gemini usage - prompt: {}, completion: {}",
            converted.usage.prompt_tokens,
            converted.usage.completion_tokens
        );

        Ok(converted)
    }
}
