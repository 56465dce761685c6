//! Ollama generation provider.
//!
//! Uses the chat endpoint so the conversation keeps its turn structure.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{GenerationClient, GenerationRequest, GenerationResponse, GenerationUsage};
use crate::types::Role;
use convrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama chat response format.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama generation client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// Model identifier
    model: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client against the default local URL.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL, model)
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client with a request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
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
            client,
        })
    }

    /// Convert a request to Ollama chat format.
    fn to_ollama_request(&self, request: &GenerationRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);

        if !request.system_instruction.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: request.system_instruction.clone(),
            });
        }

        messages.extend(request.turns.iter().map(|turn| OllamaMessage {
            role: match turn.role() {
                Role::User => "user".to_string(),
                Role::Model => "assistant".to_string(),
            },
            content: turn.text().to_string(),
        }));

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options,
        }
    }

    /// Convert an Ollama response.
    fn convert_response(&self, response: OllamaChatResponse) -> AppResult<GenerationResponse> {
        if response.message.content.trim().is_empty() {
            return Err(AppError::Generation(
                "Ollama returned an empty message".to_string(),
            ));
        }

        Ok(GenerationResponse {
            content: response.message.content,
            model: response.model,
            usage: GenerationUsage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        })
    }
}

#[async_trait::async_trait]
impl GenerationClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationResponse> {
        tracing::debug!(
            "Sending chat request to Ollama ({} turns, model {})",
            request.turns.len(),
            self.model
        );

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaChatResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!("Response: {:?}", ollama_response);

        self.convert_response(ollama_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Turn;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("llama3.2");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.model_name(), "llama3.2");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/", "llama3.2");
        assert_eq!(client.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_request_maps_roles_and_system_message() {
        let client = OllamaClient::new("llama3.2");
        let request = GenerationRequest::new(
            vec![Turn::user("Q1"), Turn::model("A1"), Turn::user("Q2")],
            "Answer briefly.",
        )
        .with_temperature(0.2)
        .with_max_tokens(64);

        let ollama_req = client.to_ollama_request(&request);
        let roles: Vec<&str> = ollama_req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(ollama_req.messages[0].content, "Answer briefly.");
        assert!(!ollama_req.stream);

        let options = ollama_req.options.unwrap();
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.num_predict, Some(64));
    }

    #[test]
    fn test_empty_message_is_generation_error() {
        let client = OllamaClient::new("llama3.2");
        let response = OllamaChatResponse {
            model: "llama3.2".to_string(),
            message: OllamaMessage {
                role: "assistant".to_string(),
                content: "  ".to_string(),
            },
            prompt_eval_count: None,
            eval_count: None,
        };

        assert!(matches!(
            client.convert_response(response),
            Err(AppError::Generation(_))
        ));
    }

    /// Base URL of a local port nothing listens on.
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_error() {
        let client =
            OllamaClient::with_timeout(closed_port_url(), "llama3.2", Duration::from_secs(2))
                .unwrap();
        let request = GenerationRequest::new(vec![Turn::user("Q")], "Answer briefly.");

        match client.generate(&request).await {
            Err(AppError::Generation(msg)) => assert!(msg.contains("Failed to send request")),
            other => panic!("expected generation error, got {:?}", other),
        }
    }
}
