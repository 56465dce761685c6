//! Gemini embedding provider (`embedContent` / `batchEmbedContents`).

use crate::embeddings::provider::{ensure_dimensions, EmbeddingProvider};
use convrag_core::config::EmbeddingSettings;
use convrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// The batch endpoint accepts at most this many requests per call.
const MAX_BATCH: usize = 100;

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    /// `models/<model>` as the API expects in request bodies
    qualified_model: String,
    dimensions: usize,
    batch_size: usize,
}

impl GeminiProvider {
    pub fn new(settings: &EmbeddingSettings, api_key: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Embedding(format!("Failed to create HTTP client for Gemini: {}", e))
        })?;

        let model = settings.model.trim_start_matches("models/").to_string();

        Ok(Self {
            client,
            base_url: settings
                .endpoint
                .as_deref()
                .unwrap_or(DEFAULT_GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            qualified_model: format!("models/{}", model),
            model,
            dimensions: settings.dimensions,
            batch_size: settings.batch_size.clamp(1, MAX_BATCH),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.qualified_model,
            content: Content {
                parts: [Part { text }],
            },
        }
    }

    async fn call<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> AppResult<R> {
        let response = self
            .client
            .post(self.url(method))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Gemini: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let response: EmbedContentResponse = self.call("embedContent", &self.request(text)).await?;
        ensure_dimensions(self.dimensions, &response.embedding.values)?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = BatchEmbedRequest {
                requests: batch.iter().map(|text| self.request(text)).collect(),
            };
            let response: BatchEmbedResponse = self.call("batchEmbedContents", &body).await?;

            if response.embeddings.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Gemini returned {} embeddings for {} texts",
                    response.embeddings.len(),
                    batch.len()
                )));
            }

            for embedding in response.embeddings {
                ensure_dimensions(self.dimensions, &embedding.values)?;
                embeddings.push(embedding.values);
            }
        }

        tracing::debug!("Gemini embedded {} texts", embeddings.len());
        Ok(embeddings)
    }
}
