//! Embedding provider trait and factory.

use super::providers::{GeminiProvider, MockProvider, OllamaProvider};
use convrag_core::config::EmbeddingSettings;
use convrag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "gemini", "ollama", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Fail unless `embedding` has exactly `expected` components.
pub fn ensure_dimensions(expected: usize, embedding: &[f32]) -> AppResult<()> {
    if embedding.len() != expected {
        return Err(AppError::Embedding(format!(
            "Unexpected embedding dimensions: got {}, expected {}",
            embedding.len(),
            expected
        )));
    }
    Ok(())
}

/// Create an embedding provider from settings.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);

    match settings.provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(settings.dimensions))),

        "gemini" | "google" => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                AppError::Config(format!(
                    "Gemini embeddings require an API key (set {})",
                    settings.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY")
                ))
            })?;
            Ok(Arc::new(GeminiProvider::new(settings, key, timeout)?))
        }

        "ollama" => Ok(Arc::new(OllamaProvider::new(settings, timeout)?)),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: gemini, ollama, mock",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: provider.to_string(),
            dimensions: 64,
            ..EmbeddingSettings::default()
        }
    }

    #[test]
    fn test_create_mock_provider() {
        let provider = create_provider(&settings("mock"), None).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 64);
    }

    #[test]
    fn test_gemini_requires_key() {
        assert!(matches!(
            create_provider(&settings("gemini"), None),
            Err(AppError::Config(_))
        ));
        let provider = create_provider(&settings("gemini"), Some("key")).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-004");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&settings("word2vec"), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_ensure_dimensions() {
        assert!(ensure_dimensions(3, &[0.0, 0.0, 0.0]).is_ok());
        assert!(matches!(
            ensure_dimensions(3, &[0.0]),
            Err(AppError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&settings("mock"), None).unwrap();
        let embedding = provider.embed("Quaid-e-Azam").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
