//! Generation client factory.
//!
//! Resolves the configured provider into a concrete client. API keys are
//! passed in already resolved so the factory never reads the environment.

use crate::client::GenerationClient;
use crate::providers::{gemini::DEFAULT_GEMINI_URL, ollama::DEFAULT_OLLAMA_URL};
use crate::providers::{GeminiClient, OllamaClient};
use crate::types::ProviderType;
use convrag_core::config::GenerationSettings;
use convrag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create a generation client from settings.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or if Gemini is
/// selected without an API key.
pub fn create_client(
    settings: &GenerationSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn GenerationClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown generation provider: {}", settings.provider))
    })?;
    let timeout = Duration::from_secs(settings.timeout_secs);

    tracing::debug!(
        provider = provider.as_str(),
        model = %settings.model,
        "Creating generation client"
    );

    match provider {
        ProviderType::Gemini => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                AppError::Config(format!(
                    "Gemini provider requires an API key (set {})",
                    settings.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY")
                ))
            })?;
            let endpoint = settings.endpoint.as_deref().unwrap_or(DEFAULT_GEMINI_URL);
            let client = GeminiClient::with_options(endpoint, key, &settings.model, timeout)?;
            Ok(Arc::new(client))
        }
        ProviderType::Ollama => {
            let endpoint = settings.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            let client = OllamaClient::with_timeout(endpoint, &settings.model, timeout)?;
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> GenerationSettings {
        GenerationSettings {
            provider: provider.to_string(),
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn test_create_gemini_client() {
        let client = create_client(&settings("gemini"), Some("key")).unwrap();
        assert_eq!(client.provider_name(), "gemini");
        assert_eq!(client.model_name(), "gemini-2.0-flash");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        match create_client(&settings("gemini"), None) {
            Err(AppError::Config(msg)) => assert!(msg.contains("GEMINI_API_KEY")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected error for Gemini without API key"),
        }
        assert!(create_client(&settings("gemini"), Some("  ")).is_err());
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let mut s = settings("ollama");
        s.model = "llama3.2".to_string();
        s.endpoint = Some("http://localhost:8080".to_string());

        let client = create_client(&s, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.model_name(), "llama3.2");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client(&settings("openai"), Some("key")) {
            Err(AppError::Config(msg)) => assert!(msg.contains("Unknown generation provider")),
            _ => panic!("expected config error for unknown provider"),
        }
    }
}
