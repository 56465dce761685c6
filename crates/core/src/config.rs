//! Configuration management.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - `.env` file (loaded into the process environment)
//! - Config file (`.convrag/config.yaml` in the workspace)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: the local index, prompt overrides
//! and the config file live under `.convrag/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Join separator between retrieved passages.
pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

/// Sentence the answer model must use when the context has no answer.
pub const DEFAULT_FALLBACK_ANSWER: &str = "I could not find the answer in the provided document.";

const KNOWN_GENERATION_PROVIDERS: [&str; 2] = ["gemini", "ollama"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["gemini", "ollama", "mock"];
const KNOWN_INDEX_BACKENDS: [&str; 2] = ["pinecone", "sqlite"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .convrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Generation client settings
    pub generation: GenerationSettings,

    /// Embedding client settings
    pub embedding: EmbeddingSettings,

    /// Vector index settings
    pub index: IndexSettings,

    /// Pipeline settings
    pub rag: RagSettings,

    /// Ingestion settings
    pub ingest: IngestSettings,

    /// HTTP transport settings
    pub server: ServerSettings,

    /// `OLLAMA_URL`, used by Ollama-backed clients without an explicit endpoint
    #[serde(skip)]
    pub ollama_url: Option<String>,
}

/// Generation client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Provider name ("gemini", "ollama")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Custom API endpoint
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            endpoint: None,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
            timeout_secs: 60,
            temperature: None,
        }
    }
}

/// Embedding client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name ("gemini", "ollama", "mock")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Vector dimensionality, fixed at setup
    pub dimensions: usize,

    /// Custom API endpoint
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Maximum texts per embedding request during ingestion
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            endpoint: None,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
            batch_size: 100,
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexSettings {
    /// Backend name ("pinecone", "sqlite")
    pub backend: String,

    /// Pinecone index name
    pub name: Option<String>,

    /// Pinecone data-plane host; resolved from `name` when absent
    pub host: Option<String>,

    /// Pinecone namespace
    pub namespace: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,

    /// SQLite database path (defaults to `.convrag/index.sqlite`)
    pub path: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "pinecone".to_string(),
            name: None,
            host: None,
            namespace: None,
            api_key_env: Some("PINECONE_API_KEY".to_string()),
            path: None,
        }
    }
}

/// Query pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RagSettings {
    /// Number of passages retrieved per question
    pub top_k: usize,

    /// Separator placed between retrieved passages
    pub separator: String,

    /// Persona the answer model adopts
    pub persona: String,

    /// Output language constraint, if any
    pub language: Option<String>,

    /// Sentence the model must answer with when the context lacks the answer
    pub fallback_answer: String,

    /// Remove the question turn from history when answer generation fails
    pub rollback_failed_answer: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            separator: DEFAULT_SEPARATOR.to_string(),
            persona: "a Pakistan History Expert".to_string(),
            language: Some("proper Roman Urdu".to_string()),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
            rollback_failed_answer: true,
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestSettings {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Embedding/upsert batches in flight at once
    pub max_concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_concurrency: 5,
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    generation: Option<GenerationSettings>,
    embedding: Option<EmbeddingSettings>,
    index: Option<IndexSettings>,
    rag: Option<RagSettings>,
    ingest: Option<IngestSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            generation: GenerationSettings::default(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            rag: RagSettings::default(),
            ingest: IngestSettings::default(),
            server: ServerSettings::default(),
            ollama_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the config file and environment variables.
    ///
    /// Environment variables:
    /// - `CONVRAG_WORKSPACE`: Override workspace path
    /// - `CONVRAG_CONFIG`: Path to config file
    /// - `CONVRAG_PROVIDER` / `CONVRAG_MODEL`: Generation provider and model
    /// - `PINECONE_INDEX_NAME` / `PINECONE_INDEX_HOST`: Pinecone index
    /// - `OLLAMA_URL`: Endpoint for Ollama-backed clients
    /// - `PORT`: HTTP listen port
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// API keys (`GEMINI_API_KEY`, `PINECONE_API_KEY`) are resolved lazily
    /// through the `apiKeyEnv` settings.
    ///
    /// # Example
    /// ```no_run
    /// use convrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, with explicit workspace and config file taking
    /// precedence over their environment variables.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        load_dotenv();

        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| env_path("CONVRAG_WORKSPACE")) {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_path("CONVRAG_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".convrag/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        config.apply_env()?;

        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(provider) = std::env::var("CONVRAG_PROVIDER") {
            self.generation.provider = provider;
        }

        if let Ok(model) = std::env::var("CONVRAG_MODEL") {
            self.generation.model = model;
        }

        if let Ok(name) = std::env::var("PINECONE_INDEX_NAME") {
            self.index.name = Some(name);
        }

        if let Ok(host) = std::env::var("PINECONE_INDEX_HOST") {
            self.index.host = Some(host);
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.ollama_url = Some(url);
        }
        self.apply_ollama_url();

        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid PORT '{}': {}", port, e)))?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Merging config file {:?}", path);

        Ok(self.merge(config_file))
    }

    fn merge(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(generation) = file.generation {
            result.generation = generation;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(index) = file.index {
            result.index = index;
        }
        if let Some(rag) = file.rag {
            result.rag = rag;
        }
        if let Some(ingest) = file.ingest {
            result.ingest = ingest;
        }
        if let Some(server) = file.server {
            result.server = server;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.generation.provider = provider;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        // The provider may only now have become "ollama"
        self.apply_ollama_url();

        self
    }

    /// Point Ollama-backed clients without an explicit endpoint at `ollama_url`.
    fn apply_ollama_url(&mut self) {
        let Some(url) = self.ollama_url.as_deref() else {
            return;
        };

        if self.generation.provider == "ollama" && self.generation.endpoint.is_none() {
            self.generation.endpoint = Some(url.to_string());
        }
        if self.embedding.provider == "ollama" && self.embedding.endpoint.is_none() {
            self.embedding.endpoint = Some(url.to_string());
        }
    }

    /// Get the path to the .convrag directory.
    pub fn convrag_dir(&self) -> PathBuf {
        self.workspace.join(".convrag")
    }

    /// Ensure the .convrag directory exists.
    pub fn ensure_convrag_dir(&self) -> AppResult<()> {
        let dir = self.convrag_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .convrag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.convrag_dir().join("prompts")
    }

    /// Location of the local SQLite index.
    pub fn sqlite_index_path(&self) -> PathBuf {
        match self.index.path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.convrag_dir().join("index.sqlite"),
        }
    }

    /// API key for the generation provider.
    pub fn generation_api_key(&self) -> Option<String> {
        resolve_api_key(self.generation.api_key_env.as_deref())
    }

    /// API key for the embedding provider.
    pub fn embedding_api_key(&self) -> Option<String> {
        resolve_api_key(self.embedding.api_key_env.as_deref())
    }

    /// API key for the vector index.
    pub fn index_api_key(&self) -> Option<String> {
        resolve_api_key(self.index.api_key_env.as_deref())
    }

    /// Validate configuration for the active providers.
    pub fn validate(&self) -> AppResult<()> {
        check_known(
            "generation provider",
            &self.generation.provider,
            &KNOWN_GENERATION_PROVIDERS,
        )?;
        check_known(
            "embedding provider",
            &self.embedding.provider,
            &KNOWN_EMBEDDING_PROVIDERS,
        )?;
        check_known("index backend", &self.index.backend, &KNOWN_INDEX_BACKENDS)?;

        if self.generation.provider == "gemini" && self.generation_api_key().is_none() {
            return Err(missing_key("generation", &self.generation.api_key_env));
        }

        if self.embedding.provider == "gemini" && self.embedding_api_key().is_none() {
            return Err(missing_key("embedding", &self.embedding.api_key_env));
        }

        if self.index.backend == "pinecone" {
            if self.index_api_key().is_none() {
                return Err(missing_key("index", &self.index.api_key_env));
            }
            if self.index.name.is_none() && self.index.host.is_none() {
                return Err(AppError::Config(
                    "Pinecone index requires PINECONE_INDEX_NAME or an index host".to_string(),
                ));
            }
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.rag.top_k == 0 {
            return Err(AppError::Config("rag.topK must be greater than zero".to_string()));
        }

        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }

        if self.ingest.max_concurrency == 0 || self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "ingest.maxConcurrency and embedding.batchSize must be greater than zero"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolve an API key from the named environment variable.
pub fn resolve_api_key(env_var: Option<&str>) -> Option<String> {
    env_var
        .and_then(|name| std::env::var(name).ok())
        .filter(|key| !key.trim().is_empty())
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn check_known(kind: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            kind,
            value,
            known.join(", ")
        )))
    }
}

fn missing_key(component: &str, env_var: &Option<String>) -> AppError {
    match env_var {
        Some(name) => AppError::Config(format!(
            "API key for the {} provider not found in environment variable: {}",
            component, name
        )),
        None => AppError::Config(format!(
            "No API key environment variable configured for the {} provider",
            component
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.generation.provider = "ollama".to_string();
        config.embedding.provider = "mock".to_string();
        config.embedding.api_key_env = None;
        config.index.backend = "sqlite".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.rag.top_k, 10);
        assert_eq!(config.rag.separator, "\n\n---\n\n");
        assert_eq!(config.ingest.chunk_size, 1000);
        assert_eq!(config.ingest.chunk_overlap, 200);
        assert!(config.rag.rollback_failed_answer);
        assert!(!config.verbose);
    }

    #[test]
    fn test_convrag_paths() {
        let config = AppConfig::default();
        assert!(config.convrag_dir().ends_with(".convrag"));
        assert!(config.sqlite_index_path().ends_with(".convrag/index.sqlite"));
        assert!(config.prompts_dir().ends_with(".convrag/prompts"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some("ollama".to_string()),
            Some("llama3.2".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.generation.provider, "ollama");
        assert_eq!(overridden.generation.model, "llama3.2");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_ollama_url_follows_provider_flag() {
        let mut config = AppConfig::default();
        config.ollama_url = Some("http://gpu:11434".to_string());
        config.apply_ollama_url();
        assert_eq!(config.generation.endpoint, None);

        let overridden = config.with_overrides(Some("ollama".to_string()), None, None, false, false);
        assert_eq!(
            overridden.generation.endpoint.as_deref(),
            Some("http://gpu:11434")
        );
        assert_eq!(overridden.embedding.endpoint, None);
    }

    #[test]
    fn test_explicit_endpoint_beats_ollama_url() {
        let mut config = AppConfig::default();
        config.generation.endpoint = Some("http://configured:11434".to_string());
        config.ollama_url = Some("http://gpu:11434".to_string());

        let overridden = config.with_overrides(Some("ollama".to_string()), None, None, false, false);
        assert_eq!(
            overridden.generation.endpoint.as_deref(),
            Some("http://configured:11434")
        );
    }

    #[test]
    fn test_merge_partial_yaml_sections_keep_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
rag:
  topK: 4
  persona: "a careful archivist"
  language: null
index:
  backend: sqlite
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.rag.top_k, 4);
        assert_eq!(merged.rag.persona, "a careful archivist");
        assert_eq!(merged.rag.language, None);
        assert_eq!(merged.rag.separator, DEFAULT_SEPARATOR);
        assert_eq!(merged.index.backend, "sqlite");
        assert_eq!(merged.index.api_key_env, Some("PINECONE_API_KEY".to_string()));
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "rag: [not, a, map]").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = offline_config();
        config.generation.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_offline_stack() {
        assert!(offline_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let mut config = offline_config();
        config.ingest.chunk_overlap = config.ingest.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = offline_config();
        config.rag.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_pinecone_requires_index_name() {
        let mut config = offline_config();
        config.index.backend = "pinecone".to_string();
        config.index.api_key_env = Some("CONVRAG_TEST_UNSET_PINECONE_KEY".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_api_key_unset() {
        assert_eq!(resolve_api_key(Some("CONVRAG_TEST_DEFINITELY_UNSET")), None);
        assert_eq!(resolve_api_key(None), None);
    }
}
