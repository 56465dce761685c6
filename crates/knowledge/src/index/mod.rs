//! Vector index backends.

pub mod pinecone;
pub mod sqlite;

pub use pinecone::PineconeIndex;
pub use sqlite::SqliteIndex;

use crate::vector_index::VectorIndex;
use convrag_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Open the vector index selected by `config.index.backend`.
pub async fn open_index(config: &AppConfig) -> AppResult<Arc<dyn VectorIndex>> {
    let settings = &config.index;

    match settings.backend.to_lowercase().as_str() {
        "sqlite" => {
            let index = SqliteIndex::open(&config.sqlite_index_path())?;
            Ok(Arc::new(index))
        }
        "pinecone" => {
            let api_key = config.index_api_key().ok_or_else(|| {
                AppError::Config(format!(
                    "Pinecone index requires an API key (set {})",
                    settings.api_key_env.as_deref().unwrap_or("PINECONE_API_KEY")
                ))
            })?;

            let index = match (&settings.host, &settings.name) {
                (Some(host), _) => PineconeIndex::new(host, api_key, settings.namespace.clone())?,
                (None, Some(name)) => {
                    PineconeIndex::connect(
                        name,
                        api_key,
                        settings.namespace.clone(),
                        pinecone::CONTROL_PLANE_URL,
                    )
                    .await?
                }
                (None, None) => {
                    return Err(AppError::Config(
                        "Pinecone index requires PINECONE_INDEX_NAME or an index host".to_string(),
                    ))
                }
            };

            Ok(Arc::new(index))
        }
        other => Err(AppError::Config(format!(
            "Unknown index backend: '{}'. Supported backends: pinecone, sqlite",
            other
        ))),
    }
}
