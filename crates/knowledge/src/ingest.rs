//! Corpus ingestion: parse, chunk, embed and upsert.

use crate::chunker::chunk_text;
use crate::embeddings::{ensure_dimensions, EmbeddingProvider};
use crate::parser::{self, ContentType};
use crate::types::{
    ChunkCandidate, IndexRecord, IngestOptions, IngestStats, Metadata, CHUNK_METADATA_KEY,
    SOURCE_METADATA_KEY, TEXT_METADATA_KEY,
};
use crate::vector_index::VectorIndex;
use convrag_core::config::IngestSettings;
use convrag_core::{AppError, AppResult};
use futures::{StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

/// Deterministic id for a chunk of `source` at `position`.
pub fn chunk_id(source: &str, position: u32) -> String {
    format!("{:x}", Sha256::digest(format!("{}#{}", source, position).as_bytes()))
}

/// Writes documents into a vector index.
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    settings: IngestSettings,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        settings: IngestSettings,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            settings,
            batch_size: batch_size.max(1),
        }
    }

    /// Index every readable file under `options.paths`.
    pub async fn run(&self, options: &IngestOptions) -> AppResult<IngestStats> {
        let start = Instant::now();
        let mut stats = IngestStats::default();

        if options.reset {
            tracing::info!("Resetting {} index", self.index.backend_name());
            self.index.reset().await?;
        }

        let files = collect_files(&options.paths)?;
        tracing::info!("Found {} candidate files", files.len());

        let mut candidates = Vec::new();
        for file in &files {
            match self.load(file) {
                Ok((bytes, chunks)) => {
                    // A shorter revision must not leave earlier trailing chunks behind
                    if !options.reset {
                        self.index.delete_source(&file.to_string_lossy()).await?;
                    }
                    stats.sources += 1;
                    stats.bytes += bytes;
                    candidates.extend(chunks);
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", file, e);
                    stats.skipped += 1;
                }
            }
        }

        let batches: Vec<Vec<ChunkCandidate>> = candidates
            .chunks(self.batch_size)
            .map(|batch| batch.to_vec())
            .collect();
        let total_batches = batches.len();

        tracing::info!(
            "Embedding {} chunks in {} batches ({} in flight)",
            candidates.len(),
            total_batches,
            self.settings.max_concurrency
        );

        stats.chunks = futures::stream::iter(batches)
            .map(|batch| self.write_batch(batch))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .try_fold(0u32, |written, count| async move {
                tracing::debug!("Upserted batch of {} chunks", count);
                Ok(written + count)
            })
            .await?;

        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Ingestion completed: {} sources, {} chunks, {} bytes, {} skipped in {:.2}s",
            stats.sources,
            stats.chunks,
            stats.bytes,
            stats.skipped,
            stats.duration_secs
        );

        Ok(stats)
    }

    fn load(&self, path: &Path) -> AppResult<(u64, Vec<ChunkCandidate>)> {
        let text = parser::parse_file(path)?;
        let source = path.to_string_lossy().to_string();
        let chunks = chunk_text(
            &source,
            &text,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;

        tracing::debug!(
            "Parsed {:?} ({}): {} chunks",
            path,
            ContentType::from_path(path).as_str(),
            chunks.len()
        );

        Ok((text.len() as u64, chunks))
    }

    async fn write_batch(&self, batch: Vec<ChunkCandidate>) -> AppResult<u32> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                batch.len()
            )));
        }

        let mut records = Vec::with_capacity(batch.len());
        for (candidate, values) in batch.into_iter().zip(embeddings) {
            ensure_dimensions(self.embedder.dimensions(), &values)?;

            let mut metadata = Metadata::new();
            metadata.insert(
                SOURCE_METADATA_KEY.to_string(),
                serde_json::json!(candidate.source),
            );
            metadata.insert(
                CHUNK_METADATA_KEY.to_string(),
                serde_json::json!(candidate.position),
            );

            let id = chunk_id(&candidate.source, candidate.position);
            metadata.insert(
                TEXT_METADATA_KEY.to_string(),
                serde_json::Value::String(candidate.text),
            );

            records.push(IndexRecord {
                id,
                values,
                metadata,
            });
        }

        self.index.upsert(&records).await?;
        Ok(records.len() as u32)
    }
}

/// Expand directories recursively; files are returned in a stable order.
fn collect_files(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            return Err(AppError::Knowledge(format!(
                "Path does not exist: {:?}",
                path
            )));
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::MockProvider;
    use crate::index::SqliteIndex;
    use tempfile::TempDir;

    fn settings() -> IngestSettings {
        IngestSettings {
            chunk_size: 120,
            chunk_overlap: 20,
            max_concurrency: 2,
        }
    }

    fn setup(dir: &TempDir) -> (Arc<SqliteIndex>, Ingestor) {
        let index = Arc::new(SqliteIndex::open(&dir.path().join("index.sqlite")).unwrap());
        let ingestor = Ingestor::new(Arc::new(MockProvider::new(64)), index.clone(), settings(), 3);
        (index, ingestor)
    }

    fn write_corpus(dir: &Path) -> PathBuf {
        let docs = dir.join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("founding.txt"),
            "Pakistan was founded on 14 August 1947. ".repeat(12),
        )
        .unwrap();
        std::fs::write(
            docs.join("iqbal.md"),
            "# Iqbal\n\nAllama Iqbal proposed a separate homeland in 1930.",
        )
        .unwrap();
        std::fs::write(docs.join("blob.bin"), "\0\0\0").unwrap();
        docs
    }

    #[test]
    fn test_chunk_id_is_stable() {
        assert_eq!(chunk_id("a.pdf", 3), chunk_id("a.pdf", 3));
        assert_ne!(chunk_id("a.pdf", 3), chunk_id("a.pdf", 4));
        assert_eq!(chunk_id("a.pdf", 0).len(), 64);
    }

    #[tokio::test]
    async fn test_ingest_directory() {
        let dir = TempDir::new().unwrap();
        let docs = write_corpus(dir.path());
        let (index, ingestor) = setup(&dir);

        let stats = ingestor
            .run(&IngestOptions {
                paths: vec![docs],
                reset: false,
            })
            .await
            .unwrap();

        assert_eq!(stats.sources, 2);
        assert_eq!(stats.skipped, 1);
        assert!(stats.chunks > 2);

        let index_stats = index.stats().await.unwrap();
        assert_eq!(index_stats.vector_count, stats.chunks as u64);
        assert_eq!(index_stats.source_count, Some(2));

        let query = MockProvider::new(64).embed("Allama Iqbal homeland").await.unwrap();
        let hits = index.query(&query, 1, true).await.unwrap();
        assert!(hits[0].text().unwrap().contains("Iqbal"));
        assert_eq!(hits[0].metadata[CHUNK_METADATA_KEY], 0);
    }

    #[tokio::test]
    async fn test_reingest_replaces_and_reset_clears() {
        let dir = TempDir::new().unwrap();
        let docs = write_corpus(dir.path());
        let (index, ingestor) = setup(&dir);
        let options = IngestOptions {
            paths: vec![docs.clone()],
            reset: false,
        };

        let first = ingestor.run(&options).await.unwrap();
        ingestor.run(&options).await.unwrap();
        assert_eq!(
            index.stats().await.unwrap().vector_count,
            first.chunks as u64
        );

        std::fs::remove_file(docs.join("founding.txt")).unwrap();
        let after_reset = ingestor
            .run(&IngestOptions {
                paths: vec![docs],
                reset: true,
            })
            .await
            .unwrap();
        assert_eq!(
            index.stats().await.unwrap().vector_count,
            after_reset.chunks as u64
        );
    }

    #[tokio::test]
    async fn test_reingest_shorter_source_drops_stale_chunks() {
        let dir = TempDir::new().unwrap();
        let docs = write_corpus(dir.path());
        let (index, ingestor) = setup(&dir);
        let options = IngestOptions {
            paths: vec![docs.clone()],
            reset: false,
        };

        let first = ingestor.run(&options).await.unwrap();
        std::fs::write(docs.join("founding.txt"), "Pakistan was founded in 1947.").unwrap();
        let second = ingestor.run(&options).await.unwrap();

        assert!(second.chunks < first.chunks);
        let index_stats = index.stats().await.unwrap();
        assert_eq!(index_stats.vector_count, second.chunks as u64);
        assert_eq!(index_stats.source_count, Some(2));
    }

    #[tokio::test]
    async fn test_missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let (_index, ingestor) = setup(&dir);
        let result = ingestor
            .run(&IngestOptions {
                paths: vec![dir.path().join("absent")],
                reset: false,
            })
            .await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }
}
