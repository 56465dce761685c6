//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian f32 blobs and searched by
//! brute-force cosine similarity.

use crate::types::{IndexRecord, IndexStats, Metadata, QueryMatch, SOURCE_METADATA_KEY, TEXT_METADATA_KEY};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use convrag_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Local vector index in a single SQLite file.
pub struct SqliteIndex {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the index database.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                path TEXT PRIMARY KEY,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT,
                text TEXT,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);

        Ok(Self {
            path: db_path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("SQLite index lock poisoned".to_string()))
    }

    fn search(&self, vector: &[f32], top_k: usize, include_metadata: bool) -> AppResult<Vec<QueryMatch>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT id, embedding, metadata FROM chunks")
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| AppError::Retrieval(format!("Failed to query chunks: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (id, blob, metadata_json) =
                row.map_err(|e| AppError::Retrieval(format!("Failed to read chunk: {}", e)))?;

            let embedding = bytes_to_embedding(&blob).map_err(|e| AppError::Retrieval(e.to_string()))?;
            let score = cosine_similarity(vector, &embedding);

            let metadata = if include_metadata {
                serde_json::from_str::<Metadata>(&metadata_json).map_err(|e| {
                    AppError::Retrieval(format!("Invalid metadata for chunk {}: {}", id, e))
                })?
            } else {
                Metadata::new()
            };

            results.push(QueryMatch { id, score, metadata });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            results.len(),
            top_k
        );

        Ok(results)
    }

    fn write(&self, records: &[IndexRecord]) -> AppResult<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        let indexed_at = Utc::now().to_rfc3339();

        for record in records {
            let source = record
                .metadata
                .get(SOURCE_METADATA_KEY)
                .and_then(|v| v.as_str());
            let text = record
                .metadata
                .get(TEXT_METADATA_KEY)
                .and_then(|v| v.as_str());
            let metadata_json = serde_json::to_string(&record.metadata)?;

            if let Some(source) = source {
                tx.execute(
                    "INSERT OR REPLACE INTO sources (path, indexed_at) VALUES (?1, ?2)",
                    params![source, indexed_at],
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to insert source: {}", e)))?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO chunks (id, source, text, embedding, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    source,
                    text,
                    embedding_to_bytes(&record.values),
                    metadata_json,
                ],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit chunks: {}", e)))?;

        Ok(())
    }

    fn counts(&self) -> AppResult<(u64, u64, Option<usize>)> {
        let conn = self.lock()?;

        let count = |sql: &str| -> AppResult<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|v| v as u64)
                .map_err(|e| AppError::Knowledge(format!("Failed to count rows: {}", e)))
        };

        let sources = count("SELECT COUNT(*) FROM sources")?;
        let chunks = count("SELECT COUNT(*) FROM chunks")?;

        let dimension = conn
            .query_row("SELECT length(embedding) FROM chunks LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .ok()
            .map(|len| len as usize / 4);

        Ok((sources, chunks, dimension))
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> AppResult<Vec<QueryMatch>> {
        self.search(vector, top_k, include_metadata)
    }

    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()> {
        self.write(records)
    }

    async fn delete_source(&self, source: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM chunks WHERE source = ?1", [source])
            .and_then(|removed| {
                conn.execute("DELETE FROM sources WHERE path = ?1", [source])?;
                Ok(removed)
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to delete source {}: {}", source, e)))?;

        tracing::debug!("Removed {} chunks of {}", removed, source);
        Ok(())
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let (sources, chunks, dimension) = self.counts()?;
        let size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).ok();

        Ok(IndexStats {
            backend: "sqlite".to_string(),
            vector_count: chunks,
            dimension,
            source_count: Some(sources),
            size_bytes,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM sources;")
            .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))?;

        tracing::info!("Reset SQLite index at {:?}", self.path);
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, source: &str, text: &str, values: Vec<f32>) -> IndexRecord {
        let mut metadata = Metadata::new();
        metadata.insert(TEXT_METADATA_KEY.to_string(), serde_json::json!(text));
        metadata.insert(SOURCE_METADATA_KEY.to_string(), serde_json::json!(source));
        IndexRecord {
            id: id.to_string(),
            values,
            metadata,
        }
    }

    fn open_temp() -> (TempDir, SqliteIndex) {
        let dir = TempDir::new().unwrap();
        let index = SqliteIndex::open(&dir.path().join("nested/index.sqlite")).unwrap();
        (dir, index)
    }

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let (_dir, index) = open_temp();
        index
            .upsert(&[
                record("far", "a.txt", "Cooking recipes", vec![0.0, 1.0, 0.0]),
                record("near", "a.txt", "Partition of 1947", vec![1.0, 0.1, 0.0]),
                record("mid", "b.txt", "Lahore Resolution", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 2, true).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].text(), Some("Partition of 1947"));
    }

    #[tokio::test]
    async fn test_query_without_metadata() {
        let (_dir, index) = open_temp();
        index
            .upsert(&[record("one", "a.txt", "text", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 5, false).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let (_dir, index) = open_temp();
        index
            .upsert(&[record("same", "a.txt", "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[record("same", "a.txt", "new", vec![1.0, 0.0])])
            .await
            .unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.vector_count, 1);
        assert_eq!(stats.source_count, Some(1));
        assert_eq!(stats.dimension, Some(2));

        let hits = index.query(&[1.0, 0.0], 1, true).await.unwrap();
        assert_eq!(hits[0].text(), Some("new"));
    }

    #[tokio::test]
    async fn test_reset_and_empty_query() {
        let (_dir, index) = open_temp();
        index
            .upsert(&[record("x", "a.txt", "text", vec![0.5, 0.5])])
            .await
            .unwrap();
        index.reset().await.unwrap();

        assert_eq!(index.stats().await.unwrap().vector_count, 0);
        assert!(index.query(&[0.5, 0.5], 10, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_source_keeps_other_sources() {
        let (_dir, index) = open_temp();
        index
            .upsert(&[
                record("a0", "a.txt", "Lahore", vec![1.0, 0.0, 0.0]),
                record("a1", "a.txt", "Karachi", vec![0.0, 1.0, 0.0]),
                record("b0", "b.txt", "Quetta", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        index.delete_source("a.txt").await.unwrap();
        index.delete_source("missing.txt").await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.vector_count, 1);
        assert_eq!(stats.source_count, Some(1));
        let hits = index.query(&[1.0, 0.0, 0.0], 5, false).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b0");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let values = vec![0.25, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&values)).unwrap(), values);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }
}
