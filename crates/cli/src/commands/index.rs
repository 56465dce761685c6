//! Index command handler.
//!
//! Loads documents, chunks and embeds them, and writes them to the
//! configured vector index.

use clap::Args;
use convrag_core::{config::AppConfig, AppResult};
use convrag_knowledge::{create_provider, open_index, IngestOptions, Ingestor};
use std::path::PathBuf;

/// Index documents into the vector index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Files or directories to index
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Clear the index before writing
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command for {} path(s)", self.paths.len());

        let embedder = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;
        let index = open_index(config).await?;

        let ingestor = Ingestor::new(
            embedder,
            index,
            config.ingest.clone(),
            config.embedding.batch_size,
        );

        let options = IngestOptions {
            paths: self.paths.clone(),
            reset: self.reset,
        };
        let stats = ingestor.run(&options).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Indexed {} sources ({} chunks, {} bytes) in {:.2}s",
                stats.sources, stats.chunks, stats.bytes, stats.duration_secs
            );
            if stats.skipped > 0 {
                println!("Skipped {} unreadable sources", stats.skipped);
            }
        }

        Ok(())
    }
}
