//! Stats command handler.

use clap::Args;
use convrag_core::{config::AppConfig, AppResult};
use convrag_knowledge::open_index;

/// Show vector index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let index = open_index(config).await?;
        let stats = index.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index backend: {}", stats.backend);
        println!("Vectors:       {}", stats.vector_count);
        if let Some(dimension) = stats.dimension {
            println!("Dimensions:    {}", dimension);
        }
        if let Some(sources) = stats.source_count {
            println!("Sources:       {}", sources);
        }
        if let Some(bytes) = stats.size_bytes {
            println!("Size:          {:.2} MB", bytes as f64 / 1_048_576.0);
        }

        Ok(())
    }
}
