//! Command handlers for the convrag CLI.

pub mod ask;
pub mod index;
pub mod serve;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use index::IndexCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
