//! Convrag Core Library
//!
//! This crate provides the foundational utilities shared by every convrag crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Layered configuration (defaults, `.env`, YAML, environment, CLI flags)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
