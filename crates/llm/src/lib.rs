//! Generation client crate for convrag.
//!
//! This crate provides a provider-agnostic abstraction for chat-style text
//! generation: an ordered, role-tagged conversation plus a system instruction
//! goes in, a single generated turn comes out.
//!
//! # Providers
//! - **Gemini**: Google Generative Language API (default)
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use convrag_llm::{GenerationClient, GenerationRequest, Turn, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new("llama3.2");
//! let request = GenerationRequest::new(vec![Turn::user("Hello, world!")], "Be brief.");
//! let response = client.generate(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{GenerationClient, GenerationRequest, GenerationResponse, GenerationUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient};
pub use types::{ProviderType, Role, Turn};
