//! Prompt system for convrag.
//!
//! System instructions for the two model calls of the pipeline are
//! YAML-shaped prompt definitions rendered with Handlebars:
//! - `rag.rewrite` turns a follow-up into a standalone question
//! - `rag.answer` constrains the answer to the retrieved evidence
//!
//! Both ship built in; a workspace file `.convrag/prompts/<id>.yml`
//! replaces the built-in definition with the same id.

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_answer_instruction, build_rewrite_instruction, render_template};
pub use defaults::{builtin_prompt, ANSWER_PROMPT_ID, REWRITE_PROMPT_ID};
pub use loader::{list_prompts, load_or_builtin, load_prompt};
pub use types::{AnswerVariables, PromptDefinition, PromptSet};
