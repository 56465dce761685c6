//! Prompt types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Variables the template expects to receive
    #[serde(default)]
    pub variables: Vec<String>,

    /// Template string with Handlebars syntax
    pub template: String,

    /// File the definition was read from; `None` for built-ins
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl PromptDefinition {
    pub fn is_builtin(&self) -> bool {
        self.origin.is_none()
    }
}

/// Variables injected into the answer instruction.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerVariables<'a> {
    /// Persona/domain the model speaks as (e.g. "a Pakistan History Expert")
    pub persona: &'a str,

    /// Required output language, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,

    /// Sentence the model must use when the context lacks the answer
    pub fallback: &'a str,

    /// Evidence context, embedded verbatim
    pub context: &'a str,
}

/// The pair of prompts a RAG pipeline needs.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub rewrite: PromptDefinition,
    pub answer: PromptDefinition,
}
