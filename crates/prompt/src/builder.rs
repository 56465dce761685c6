//! Prompt builder for rendering instructions.

use crate::types::{AnswerVariables, PromptDefinition};
use convrag_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Render a Handlebars template with variables.
///
/// HTML escaping is disabled so retrieved text reaches the model verbatim.
pub fn render_template<T: Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Render a definition after checking its declared variables are supplied.
fn render_definition<T: Serialize>(definition: &PromptDefinition, variables: &T) -> AppResult<String> {
    let value = serde_json::to_value(variables)?;

    for name in &definition.variables {
        if value.get(name).is_none() {
            return Err(AppError::Prompt(format!(
                "Prompt '{}' requires variable '{}'",
                definition.id, name
            )));
        }
    }

    tracing::debug!(
        prompt = %definition.id,
        builtin = definition.is_builtin(),
        "Rendering prompt"
    );

    render_template(&definition.template, &value)
}

/// Build the system instruction for the query rewrite call.
pub fn build_rewrite_instruction(definition: &PromptDefinition) -> AppResult<String> {
    render_definition(definition, &serde_json::json!({}))
}

/// Build the system instruction for the grounded answer call.
pub fn build_answer_instruction(
    definition: &PromptDefinition,
    variables: &AnswerVariables<'_>,
) -> AppResult<String> {
    render_definition(definition, variables)
}
