//! Built-in prompt definitions.

use crate::types::PromptDefinition;
use convrag_core::{AppError, AppResult};

pub const REWRITE_PROMPT_ID: &str = "rag.rewrite";
pub const ANSWER_PROMPT_ID: &str = "rag.answer";

const REWRITE_YAML: &str = r#"
id: rag.rewrite
title: Standalone question rewrite
apiVersion: "1.0"
createdBy: convrag
variables: []
template: >-
  You are a query rewriting expert. Based on the provided chat history,
  rephrase the "Follow Up user Question" into a complete, standalone question
  that can be understood without the chat history. Only output the rewritten
  question and nothing else.
"#;

const ANSWER_YAML: &str = r#"
id: rag.answer
title: Grounded answer
apiVersion: "1.0"
createdBy: convrag
variables: [persona, fallback, context]
template: |-
  You are {{persona}}.{{#if language}} You only have to speak in {{language}}.{{/if}}
  You will be given a context of relevant information and a user question.
  Your task is to answer the user's question based ONLY on the provided context.
  If the answer is not in the context, you must say "{{fallback}}"
  Keep your answers clear, concise, and educational.

  Context: {{context}}
"#;

/// Look up a built-in prompt definition by id.
pub fn builtin_prompt(id: &str) -> AppResult<PromptDefinition> {
    let yaml = match id {
        REWRITE_PROMPT_ID => REWRITE_YAML,
        ANSWER_PROMPT_ID => ANSWER_YAML,
        other => {
            return Err(AppError::Prompt(format!(
                "No built-in prompt with id: {}",
                other
            )))
        }
    };

    Ok(serde_yaml::from_str(yaml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_parse() {
        let rewrite = builtin_prompt(REWRITE_PROMPT_ID).unwrap();
        assert_eq!(rewrite.id, REWRITE_PROMPT_ID);
        assert!(rewrite.template.starts_with("You are a query rewriting expert."));
        assert!(rewrite.template.ends_with("nothing else."));
        assert!(!rewrite.template.contains('\n'));

        let answer = builtin_prompt(ANSWER_PROMPT_ID).unwrap();
        assert!(answer.template.contains("{{context}}"));
        assert!(answer.is_builtin());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(matches!(
            builtin_prompt("rag.summarize"),
            Err(AppError::Prompt(_))
        ));
    }
}
