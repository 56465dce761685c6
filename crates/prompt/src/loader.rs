//! Resolution of prompt definitions: workspace overrides first, then
//! the built-ins.

use crate::defaults::{builtin_prompt, ANSWER_PROMPT_ID, REWRITE_PROMPT_ID};
use crate::types::{PromptDefinition, PromptSet};
use convrag_core::{AppError, AppResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PROMPT_EXTENSION: &str = "yml";

fn override_path(prompts_dir: &Path, prompt_id: &str) -> PathBuf {
    prompts_dir.join(format!("{}.{}", prompt_id, PROMPT_EXTENSION))
}

/// Read the override `<prompts_dir>/<id>.yml`.
///
/// Fails when the file is absent, malformed, declares another id, or is
/// missing a required field.
///
/// # Example
/// ```no_run
/// use convrag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let answer = load_prompt(Path::new(".convrag/prompts"), "rag.answer")?;
/// assert!(!answer.is_builtin());
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let path = override_path(prompts_dir, prompt_id);
    tracing::debug!(prompt = prompt_id, "Reading prompt override {:?}", path);

    let raw = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::Prompt(format!("No prompt '{}' at {:?}", prompt_id, path)),
        _ => AppError::Prompt(format!("Cannot read {:?}: {}", path, e)),
    })?;

    let definition = parse_override(&raw, prompt_id, path)?;
    tracing::info!(
        prompt = %definition.id,
        title = %definition.title,
        "Using workspace prompt override"
    );
    Ok(definition)
}

fn parse_override(raw: &str, prompt_id: &str, path: PathBuf) -> AppResult<PromptDefinition> {
    let mut definition: PromptDefinition = serde_yaml::from_str(raw)
        .map_err(|e| AppError::Prompt(format!("Malformed prompt {:?}: {}", path, e)))?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "{:?} defines prompt '{}' but is named for '{}'",
            path, definition.id, prompt_id
        )));
    }

    let problems = problems(&definition);
    if !problems.is_empty() {
        return Err(AppError::Prompt(format!(
            "Invalid prompt {:?}: {}",
            path,
            problems.join("; ")
        )));
    }

    definition.origin = Some(path);
    Ok(definition)
}

/// Field-level problems with a definition; empty when it is usable.
fn problems(def: &PromptDefinition) -> Vec<String> {
    let mut found = Vec::new();

    if def.title.trim().is_empty() {
        found.push("title is empty".to_string());
    }
    if def.template.trim().is_empty() {
        found.push("template is empty".to_string());
    }
    // Versions look like "1.0"
    if !def.api_version.contains('.') {
        found.push(format!("apiVersion '{}' is not of the form x.y", def.api_version));
    }

    found
}

/// The workspace override for `prompt_id` when present, else the built-in.
pub fn load_or_builtin(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if override_path(prompts_dir, prompt_id).is_file() {
        load_prompt(prompts_dir, prompt_id)
    } else {
        tracing::debug!(prompt = prompt_id, "No override, using built-in prompt");
        builtin_prompt(prompt_id)
    }
}

impl PromptSet {
    /// Resolve the rewrite and answer prompts for a workspace.
    pub fn load(prompts_dir: &Path) -> AppResult<Self> {
        Ok(Self {
            rewrite: load_or_builtin(prompts_dir, REWRITE_PROMPT_ID)?,
            answer: load_or_builtin(prompts_dir, ANSWER_PROMPT_ID)?,
        })
    }

    /// The built-in prompts, ignoring any workspace overrides.
    pub fn builtin() -> AppResult<Self> {
        Ok(Self {
            rewrite: builtin_prompt(REWRITE_PROMPT_ID)?,
            answer: builtin_prompt(ANSWER_PROMPT_ID)?,
        })
    }
}

/// Ids of the overrides present in `prompts_dir`, sorted.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<String>> {
    if !prompts_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<String> = walkdir::WalkDir::new(prompts_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().and_then(|ext| ext.to_str()) == Some(PROMPT_EXTENSION)
        })
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .collect();

    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn override_yaml(id: &str) -> String {
        format!(
            "id: {}\ntitle: Workspace answer\napiVersion: \"1.0\"\ntemplate: \"As {{{{persona}}}}: {{{{context}}}}\"\n",
            id
        )
    }

    fn put(dir: &Path, id: &str, yaml: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = override_path(dir, id);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_override_records_origin() {
        let dir = TempDir::new().unwrap();
        let path = put(dir.path(), "rag.answer", &override_yaml("rag.answer"));

        let prompt = load_prompt(dir.path(), "rag.answer").unwrap();
        assert_eq!(prompt.title, "Workspace answer");
        assert_eq!(prompt.origin, Some(path));
        assert!(!prompt.is_builtin());
    }

    #[test]
    fn test_missing_and_malformed_overrides() {
        let dir = TempDir::new().unwrap();
        match load_prompt(dir.path(), "rag.answer") {
            Err(AppError::Prompt(msg)) => assert!(msg.contains("No prompt 'rag.answer'")),
            other => panic!("expected prompt error, got {:?}", other),
        }

        put(dir.path(), "rag.answer", "id: [unterminated");
        assert!(load_prompt(dir.path(), "rag.answer").is_err());
    }

    #[test]
    fn test_id_must_match_file_name() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "rag.answer", &override_yaml("rag.rewrite"));
        assert!(matches!(
            load_prompt(dir.path(), "rag.answer"),
            Err(AppError::Prompt(_))
        ));
    }

    #[test]
    fn test_every_problem_is_reported() {
        let dir = TempDir::new().unwrap();
        put(
            dir.path(),
            "rag.answer",
            "id: rag.answer\ntitle: \"\"\napiVersion: \"1\"\ntemplate: \"  \"\n",
        );

        let err = load_prompt(dir.path(), "rag.answer").unwrap_err().to_string();
        assert!(err.contains("title is empty"));
        assert!(err.contains("template is empty"));
        assert!(err.contains("apiVersion '1'"));
    }

    #[test]
    fn test_prompt_set_mixes_override_and_builtin() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "rag.answer", &override_yaml("rag.answer"));

        let set = PromptSet::load(dir.path()).unwrap();
        assert_eq!(set.answer.title, "Workspace answer");
        assert!(set.rewrite.is_builtin());
    }

    #[test]
    fn test_absent_directory() {
        let absent = TempDir::new().unwrap().path().join("prompts");
        let set = PromptSet::load(&absent).unwrap();
        assert!(set.answer.is_builtin() && set.rewrite.is_builtin());
        assert!(list_prompts(&absent).unwrap().is_empty());
    }

    #[test]
    fn test_list_prompts_sorted() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "rag.rewrite", &override_yaml("rag.rewrite"));
        put(dir.path(), "rag.answer", &override_yaml("rag.answer"));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(
            list_prompts(dir.path()).unwrap(),
            vec!["rag.answer", "rag.rewrite"]
        );
    }
}
