//! Source file parsing and text extraction.

use convrag_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => Self::Pdf,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let content_type = ContentType::from_path(path);

    let cleaned = match content_type {
        ContentType::Pdf => {
            let text = pdf_extract::extract_text(path).map_err(|e| {
                AppError::Knowledge(format!("Failed to extract text from {:?}: {}", path, e))
            })?;
            normalize_whitespace(&text)
        }
        ContentType::Markdown => clean_markdown(&read_text(path)?),
        ContentType::Html => clean_html(&read_text(path)?),
        ContentType::PlainText => read_text(path)?,
        ContentType::Unknown => {
            let raw = read_text(path)?;
            if !is_likely_text(&raw) {
                tracing::warn!("Skipping likely binary file: {:?}", path);
                return Err(AppError::Knowledge("Binary file not supported".to_string()));
            }
            raw
        }
    };

    Ok(cleaned)
}

fn read_text(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))
}

/// Collapse runs of blank lines and trailing spaces left by PDF extraction.
fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }

    result.trim().to_string()
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Clean HTML by stripping tags, scripts and styles.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Heuristic: binary data usually contains NUL bytes.
fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("history.PDF")), ContentType::Pdf);
        assert_eq!(ContentType::from_path(Path::new("notes.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("notes.txt")), ContentType::PlainText);
        assert_eq!(ContentType::from_path(Path::new("Makefile")), ContentType::Unknown);
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><STYLE>p{}</STYLE></head><body><p>Hello <b>world</b></p><script>x()</script></body></html>";
        assert_eq!(clean_html(input), "Hello world");
    }

    #[test]
    fn test_clean_html_multibyte() {
        assert_eq!(clean_html("<p>Qaumi tarana — آزادی</p>"), "Qaumi tarana — آزادی");
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "Line one   \n\n\n\nLine two\n";
        assert_eq!(normalize_whitespace(input), "Line one\n\nLine two");
    }

    #[test]
    fn test_parse_text_and_reject_binary() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("a.txt");
        std::fs::write(&text, "Lahore Resolution").unwrap();
        assert_eq!(parse_file(&text).unwrap(), "Lahore Resolution");

        let binary = dir.path().join("blob.bin");
        std::fs::write(&binary, "ab\0cd").unwrap();
        assert!(parse_file(&binary).is_err());
    }
}
