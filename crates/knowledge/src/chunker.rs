//! Overlapping text chunking on semantic boundaries.

use crate::types::ChunkCandidate;
use convrag_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `overlap` characters shared between neighbours.
///
/// Splits prefer paragraph, then sentence, then word boundaries.
pub fn chunk_text(
    source: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunk configuration: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, chunk)| ChunkCandidate {
            source: source.to_string(),
            position: position as u32,
            text: chunk.to_string(),
        })
        .collect();

    tracing::debug!(
        "Chunked {} into {} chunks (size: {}, overlap: {})",
        source,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_respect_capacity() {
        let text = "The Lahore Resolution was adopted in 1940. ".repeat(100);
        let chunks = chunk_text("history.pdf", &text, 200, 50).unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[1].position, 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 200));
        assert!(chunks.iter().all(|c| c.source == "history.pdf"));
    }

    #[test]
    fn test_neighbours_overlap() {
        let text = (0..200).map(|i| format!("word{} ", i)).collect::<String>();
        let chunks = chunk_text("s", &text, 100, 40).unwrap();

        assert!(chunks.len() >= 2);
        let first_tail = chunks[0].text.split_whitespace().last().unwrap();
        assert!(chunks[1].text.contains(first_tail));
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("s", "Pakistan was founded in 1947.", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Pakistan was founded in 1947.");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("s", "", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(matches!(
            chunk_text("s", "text", 100, 100),
            Err(AppError::Config(_))
        ));
    }
}
