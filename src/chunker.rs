//! Overlapping word-window chunking.

use crate::errors::ConfigError;

/// Check that a window advances by at least one word.
pub fn validate_window(chunk_size: usize, overlap: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ConfigError::InvalidChunking {
            chunk_size,
            overlap,
        });
    }
    Ok(())
}

/// Split `text` on whitespace into windows of `chunk_size` words, each
/// starting `chunk_size - overlap` words after the previous one.
///
/// The last window may be shorter. Iteration stops as soon as a window
/// reaches the end of the text, so no two chunks share a start offset.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ConfigError> {
    validate_window(chunk_size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start = end - overlap;
    }

    tracing::debug!(
        words = words.len(),
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "Split text into chunks"
    );
    Ok(chunks)
}

/// Number of whitespace-separated words, the crate's token proxy.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
