//! Deterministic extractive compression used when generation is unavailable.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

/// Sentence terminator run followed by whitespace or end of text.
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence boundary pattern is valid")
});

const LEADING_WEIGHT: f64 = 1.5;
const TRAILING_WEIGHT: f64 = 1.2;
const LEADING_FRACTION: f64 = 0.3;
const TRAILING_FRACTION: f64 = 0.7;
const MAX_LENGTH_SCORE: f64 = 2.0;

/// Split text into trimmed sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        let end = m.end();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn position_weight(index: usize, total: usize) -> f64 {
    let pos = index as f64;
    let n = total as f64;
    if pos < n * LEADING_FRACTION {
        LEADING_WEIGHT
    } else if pos > n * TRAILING_FRACTION {
        TRAILING_WEIGHT
    } else {
        1.0
    }
}

fn length_score(sentence: &str) -> f64 {
    (sentence.split_whitespace().count() as f64 / 10.0).min(MAX_LENGTH_SCORE)
}

/// Keep the `⌈n / ratio⌉` highest scoring sentences, in original order.
///
/// Score is position weight times length score. Ties keep the earlier
/// sentence. Ratios below 1 are treated as 1.
pub fn extractive_compress(text: &str, compression_ratio: u32) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return String::new();
    }

    let total = sentences.len();
    let ratio = compression_ratio.max(1) as usize;
    let keep = total.div_ceil(ratio).max(1);

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, position_weight(i, total) * length_score(s)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut selected: Vec<usize> = scored.into_iter().take(keep).map(|(i, _)| i).collect();
    selected.sort_unstable();

    tracing::debug!(
        sentences = total,
        kept = selected.len(),
        compression_ratio,
        "Extractive fallback compression"
    );

    selected
        .into_iter()
        .map(|i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ")
}
