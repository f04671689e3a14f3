//! Fold chunks through the summarizer, carrying the running compression.

use tracing::{debug, info};

use super::types::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::chunker::word_count;
use crate::summarizer::{Summarize, SummarizeRequest};

/// Smallest target length requested for any call.
const MIN_TARGET_TOKENS: usize = 10;

/// Sequential fold over chunks. Each step re-compresses everything kept so
/// far together with the next raw chunk, so no call ever sees the whole
/// context at once.
pub struct IterativeCompressor<'a> {
    summarizer: &'a dyn Summarize,
    max_output_tokens: usize,
}

impl<'a> IterativeCompressor<'a> {
    pub fn new(summarizer: &'a dyn Summarize) -> Self {
        Self {
            summarizer,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Returns the running state after the last chunk; empty for no chunks.
    pub async fn compress(
        &self,
        chunks: &[String],
        task_prompt: &str,
        compression_ratio: u32,
        model_identifier: &str,
    ) -> String {
        let mut running = String::new();
        let total = chunks.len();

        for (i, chunk) in chunks.iter().enumerate() {
            let input = if running.is_empty() {
                chunk.clone()
            } else {
                format!("{}\n\n{}", running, chunk)
            };
            let target_tokens = target_tokens(&input, compression_ratio);

            debug!(
                chunk = i + 1,
                total,
                input_words = word_count(&input),
                target_tokens,
                "Compressing chunk"
            );

            running = self
                .summarizer
                .summarize(SummarizeRequest {
                    task_prompt,
                    text: &input,
                    target_tokens,
                    compression_ratio,
                    max_output_tokens: self.max_output_tokens,
                    model_id: model_identifier,
                })
                .await;
        }

        info!(
            chunks = total,
            output_words = word_count(&running),
            "Iterative compression complete"
        );
        running
    }
}

/// `max(10, words / ratio)`.
pub fn target_tokens(text: &str, compression_ratio: u32) -> usize {
    (word_count(text) / compression_ratio.max(1) as usize).max(MIN_TARGET_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed tag per call.
    #[derive(Default)]
    struct RecordingSummarizer {
        calls: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Summarize for RecordingSummarizer {
        async fn summarize(&self, request: SummarizeRequest<'_>) -> String {
            let mut calls = self.calls.lock().unwrap();
            calls.push((request.text.to_string(), request.target_tokens));
            format!("summary{}", calls.len())
        }
    }

    #[tokio::test]
    async fn test_two_chunks_make_exactly_two_calls() {
        let summarizer = RecordingSummarizer::default();
        let compressor = IterativeCompressor::new(&summarizer);
        let chunks = vec!["c1 words".to_string(), "c2 words".to_string()];

        let out = compressor.compress(&chunks, "prompt", 4, "model").await;

        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "c1 words");
        assert_eq!(calls[1].0, "summary1\n\nc2 words");
        assert_eq!(out, "summary2");
    }

    #[tokio::test]
    async fn test_no_chunks_yields_empty_output() {
        let summarizer = RecordingSummarizer::default();
        let compressor = IterativeCompressor::new(&summarizer);
        let out = compressor.compress(&[], "prompt", 4, "model").await;
        assert!(out.is_empty());
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_target_length_is_floored() {
        let summarizer = RecordingSummarizer::default();
        let compressor = IterativeCompressor::new(&summarizer);
        let big = vec!["w ".repeat(640)];
        compressor.compress(&big, "p", 16, "m").await;
        compressor.compress(&["tiny".to_string()], "p", 16, "m").await;

        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls[0].1, 40);
        assert_eq!(calls[1].1, 10);
    }

    #[test]
    fn test_target_tokens_zero_ratio() {
        assert_eq!(target_tokens(&"w ".repeat(50), 0), 50);
    }
}
