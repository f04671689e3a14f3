//! Compression run configuration and results.

use serde::{Deserialize, Serialize};

use crate::chunker::validate_window;
use crate::errors::ConfigError;
use crate::rate::CompressionRate;
use crate::summarizer::DEFAULT_MODEL_ID;

pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 4096;

/// Parameters for one compression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub rate: CompressionRate,
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub few_shot_examples: Option<String>,
    /// Upper bound on tokens generated by any single call.
    pub max_output_tokens: usize,
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared between consecutive chunks; must be below `chunk_size`.
    pub overlap_size: usize,
    pub model_identifier: String,
}

impl CompressionConfig {
    /// Config for `rate` with that rate's default chunk window.
    pub fn for_rate(rate: CompressionRate, task_description: impl Into<String>) -> Self {
        let (chunk_size, overlap_size) = rate.default_chunking();
        Self {
            rate,
            task_description: task_description.into(),
            few_shot_examples: None,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            chunk_size,
            overlap_size,
            model_identifier: DEFAULT_MODEL_ID.to_string(),
        }
    }

    pub fn with_model(mut self, model_identifier: impl Into<String>) -> Self {
        self.model_identifier = model_identifier.into();
        self
    }

    pub fn with_few_shot_examples(mut self, examples: Option<String>) -> Self {
        self.few_shot_examples = examples;
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.overlap_size = overlap_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_window(self.chunk_size, self.overlap_size)
    }
}

/// Outcome of one compression run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub compressed_text: String,
    pub rate: CompressionRate,
    pub original_token_count: usize,
    pub compressed_token_count: usize,
    /// `original / max(1, compressed)`.
    pub achieved_ratio: f64,
    pub target_ratio: u32,
    pub chunks_processed: usize,
    pub task_description: String,
    pub model_identifier: String,
}

impl CompressionResult {
    pub fn new(
        compressed_text: String,
        config: &CompressionConfig,
        original_token_count: usize,
        chunks_processed: usize,
    ) -> Self {
        let compressed_token_count = crate::chunker::word_count(&compressed_text);
        Self {
            compressed_text,
            rate: config.rate,
            original_token_count,
            compressed_token_count,
            achieved_ratio: achieved_ratio(original_token_count, compressed_token_count),
            target_ratio: config.rate.target_ratio(),
            chunks_processed,
            task_description: config.task_description.clone(),
            model_identifier: config.model_identifier.clone(),
        }
    }
}

/// Ratio with the compressed count floored at 1.
pub fn achieved_ratio(original: usize, compressed: usize) -> f64 {
    original as f64 / compressed.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_rate_uses_rate_chunking() {
        let config = CompressionConfig::for_rate(CompressionRate::Ultra, "t");
        assert_eq!((config.chunk_size, config.overlap_size), (512, 64));
        let config = CompressionConfig::for_rate(CompressionRate::Light, "t");
        assert_eq!((config.chunk_size, config.overlap_size), (1024, 128));
        assert_eq!(config.model_identifier, DEFAULT_MODEL_ID);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlap_at_chunk_size() {
        let config = CompressionConfig::for_rate(CompressionRate::High, "t").with_chunking(100, 100);
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidChunking {
                chunk_size: 100,
                overlap: 100
            }
        );
    }

    #[test]
    fn test_unknown_rate_fails_deserialization() {
        let json = r#"{"rate":"extreme","task_description":"t","max_output_tokens":1,
            "chunk_size":10,"overlap_size":1,"model_identifier":"m"}"#;
        assert!(serde_json::from_str::<CompressionConfig>(json).is_err());
    }

    #[test]
    fn test_achieved_ratio_guards_zero() {
        assert_eq!(achieved_ratio(100, 0), 100.0);
        assert_eq!(achieved_ratio(100, 4), 25.0);
        assert_eq!(achieved_ratio(0, 0), 0.0);
    }

    #[test]
    fn test_result_statistics() {
        let config = CompressionConfig::for_rate(CompressionRate::Medium, "task");
        let result = CompressionResult::new("one two three four".into(), &config, 64, 2);
        assert_eq!(result.compressed_token_count, 4);
        assert_eq!(result.achieved_ratio, 16.0);
        assert_eq!(result.target_ratio, 16);
        assert_eq!(result.rate, CompressionRate::Medium);
        assert_eq!(result.chunks_processed, 2);
    }
}
