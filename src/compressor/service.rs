//! Compression runs: single-rate and multi-rate cache creation.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

use super::iterative::IterativeCompressor;
use super::types::{CompressionConfig, CompressionResult, DEFAULT_MAX_OUTPUT_TOKENS};
use crate::cache::CacheStore;
use crate::chunker::{chunk, word_count};
use crate::errors::ConfigError;
use crate::prompt::{build_task_prompt, default_task_description};
use crate::rate::CompressionRate;
use crate::summarizer::{DEFAULT_MODEL_ID, Summarize};

pub const DEFAULT_MAX_CONCURRENT_RATES: usize = 4;

/// Options for building the cache at several rates.
#[derive(Debug, Clone)]
pub struct MultiRateOptions {
    /// Defaults to "Answer questions and perform analysis related to {task_type}".
    pub task_description: Option<String>,
    pub few_shot_examples: Option<String>,
    pub model_identifier: String,
    pub max_output_tokens: usize,
    pub rates: Vec<CompressionRate>,
}

impl Default for MultiRateOptions {
    fn default() -> Self {
        Self {
            task_description: None,
            few_shot_examples: None,
            model_identifier: DEFAULT_MODEL_ID.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            rates: CompressionRate::ALL.to_vec(),
        }
    }
}

/// One rate's line in a `MultiRateReport`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport {
    pub rate: CompressionRate,
    pub cache_key: String,
    pub achieved_ratio: f64,
    pub target_ratio: u32,
    pub compressed_tokens: usize,
    pub chunks_processed: usize,
}

/// Summary of a multi-rate run, one line per rate, strongest rate first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiRateReport {
    pub task_type: String,
    pub original_tokens: usize,
    pub rates: Vec<RateReport>,
    pub duration_ms: u64,
}

/// Result of compressing and storing a single rate.
#[derive(Debug, Clone)]
pub struct StoredCompression {
    pub cache_key: String,
    pub result: CompressionResult,
}

/// Runs compression jobs and persists their results.
#[derive(Clone)]
pub struct CompressionService {
    summarizer: Arc<dyn Summarize>,
    cache: CacheStore,
    max_concurrent_rates: usize,
}

impl CompressionService {
    pub fn new(summarizer: Arc<dyn Summarize>, cache: CacheStore) -> Self {
        Self {
            summarizer,
            cache,
            max_concurrent_rates: DEFAULT_MAX_CONCURRENT_RATES,
        }
    }

    pub fn with_max_concurrent_rates(mut self, limit: usize) -> Self {
        self.max_concurrent_rates = limit.max(1);
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Compress `context` for one rate. Only invalid configuration fails;
    /// backend trouble is absorbed by the summarizer's fallback.
    pub async fn compress_context(
        &self,
        context: &str,
        config: &CompressionConfig,
    ) -> Result<CompressionResult, ConfigError> {
        config.validate()?;

        let task_prompt =
            build_task_prompt(&config.task_description, config.few_shot_examples.as_deref());
        let chunks = chunk(context, config.chunk_size, config.overlap_size)?;
        let original_tokens = word_count(context);

        info!(
            rate = %config.rate,
            original_tokens,
            chunks = chunks.len(),
            model = %config.model_identifier,
            "Starting compression"
        );

        let compressed = IterativeCompressor::new(self.summarizer.as_ref())
            .with_max_output_tokens(config.max_output_tokens)
            .compress(
                &chunks,
                &task_prompt,
                config.rate.target_ratio(),
                &config.model_identifier,
            )
            .await;

        let result = CompressionResult::new(compressed, config, original_tokens, chunks.len());
        info!(
            rate = %result.rate,
            compressed_tokens = result.compressed_token_count,
            achieved_ratio = format!("{:.1}", result.achieved_ratio),
            target_ratio = result.target_ratio,
            "Compression complete"
        );
        Ok(result)
    }

    /// Compress one rate and write it to the cache.
    pub async fn compress_and_store(
        &self,
        task_type: &str,
        context: &str,
        config: &CompressionConfig,
    ) -> Result<StoredCompression, ConfigError> {
        let result = self.compress_context(context, config).await?;
        let cache_key = self.cache.store(task_type, config.rate, &result).await;
        Ok(StoredCompression { cache_key, result })
    }

    /// Build and store the cache at every requested rate.
    ///
    /// Rates are independent jobs and run concurrently, at most
    /// `max_concurrent_rates` at a time.
    pub async fn create_multi_rate_cache(
        &self,
        task_type: &str,
        context: &str,
        options: &MultiRateOptions,
    ) -> Result<MultiRateReport, ConfigError> {
        let start = Instant::now();
        let task_description = options
            .task_description
            .clone()
            .unwrap_or_else(|| default_task_description(task_type));

        let mut rates = options.rates.clone();
        rates.sort();
        rates.dedup();

        info!(
            task_type,
            rates = rates.len(),
            concurrency = self.max_concurrent_rates,
            "Creating multi-rate cache"
        );

        let outcomes: Vec<Result<StoredCompression, ConfigError>> = stream::iter(rates)
            .map(|rate| {
                let config = CompressionConfig::for_rate(rate, task_description.clone())
                    .with_model(options.model_identifier.clone())
                    .with_few_shot_examples(options.few_shot_examples.clone());
                let config = CompressionConfig {
                    max_output_tokens: options.max_output_tokens,
                    ..config
                };
                async move { self.compress_and_store(task_type, context, &config).await }
            })
            .buffer_unordered(self.max_concurrent_rates)
            .collect()
            .await;

        let mut reports = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let stored = outcome?;
            reports.push(RateReport {
                rate: stored.result.rate,
                cache_key: stored.cache_key,
                achieved_ratio: stored.result.achieved_ratio,
                target_ratio: stored.result.target_ratio,
                compressed_tokens: stored.result.compressed_token_count,
                chunks_processed: stored.result.chunks_processed,
            });
        }
        reports.sort_by_key(|r| r.rate);

        let report = MultiRateReport {
            task_type: task_type.to_string(),
            original_tokens: word_count(context),
            rates: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            task_type,
            rates = report.rates.len(),
            duration_ms = report.duration_ms,
            "Multi-rate cache created"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, MemoryObjectStore, ObjectStore};
    use crate::summarizer::{RetryPolicy, SummarizerAdapter, SummarizeRequest, UnavailableBackend, extractive_compress};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Keeps the first `target_tokens` words and records the task prompt.
    #[derive(Default)]
    struct TruncatingSummarizer {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Summarize for TruncatingSummarizer {
        async fn summarize(&self, request: SummarizeRequest<'_>) -> String {
            self.prompts
                .lock()
                .unwrap()
                .push(request.task_prompt.to_string());
            request
                .text
                .split_whitespace()
                .take(request.target_tokens)
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    fn service(summarizer: Arc<dyn Summarize>) -> (CompressionService, Arc<MemoryObjectStore>) {
        let objects = Arc::new(MemoryObjectStore::new());
        let cache = CacheStore::new(
            CacheSettings::new("bucket"),
            None,
            Some(objects.clone() as Arc<dyn ObjectStore>),
        );
        (CompressionService::new(summarizer, cache), objects)
    }

    fn corpus(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn test_compress_context_statistics() {
        let summarizer = Arc::new(TruncatingSummarizer::default());
        let (service, _) = service(summarizer.clone());
        let config = CompressionConfig::for_rate(CompressionRate::Light, "Answer finance questions")
            .with_chunking(100, 10);

        let result = service.compress_context(&corpus(190), &config).await.unwrap();

        assert_eq!(result.original_token_count, 190);
        assert_eq!(result.chunks_processed, 2);
        assert_eq!(result.target_ratio, 8);
        assert!(result.compressed_token_count <= 190);
        assert!(result.achieved_ratio >= 1.0);
        let prompts = summarizer.prompts.lock().unwrap();
        assert!(prompts[0].contains("TASK: Answer finance questions"));
    }

    #[tokio::test]
    async fn test_invalid_chunking_is_rejected_before_any_call() {
        let summarizer = Arc::new(TruncatingSummarizer::default());
        let (service, _) = service(summarizer.clone());
        let config = CompressionConfig::for_rate(CompressionRate::High, "t").with_chunking(10, 20);

        let err = service.compress_context("a b c", &config).await.unwrap_err();

        assert!(matches!(err, ConfigError::InvalidChunking { .. }));
        assert!(summarizer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_compression_uses_fallback() {
        let adapter = SummarizerAdapter::new(Arc::new(UnavailableBackend), RetryPolicy::default());
        let (service, _) = service(Arc::new(adapter));
        let text = "Revenue grew 15% to $2.5 billion. Margins improved to 22%. Headcount grew 5%.";
        let config = CompressionConfig::for_rate(CompressionRate::Ultra, "t");

        let result = service.compress_context(text, &config).await.unwrap();

        assert_eq!(result.compressed_text, extractive_compress(text, 64));
        assert_eq!(result.chunks_processed, 1);
    }

    #[tokio::test]
    async fn test_multi_rate_cache_stores_every_rate() {
        let (service, objects) = service(Arc::new(TruncatingSummarizer::default()));

        let report = service
            .create_multi_rate_cache("finance", &corpus(2000), &MultiRateOptions::default())
            .await
            .unwrap();

        assert_eq!(report.task_type, "finance");
        assert_eq!(report.original_tokens, 2000);
        let rates: Vec<CompressionRate> = report.rates.iter().map(|r| r.rate).collect();
        assert_eq!(rates, CompressionRate::ALL.to_vec());
        assert_eq!(report.rates[0].cache_key, "takc:finance:ultra");
        for rate in CompressionRate::ALL {
            let key = format!("cache/v2/finance/{}/cache.json", rate);
            assert!(objects.get("bucket", &key).await.unwrap().is_some(), "{key}");
        }
    }

    #[tokio::test]
    async fn test_multi_rate_uses_default_description_and_rate_windows() {
        let summarizer = Arc::new(TruncatingSummarizer::default());
        let (service, _) = service(summarizer.clone());
        let options = MultiRateOptions {
            rates: vec![CompressionRate::Ultra, CompressionRate::Light, CompressionRate::Ultra],
            ..MultiRateOptions::default()
        };

        let report = service
            .with_max_concurrent_rates(1)
            .create_multi_rate_cache("legal", &corpus(1000), &options)
            .await
            .unwrap();

        assert_eq!(report.rates.len(), 2);
        // 1000 words: 512/64 windows -> 3 chunks, 1024/128 -> 1 chunk
        assert_eq!(report.rates[0].chunks_processed, 3);
        assert_eq!(report.rates[1].chunks_processed, 1);
        let prompts = summarizer.prompts.lock().unwrap();
        assert!(
            prompts
                .iter()
                .all(|p| p.contains("Answer questions and perform analysis related to legal"))
        );
    }
}
