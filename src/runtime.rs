//! Wiring: resolved configuration in, ready-to-use components out.
//!
//! This is the only place configuration values are read; every component
//! receives explicit settings through its constructor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cache::{CacheSettings, CacheStore, FsObjectStore, KvStore, MemoryKvStore, ObjectStore};
use crate::compressor::{CompressionService, MultiRateOptions};
use crate::config::{TakcConfig, TakcToml};
use crate::ingest::{IngestConfig, IngestPipeline};
use crate::query::{QueryResponder, ResponderSettings};
use crate::summarizer::{
    GenerationBackend, HttpGenerationBackend, RetryPolicy, SummarizerAdapter, UnavailableBackend,
};

pub fn retry_policy(toml: &TakcToml) -> RetryPolicy {
    RetryPolicy {
        max_retries: toml.model.max_retries,
        base_delay: Duration::from_millis(toml.model.base_delay_ms),
    }
}

pub fn cache_settings(toml: &TakcToml) -> CacheSettings {
    CacheSettings {
        namespace: toml.cache.namespace.clone(),
        bucket: toml.storage.bucket.clone(),
        ttl: Duration::from_secs(toml.cache.ttl_secs),
    }
}

pub fn responder_settings(toml: &TakcToml) -> ResponderSettings {
    ResponderSettings {
        model_id: toml.model.model_id.clone(),
        preview_chars: toml.query.preview_chars,
        max_answer_tokens: toml.query.max_answer_tokens,
    }
}

pub fn ingest_config(toml: &TakcToml) -> Result<IngestConfig> {
    Ok(IngestConfig {
        chunk_size: toml.ingest.chunk_size,
        overlap: toml.ingest.overlap,
        preprocessing_steps: toml
            .preprocessing_steps()
            .context("Invalid [ingest] preprocessing_steps")?,
    })
}

pub fn multi_rate_options(toml: &TakcToml) -> MultiRateOptions {
    MultiRateOptions {
        model_identifier: toml.model.model_id.clone(),
        max_output_tokens: toml.compression.max_output_tokens,
        ..MultiRateOptions::default()
    }
}

/// Generation backend for the `[model]` section: HTTP when an endpoint is
/// configured, otherwise one that always fails over to local fallback.
pub fn generation_backend(toml: &TakcToml) -> Result<Arc<dyn GenerationBackend>> {
    match &toml.model.endpoint {
        Some(endpoint) => {
            debug!(endpoint = %endpoint, "Using HTTP generation backend");
            let backend = HttpGenerationBackend::new(
                endpoint,
                toml.model.api_key.clone(),
                Duration::from_secs(toml.model.timeout_secs),
            )?;
            Ok(Arc::new(backend))
        }
        None => {
            info!("No generation endpoint configured, using extractive fallback compression");
            Ok(Arc::new(UnavailableBackend))
        }
    }
}

/// Every component a command or the server needs.
#[derive(Clone)]
pub struct Runtime {
    pub summarizer: SummarizerAdapter,
    pub cache: CacheStore,
    pub compression: CompressionService,
    pub responder: QueryResponder,
    pub ingest: IngestPipeline,
    pub ingest_config: IngestConfig,
    pub multi_rate: MultiRateOptions,
    pub model_id: String,
}

impl Runtime {
    /// Build from the project configuration with the filesystem durable tier.
    pub fn from_config(config: &TakcConfig) -> Result<Self> {
        let backend = generation_backend(&config.toml)?;
        let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.store_dir()));
        let fast: Option<Arc<dyn KvStore>> = config
            .toml
            .cache
            .fast_tier
            .then(|| Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>);
        Self::with_parts(&config.toml, backend, objects, fast)
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        toml: &TakcToml,
        backend: Arc<dyn GenerationBackend>,
        objects: Arc<dyn ObjectStore>,
        fast: Option<Arc<dyn KvStore>>,
    ) -> Result<Self> {
        let summarizer = SummarizerAdapter::new(backend, retry_policy(toml));
        let cache = CacheStore::new(cache_settings(toml), fast, Some(objects.clone()));
        let compression = CompressionService::new(Arc::new(summarizer.clone()), cache.clone())
            .with_max_concurrent_rates(toml.compression.max_concurrent_rates);
        let responder =
            QueryResponder::new(cache.clone(), summarizer.clone(), responder_settings(toml));
        let multi_rate = multi_rate_options(toml);
        let ingest = IngestPipeline::new(
            objects,
            toml.storage.bucket.clone(),
            compression.clone(),
            multi_rate.clone(),
        );

        Ok(Self {
            summarizer,
            cache,
            compression,
            responder,
            ingest,
            ingest_config: ingest_config(toml)?,
            multi_rate,
            model_id: toml.model.model_id.clone(),
        })
    }
}
