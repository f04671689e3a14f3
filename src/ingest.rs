//! Document ingestion: preprocess, chunk, persist chunks, trigger compression.
//!
//! The hand-off between ingestion and compression is the
//! `(task_type, chunk_location, chunk_count)` triple carried by
//! `CompressionTrigger`; `IngestPipeline::run_compression` is the single
//! entry point that consumes it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::ObjectStore;
use crate::chunker::{chunk, validate_window};
use crate::compressor::{CompressionService, MultiRateOptions, MultiRateReport};
use crate::errors::{ConfigError, IngestError};

pub const DEFAULT_INGEST_CHUNK_SIZE: usize = 256;
pub const DEFAULT_INGEST_OVERLAP: usize = 50;

/// One text normalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessStep {
    /// Collapse whitespace runs to single spaces and trim.
    CleanWhitespace,
    /// Keep only alphanumerics and whitespace.
    RemoveSpecialChars,
    Lowercase,
}

impl fmt::Display for PreprocessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessStep::CleanWhitespace => write!(f, "clean_whitespace"),
            PreprocessStep::RemoveSpecialChars => write!(f, "remove_special_chars"),
            PreprocessStep::Lowercase => write!(f, "lowercase"),
        }
    }
}

impl FromStr for PreprocessStep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "clean_whitespace" => Ok(PreprocessStep::CleanWhitespace),
            "remove_special_chars" => Ok(PreprocessStep::RemoveSpecialChars),
            "lowercase" => Ok(PreprocessStep::Lowercase),
            other => Err(ConfigError::UnknownPreprocessingStep(other.to_string())),
        }
    }
}

/// Apply `steps` in order.
pub fn preprocess(text: &str, steps: &[PreprocessStep]) -> String {
    steps.iter().fold(text.to_string(), |acc, step| match step {
        PreprocessStep::CleanWhitespace => acc.split_whitespace().collect::<Vec<_>>().join(" "),
        PreprocessStep::RemoveSpecialChars => acc
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect(),
        PreprocessStep::Lowercase => acc.to_lowercase(),
    })
}

/// Chunking and preprocessing for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub preprocessing_steps: Vec<PreprocessStep>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_INGEST_CHUNK_SIZE,
            overlap: DEFAULT_INGEST_OVERLAP,
            preprocessing_steps: vec![PreprocessStep::CleanWhitespace],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationScheme {
    S3,
    Store,
}

impl LocationScheme {
    fn as_str(self) -> &'static str {
        match self {
            LocationScheme::S3 => "s3",
            LocationScheme::Store => "store",
        }
    }
}

/// Where a document's chunks live: `scheme://bucket/prefix/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkLocation {
    pub scheme: LocationScheme,
    pub bucket: String,
    /// Key prefix without leading or trailing slashes; may be empty.
    pub prefix: String,
}

impl ChunkLocation {
    pub fn new(scheme: LocationScheme, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            scheme,
            bucket: bucket.into(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// Object key of chunk `index`.
    pub fn chunk_key(&self, index: usize) -> String {
        if self.prefix.is_empty() {
            format!("chunk_{:04}.txt", index)
        } else {
            format!("{}/chunk_{:04}.txt", self.prefix, index)
        }
    }
}

impl FromStr for ChunkLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidLocation(s.to_string());
        let (scheme, rest) = s.trim().split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme {
            "s3" => LocationScheme::S3,
            "store" => LocationScheme::Store,
            _ => return Err(invalid()),
        };
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid());
        }
        Ok(ChunkLocation::new(scheme, bucket, prefix))
    }
}

impl TryFrom<String> for ChunkLocation {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChunkLocation> for String {
    fn from(location: ChunkLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}://{}/", self.scheme.as_str(), self.bucket)
        } else {
            write!(f, "{}://{}/{}/", self.scheme.as_str(), self.bucket, self.prefix)
        }
    }
}

/// Request to compress an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionTrigger {
    pub task_type: String,
    #[serde(alias = "chunks_location")]
    pub chunk_location: ChunkLocation,
    pub chunk_count: usize,
}

/// Persists document chunks and turns triggers into multi-rate caches.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    compression: CompressionService,
    options: MultiRateOptions,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        compression: CompressionService,
        options: MultiRateOptions,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            compression,
            options,
        }
    }

    /// Preprocess and chunk `text`, write the chunks under `{task_type}/`
    /// and return the trigger for compressing them.
    pub async fn process_document(
        &self,
        task_type: &str,
        text: &str,
        config: &IngestConfig,
    ) -> Result<CompressionTrigger, IngestError> {
        if task_type.trim().is_empty() {
            return Err(ConfigError::MissingField("task_type").into());
        }
        validate_window(config.chunk_size, config.overlap)?;

        let processed = preprocess(text, &config.preprocessing_steps);
        let chunks = chunk(&processed, config.chunk_size, config.overlap)?;
        let location = ChunkLocation::new(LocationScheme::Store, &self.bucket, task_type);

        for (i, chunk) in chunks.iter().enumerate() {
            let key = location.chunk_key(i);
            if let Err(source) = self
                .store
                .put(&location.bucket, &key, chunk.as_bytes().to_vec())
                .await
            {
                return Err(IngestError::Tier { key, source });
            }
            debug!(key = %key, words = chunk.split_whitespace().count(), "Stored chunk");
        }

        info!(
            task_type,
            chunk_count = chunks.len(),
            location = %location,
            "Document processed"
        );
        Ok(CompressionTrigger {
            task_type: task_type.to_string(),
            chunk_location: location,
            chunk_count: chunks.len(),
        })
    }

    /// Read the triggered chunks back, join them with blank lines and build
    /// the multi-rate cache.
    pub async fn run_compression(
        &self,
        trigger: &CompressionTrigger,
    ) -> Result<MultiRateReport, IngestError> {
        let location = &trigger.chunk_location;
        if trigger.chunk_count == 0 {
            return Err(IngestError::NoChunks {
                task_type: trigger.task_type.clone(),
                location: location.to_string(),
            });
        }

        let mut chunks = Vec::with_capacity(trigger.chunk_count);
        for i in 0..trigger.chunk_count {
            let key = location.chunk_key(i);
            let bytes = match self.store.get(&location.bucket, &key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    return Err(IngestError::DocumentNotFound {
                        key,
                        location: location.to_string(),
                    });
                }
                Err(source) => return Err(IngestError::Tier { key, source }),
            };
            let text = String::from_utf8(bytes).map_err(|_| IngestError::NotUtf8 { key })?;
            chunks.push(text);
        }

        info!(
            task_type = %trigger.task_type,
            chunk_count = chunks.len(),
            "Compressing ingested document"
        );
        let context = chunks.join("\n\n");
        let report = self
            .compression
            .create_multi_rate_cache(&trigger.task_type, &context, &self.options)
            .await?;
        Ok(report)
    }
}
