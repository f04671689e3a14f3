//! Configuration for takc, read from `.takc/takc.toml`.
//!
//! Layering is file → environment → CLI. Environment values come from the
//! process environment first, then from a project `.env` file.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! bucket = "takc-processed-data"
//! store_dir = ".takc/store"
//!
//! [cache]
//! namespace = "takc"
//! ttl_secs = 86400
//! fast_tier = true
//!
//! [model]
//! model_id = "anthropic.claude-3-haiku-20240307-v1:0"
//! endpoint = "https://bedrock-runtime.us-east-1.amazonaws.com"
//! timeout_secs = 60
//! max_retries = 3
//! base_delay_ms = 1000
//!
//! [compression]
//! max_concurrent_rates = 4
//! max_output_tokens = 4096
//!
//! [ingest]
//! chunk_size = 256
//! overlap = 50
//! preprocessing_steps = ["clean_whitespace"]
//!
//! [query]
//! preview_chars = 300
//! max_answer_tokens = 1024
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::chunker::validate_window;
use crate::ingest::PreprocessStep;
use crate::summarizer::{DEFAULT_MODEL_ID, ModelFamily};

pub const CONFIG_DIR: &str = ".takc";
pub const CONFIG_FILE: &str = "takc.toml";

/// Durable storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSection {
    /// Bucket holding cache documents and ingested chunks
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Root of the local object store; relative paths resolve against the project directory
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_bucket() -> String {
    "takc-processed-data".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("store")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            store_dir: default_store_dir(),
        }
    }
}

/// Cache key and fast tier settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Fast tier TTL in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Keep a process-local fast tier in front of the durable store
    #[serde(default = "default_true")]
    pub fast_tier: bool,
}

fn default_namespace() -> String {
    crate::cache::DEFAULT_NAMESPACE.to_string()
}

fn default_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ttl_secs: default_ttl_secs(),
            fast_tier: default_true(),
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Base URL of the generation endpoint. Without one, compression runs
    /// in extractive fallback mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token; prefer the environment over the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    crate::summarizer::RetryPolicy::default().max_retries
}

fn default_base_delay_ms() -> u64 {
    crate::summarizer::RetryPolicy::default().base_delay.as_millis() as u64
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSection {
    /// Rates compressed at the same time during multi-rate runs
    #[serde(default = "default_max_concurrent_rates")]
    pub max_concurrent_rates: usize,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
}

fn default_max_concurrent_rates() -> usize {
    crate::compressor::DEFAULT_MAX_CONCURRENT_RATES
}

fn default_max_output_tokens() -> usize {
    crate::compressor::DEFAULT_MAX_OUTPUT_TOKENS
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self {
            max_concurrent_rates: default_max_concurrent_rates(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSection {
    #[serde(default = "default_ingest_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_ingest_overlap")]
    pub overlap: usize,
    #[serde(default = "default_preprocessing_steps")]
    pub preprocessing_steps: Vec<String>,
}

fn default_ingest_chunk_size() -> usize {
    crate::ingest::DEFAULT_INGEST_CHUNK_SIZE
}

fn default_ingest_overlap() -> usize {
    crate::ingest::DEFAULT_INGEST_OVERLAP
}

fn default_preprocessing_steps() -> Vec<String> {
    vec![PreprocessStep::CleanWhitespace.to_string()]
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            chunk_size: default_ingest_chunk_size(),
            overlap: default_ingest_overlap(),
            preprocessing_steps: default_preprocessing_steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySection {
    /// Characters of compressed text quoted when generation is unavailable
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_max_answer_tokens")]
    pub max_answer_tokens: usize,
}

fn default_preview_chars() -> usize {
    crate::query::DEFAULT_PREVIEW_CHARS
}

fn default_max_answer_tokens() -> usize {
    crate::query::DEFAULT_MAX_ANSWER_TOKENS
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            max_answer_tokens: default_max_answer_tokens(),
        }
    }
}

/// Contents of `takc.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakcToml {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub compression: CompressionSection,
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub query: QuerySection,
}

impl TakcToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse takc.toml")
    }

    /// Load `takc.toml` from `takc_dir`, or defaults if it does not exist.
    pub fn load_or_default(takc_dir: &Path) -> Result<Self> {
        let config_path = takc_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize takc.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides from `lookup`. Returns warnings for
    /// values that could not be used.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(bucket) = first(&["TAKC_BUCKET", "S3_BUCKET"]) {
            self.storage.bucket = bucket;
        }
        if let Some(dir) = first(&["TAKC_STORE_DIR"]) {
            self.storage.store_dir = PathBuf::from(dir);
        }
        if let Some(model_id) = first(&["TAKC_MODEL_ID", "BEDROCK_MODEL_ID"]) {
            self.model.model_id = model_id;
        }
        if let Some(endpoint) = first(&["TAKC_MODEL_ENDPOINT"]) {
            self.model.endpoint = Some(endpoint);
        }
        if let Some(key) = first(&["TAKC_API_KEY", "AWS_BEARER_TOKEN_BEDROCK"]) {
            self.model.api_key = Some(key);
        }
        if let Some(ttl) = first(&["TAKC_CACHE_TTL_SECS"]) {
            match ttl.trim().parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warnings.push(format!(
                    "Ignoring TAKC_CACHE_TTL_SECS='{}': not a number of seconds",
                    ttl
                )),
            }
        }

        warnings
    }

    /// Parsed `[ingest].preprocessing_steps`.
    pub fn preprocessing_steps(&self) -> Result<Vec<PreprocessStep>> {
        self.ingest
            .preprocessing_steps
            .iter()
            .map(|s| s.parse::<PreprocessStep>().map_err(anyhow::Error::from))
            .collect()
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = validate_window(self.ingest.chunk_size, self.ingest.overlap) {
            warnings.push(format!("[ingest] {}", e));
        }

        for step in &self.ingest.preprocessing_steps {
            if let Err(e) = step.parse::<PreprocessStep>() {
                warnings.push(format!("[ingest] {}", e));
            }
        }

        if self.cache.ttl_secs == 0 {
            warnings.push("[cache] ttl_secs is 0: fast tier entries expire immediately".to_string());
        }

        if let Err(e) = ModelFamily::from_model_id(&self.model.model_id) {
            warnings.push(format!("[model] {}", e));
        }

        if self.model.endpoint.is_none() {
            warnings.push(
                "[model] No endpoint configured: compression uses extractive fallback".to_string(),
            );
        }

        if self.compression.max_concurrent_rates == 0 {
            warnings.push("[compression] max_concurrent_rates is 0: treated as 1".to_string());
        }

        if self.storage.bucket.trim().is_empty() {
            warnings.push("[storage] bucket is empty".to_string());
        }

        warnings
    }
}

/// Environment lookup: process environment first, then the project `.env`.
pub fn env_lookup(project_dir: &Path) -> impl Fn(&str) -> Option<String> + use<> {
    let dotenv: HashMap<String, String> = dotenvy::from_path_iter(project_dir.join(".env"))
        .map(|iter| iter.filter_map(|item| item.ok()).collect())
        .unwrap_or_default();
    move |key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct TakcConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .takc directory
    pub takc_dir: PathBuf,
    /// Parsed takc.toml with environment overrides applied
    pub toml: TakcToml,
    /// Problems found while applying the environment
    pub env_warnings: Vec<String>,
}

impl TakcConfig {
    /// Load configuration for `project_dir` using the real environment.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory: {}", project_dir.display()))?;
        let lookup = env_lookup(&project_dir);
        Self::with_lookup(project_dir, lookup)
    }

    /// Load configuration for `project_dir` with an explicit environment.
    pub fn with_lookup<F>(project_dir: PathBuf, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let takc_dir = project_dir.join(CONFIG_DIR);
        let mut toml = TakcToml::load_or_default(&takc_dir)?;
        let env_warnings = toml.apply_env(lookup);

        Ok(Self {
            project_dir,
            takc_dir,
            toml,
            env_warnings,
        })
    }

    /// Path to takc.toml.
    pub fn config_file(&self) -> PathBuf {
        self.takc_dir.join(CONFIG_FILE)
    }

    /// Root of the local object store.
    pub fn store_dir(&self) -> PathBuf {
        if self.toml.storage.store_dir.is_absolute() {
            self.toml.storage.store_dir.clone()
        } else {
            self.project_dir.join(&self.toml.storage.store_dir)
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.env_warnings.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}
