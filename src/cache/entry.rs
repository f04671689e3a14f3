//! Cache document formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::compressor::CompressionResult;
use crate::rate::CompressionRate;

pub const SCHEMA_VERSION: &str = "2.0";
pub const SERVICE_NAME: &str = "takc";

/// Version assumed for documents that predate the version field.
fn legacy_version() -> String {
    "1.0".to_string()
}

/// Metadata stored alongside compressed text in both tiers.
///
/// Only `compression_rate` is required so that sparse legacy documents
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub compression_rate: CompressionRate,
    #[serde(default)]
    pub original_tokens: usize,
    #[serde(default)]
    pub compressed_tokens: usize,
    #[serde(default)]
    pub compression_ratio: f64,
    #[serde(default)]
    pub target_ratio: u32,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub chunks_processed: usize,
    #[serde(default)]
    pub model_used: String,
    /// Unix seconds.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub service: String,
    #[serde(default = "legacy_version")]
    pub version: String,
}

impl CacheMetadata {
    pub fn from_result(task_type: &str, result: &CompressionResult, written_at: DateTime<Utc>) -> Self {
        Self {
            compression_rate: result.rate,
            original_tokens: result.original_token_count,
            compressed_tokens: result.compressed_token_count,
            compression_ratio: result.achieved_ratio,
            target_ratio: result.target_ratio,
            task_type: task_type.to_string(),
            task_description: result.task_description.clone(),
            chunks_processed: result.chunks_processed,
            model_used: result.model_identifier.clone(),
            timestamp: Some(written_at.timestamp_millis() as f64 / 1000.0),
            service: SERVICE_NAME.to_string(),
            version: SCHEMA_VERSION.to_string(),
        }
    }

    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64))
    }
}

/// Accepts unix seconds as a number or numeric string, or an RFC 3339
/// string. Anything else becomes `None` instead of failing the document.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
        }),
        _ => None,
    })
}

/// Durable-tier document, identical for the v2 and legacy v1 layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableDocument {
    pub compressed_kv: String,
    pub metadata: CacheMetadata,
}

/// Which tier (and layout) answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Fast,
    DurableV2,
    DurableV1,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::Fast => write!(f, "fast"),
            CacheTier::DurableV2 => write!(f, "durable_v2"),
            CacheTier::DurableV1 => write!(f, "durable_v1"),
        }
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub compressed_text: String,
    pub metadata: CacheMetadata,
    pub tier: CacheTier,
}
