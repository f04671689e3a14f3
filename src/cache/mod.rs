//! Two-tier cache for compressed knowledge.
//!
//! ## Layout
//!
//! | Tier    | Key                                   | Value                  |
//! |---------|---------------------------------------|------------------------|
//! | fast    | `{ns}:{task}:{rate}:metadata`         | metadata JSON, TTL'd   |
//! | fast    | `{ns}:{task}:{rate}:data`             | compressed text, TTL'd |
//! | durable | `cache/v2/{task}/{rate}/cache.json`   | `DurableDocument`      |
//! | durable | `cache/{task}/{rate}/cache.json`      | legacy, read only      |
//!
//! Writes go to both tiers independently; a failing tier is logged and the
//! other write still lands. Reads try fast, then durable v2, then durable v1.

mod entry;
mod tier;

pub use entry::{CacheEntry, CacheMetadata, CacheTier, DurableDocument, SCHEMA_VERSION};
pub use tier::{FsObjectStore, KvStore, MemoryKvStore, MemoryObjectStore, ObjectStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::compressor::CompressionResult;
use crate::errors::{CacheError, TierError};
use crate::rate::CompressionRate;

pub const DEFAULT_NAMESPACE: &str = "takc";
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Explicit settings for a `CacheStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub namespace: String,
    pub bucket: String,
    pub ttl: Duration,
}

impl CacheSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            bucket: bucket.into(),
            ttl: DEFAULT_TTL,
        }
    }
}

/// `{namespace}:{task_type}:{rate}`.
pub fn cache_key(namespace: &str, task_type: &str, rate: CompressionRate) -> String {
    format!("{}:{}:{}", namespace, task_type, rate)
}

pub fn durable_key(task_type: &str, rate: CompressionRate) -> String {
    format!("cache/v2/{}/{}/cache.json", task_type, rate)
}

pub fn legacy_durable_key(task_type: &str, rate: CompressionRate) -> String {
    format!("cache/{}/{}/cache.json", task_type, rate)
}

/// What a single tier (or layout) said about a key.
enum Lookup {
    Hit(CacheEntry),
    NotFound,
    Failed(String),
}

/// Which tiers accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub fast: bool,
    pub durable: bool,
}

/// Reads and writes `CacheEntry`s across the fast and durable tiers.
#[derive(Clone)]
pub struct CacheStore {
    settings: CacheSettings,
    fast: Option<Arc<dyn KvStore>>,
    durable: Option<Arc<dyn ObjectStore>>,
}

impl CacheStore {
    pub fn new(
        settings: CacheSettings,
        fast: Option<Arc<dyn KvStore>>,
        durable: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            settings,
            fast,
            durable,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn key_for(&self, task_type: &str, rate: CompressionRate) -> String {
        cache_key(&self.settings.namespace, task_type, rate)
    }

    /// Write `result` to every configured tier and return the cache key.
    ///
    /// Never fails; tier failures are logged.
    pub async fn store(&self, task_type: &str, rate: CompressionRate, result: &CompressionResult) -> String {
        self.store_with_report(task_type, rate, result).await.0
    }

    pub async fn store_with_report(
        &self,
        task_type: &str,
        rate: CompressionRate,
        result: &CompressionResult,
    ) -> (String, WriteReport) {
        let key = self.key_for(task_type, rate);
        let metadata = CacheMetadata::from_result(task_type, result, Utc::now());

        if self.fast.is_none() && self.durable.is_none() {
            warn!(cache_key = %key, "No cache tiers configured, result not stored");
            return (key, WriteReport::default());
        }

        let (fast, durable) = tokio::join!(
            self.write_fast(&key, &metadata, &result.compressed_text),
            self.write_durable(task_type, rate, &metadata, &result.compressed_text),
        );

        let report = WriteReport {
            fast: log_write("fast", &key, fast),
            durable: log_write("durable", &key, durable),
        };
        info!(
            cache_key = %key,
            fast = report.fast,
            durable = report.durable,
            compressed_tokens = result.compressed_token_count,
            "Stored compressed cache"
        );
        (key, report)
    }

    async fn write_fast(
        &self,
        key: &str,
        metadata: &CacheMetadata,
        text: &str,
    ) -> Option<Result<(), TierError>> {
        let kv = self.fast.as_ref()?;
        Some(put_fast(kv.as_ref(), key, metadata, text, self.settings.ttl).await)
    }

    async fn write_durable(
        &self,
        task_type: &str,
        rate: CompressionRate,
        metadata: &CacheMetadata,
        text: &str,
    ) -> Option<Result<(), TierError>> {
        let store = self.durable.as_ref()?;
        let doc = DurableDocument {
            compressed_kv: text.to_string(),
            metadata: metadata.clone(),
        };
        let object_key = durable_key(task_type, rate);
        Some(put_durable(store.as_ref(), &self.settings.bucket, &object_key, &doc).await)
    }

    /// Drop expired fast-tier entries. Returns the number removed; a tier
    /// failure is logged and counts as zero.
    pub async fn purge_expired(&self) -> usize {
        let Some(kv) = self.fast.as_ref() else {
            return 0;
        };
        match kv.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "Purged expired fast-tier entries");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "Fast tier purge failed");
                0
            }
        }
    }

    /// Look up `(task_type, rate)`: fast tier, then durable v2, then legacy v1.
    ///
    /// Absence everywhere is `Ok(None)`. Only when every configured tier
    /// failed for a reason other than not-found is an error returned.
    pub async fn retrieve(
        &self,
        task_type: &str,
        rate: CompressionRate,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let key = self.key_for(task_type, rate);

        let fast = self.read_fast(&key).await;
        let fast_failure = match fast {
            Lookup::Hit(entry) => {
                debug!(cache_key = %key, "Cache hit in fast tier");
                return Ok(Some(entry));
            }
            Lookup::NotFound => None,
            Lookup::Failed(reason) => {
                warn!(cache_key = %key, reason = %reason, "Fast tier read failed, trying durable tier");
                Some(reason)
            }
        };

        let durable = self.read_durable(&key, task_type, rate).await;
        match (durable, fast_failure) {
            (Lookup::Hit(entry), _) => {
                debug!(cache_key = %key, tier = %entry.tier, "Cache hit in durable tier");
                Ok(Some(entry))
            }
            (Lookup::Failed(durable_reason), Some(fast_reason)) => Err(CacheError::Unreadable {
                cache_key: key,
                reason: format!("fast tier: {}; durable tier: {}", fast_reason, durable_reason),
            }),
            (Lookup::Failed(reason), None) => {
                warn!(cache_key = %key, reason = %reason, "Durable tier read failed, reporting miss");
                Ok(None)
            }
            (Lookup::NotFound, _) => {
                info!(cache_key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn read_fast(&self, key: &str) -> Lookup {
        let Some(kv) = self.fast.as_ref() else {
            return Lookup::NotFound;
        };
        let meta_key = format!("{}:metadata", key);
        let data_key = format!("{}:data", key);
        let (meta, data) = tokio::join!(kv.get(&meta_key), kv.get(&data_key));

        match (meta, data) {
            (Ok(Some(meta)), Ok(Some(data))) => match serde_json::from_str::<CacheMetadata>(&meta) {
                Ok(metadata) => Lookup::Hit(CacheEntry {
                    cache_key: key.to_string(),
                    compressed_text: data,
                    metadata,
                    tier: CacheTier::Fast,
                }),
                Err(e) => Lookup::Failed(format!("malformed metadata: {}", e)),
            },
            (Err(e), _) | (_, Err(e)) => Lookup::Failed(e.to_string()),
            (meta, _) => {
                if matches!(meta, Ok(Some(_))) {
                    debug!(cache_key = %key, "Fast tier holds only part of the entry");
                }
                Lookup::NotFound
            }
        }
    }

    async fn read_durable(&self, key: &str, task_type: &str, rate: CompressionRate) -> Lookup {
        let Some(store) = self.durable.as_ref() else {
            return Lookup::NotFound;
        };

        let current = self
            .read_document(store.as_ref(), key, &durable_key(task_type, rate), CacheTier::DurableV2)
            .await;
        let current_failure = match current {
            Lookup::Hit(entry) => return Lookup::Hit(entry),
            Lookup::NotFound => None,
            Lookup::Failed(reason) => Some(reason),
        };

        let legacy = self
            .read_document(
                store.as_ref(),
                key,
                &legacy_durable_key(task_type, rate),
                CacheTier::DurableV1,
            )
            .await;
        match (legacy, current_failure) {
            (Lookup::Hit(entry), _) => Lookup::Hit(entry),
            (Lookup::Failed(legacy_reason), Some(reason)) => {
                Lookup::Failed(format!("v2: {}; v1: {}", reason, legacy_reason))
            }
            (_, Some(reason)) => Lookup::Failed(format!("v2: {}", reason)),
            (Lookup::Failed(reason), None) => Lookup::Failed(format!("v1: {}", reason)),
            (Lookup::NotFound, None) => Lookup::NotFound,
        }
    }

    async fn read_document(
        &self,
        store: &dyn ObjectStore,
        cache_key: &str,
        object_key: &str,
        tier: CacheTier,
    ) -> Lookup {
        match store.get(&self.settings.bucket, object_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<DurableDocument>(&bytes) {
                Ok(doc) => Lookup::Hit(CacheEntry {
                    cache_key: cache_key.to_string(),
                    compressed_text: doc.compressed_kv,
                    metadata: doc.metadata,
                    tier,
                }),
                Err(e) => Lookup::Failed(format!("malformed document at {}: {}", object_key, e)),
            },
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

async fn put_fast(
    kv: &dyn KvStore,
    key: &str,
    metadata: &CacheMetadata,
    text: &str,
    ttl: Duration,
) -> Result<(), TierError> {
    let meta_json = serde_json::to_string(metadata).map_err(|e| TierError::Backend(e.to_string()))?;
    kv.set_with_ttl(&format!("{}:metadata", key), meta_json, ttl)
        .await?;
    kv.set_with_ttl(&format!("{}:data", key), text.to_string(), ttl)
        .await
}

async fn put_durable(
    store: &dyn ObjectStore,
    bucket: &str,
    object_key: &str,
    doc: &DurableDocument,
) -> Result<(), TierError> {
    let bytes = serde_json::to_vec_pretty(doc).map_err(|e| TierError::Backend(e.to_string()))?;
    store.put(bucket, object_key, bytes).await
}

/// Log a tier write outcome; true when the tier accepted the write.
fn log_write(tier: &str, key: &str, outcome: Option<Result<(), TierError>>) -> bool {
    match outcome {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            warn!(tier, cache_key = %key, error = %e, "Cache tier write failed");
            false
        }
        None => false,
    }
}
