//! Backing tiers: a fast TTL'd key/value store and a durable object store.
//!
//! Not-found is `Ok(None)`; `Err` is reserved for reads and writes that
//! failed for any other reason.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::TierError;

/// Fast, volatile key/value tier.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, TierError>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), TierError>;

    /// Drop expired entries and return how many went. Tiers that expire
    /// on their own have nothing to do.
    async fn purge_expired(&self) -> Result<usize, TierError> {
        Ok(0)
    }
}

/// Durable, persistent object tier addressed by bucket and path-like key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, TierError>;

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), TierError>;
}

struct KvEntry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local fast tier with per-key expiry.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    data: Arc<RwLock<HashMap<String, KvEntry>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), TierError> {
        let expires_at = Instant::now().checked_add(ttl);
        let mut data = self.data.write().await;
        data.insert(key.to_string(), KvEntry { value, expires_at });
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, TierError> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, e| e.is_live(now));
        Ok(before - data.len())
    }
}

/// Durable tier on local disk at `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, TierError> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || key.is_empty() || escapes {
            return Err(TierError::Backend(format!(
                "Invalid object address {}/{}",
                bucket, key
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, TierError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), TierError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

/// In-memory durable tier.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, TierError> {
        let objects = self.objects.read().await;
        Ok(objects.get(&(bucket.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), TierError> {
        let mut objects = self.objects.write().await;
        objects.insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}
