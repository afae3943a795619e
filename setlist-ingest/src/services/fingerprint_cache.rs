//! File fingerprints and the extraction cache
//!
//! A fingerprint is a staleness heuristic, not a content hash: path,
//! modification time and size are hashed together, and two files agreeing on
//! all three are treated as identical. Fingerprints are recomputed on every
//! visit and only live as long as the cache holding them.

use crate::models::ExtractedMetadata;
use crate::utils::modified_at;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Hex-encoded SHA-256 of a [`Fingerprint`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingerprintKey(String);

impl FingerprintKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a file on disk at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

impl Fingerprint {
    pub fn new(path: impl Into<PathBuf>, modified: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            modified,
            size_bytes,
        }
    }

    /// Stat the file and fingerprint its current state
    pub async fn compute(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self::from_metadata(path, &metadata))
    }

    pub fn from_metadata(path: &Path, metadata: &std::fs::Metadata) -> Self {
        Self::new(path, modified_at(metadata), metadata.len())
    }

    /// Cache key: SHA-256 over `path|mtime_ns|size`
    pub fn key(&self) -> FingerprintKey {
        let modified_ns = self
            .modified
            .timestamp_nanos_opt()
            .unwrap_or_else(|| self.modified.timestamp_micros().saturating_mul(1_000));

        let mut hasher = Sha256::new();
        hasher.update(self.path.to_string_lossy().as_bytes());
        hasher.update(b"|");
        hasher.update(modified_ns.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.size_bytes.to_string().as_bytes());
        FingerprintKey(format!("{:x}", hasher.finalize()))
    }
}

/// Memoization store for extracted metadata
///
/// Writes are last-write-wins; concurrent writers of the same key always
/// carry equivalent metadata, so no coordination beyond the store's own
/// locking is needed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &FingerprintKey) -> Option<ExtractedMetadata>;
    async fn put(&self, key: FingerprintKey, metadata: ExtractedMetadata);
    async fn clear(&self);
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Debug, Default)]
struct CacheEntries {
    map: HashMap<FingerprintKey, ExtractedMetadata>,
    /// Insertion order, consulted only when a capacity is set
    order: VecDeque<FingerprintKey>,
}

/// Process-lifetime in-memory cache
///
/// Unbounded by default. With a capacity, the oldest inserted entry is
/// evicted once the bound is reached.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<CacheEntries>,
    capacity: Option<usize>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(CacheEntries::default()),
            capacity: Some(capacity.max(1)),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &FingerprintKey) -> Option<ExtractedMetadata> {
        self.entries.read().await.map.get(key).cloned()
    }

    async fn put(&self, key: FingerprintKey, metadata: ExtractedMetadata) {
        let mut entries = self.entries.write().await;
        if entries.map.insert(key.clone(), metadata).is_some() {
            return;
        }

        if let Some(capacity) = self.capacity {
            entries.order.push_back(key);
            while entries.map.len() > capacity {
                let Some(oldest) = entries.order.pop_front() else {
                    break;
                };
                entries.map.remove(&oldest);
                tracing::trace!(key = %oldest, "Evicted cached metadata");
            }
        }
    }

    async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.map.clear();
        entries.order.clear();
    }

    async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::{Duration, SystemTime};

    fn metadata(size: u64) -> ExtractedMetadata {
        ExtractedMetadata {
            tempo_bpm: Some(124.0),
            musical_key: Some("A minor".to_string()),
            format_version: None,
            tracks: Vec::new(),
            sample_reference_count: 3,
            estimated_set_length: None,
            file_size_bytes: size,
            last_modified: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn key(n: u64) -> FingerprintKey {
        Fingerprint::new("/sets/a.als", Utc.timestamp_opt(1_700_000_000, 0).unwrap(), n).key()
    }

    #[test]
    fn test_key_changes_with_each_component() {
        let modified = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let base = Fingerprint::new("/sets/a.als", modified, 100);

        assert_eq!(base.key(), base.clone().key());
        assert_ne!(base.key(), Fingerprint::new("/sets/b.als", modified, 100).key());
        assert_ne!(base.key(), Fingerprint::new("/sets/a.als", modified, 101).key());
        assert_ne!(
            base.key(),
            Fingerprint::new("/sets/a.als", modified + chrono::Duration::nanoseconds(1), 100).key()
        );
        assert_eq!(base.key().as_str().len(), 64);
    }

    #[tokio::test]
    async fn test_compute_is_stable_until_touched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Song.als");
        std::fs::write(&path, b"first").unwrap();

        let first = Fingerprint::compute(&path).await.unwrap();
        let again = Fingerprint::compute(&path).await.unwrap();
        assert_eq!(first.key(), again.key());

        std::fs::write(&path, b"first and more").unwrap();
        let resized = Fingerprint::compute(&path).await.unwrap();
        assert_ne!(first.key(), resized.key());

        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600)).unwrap();
        let touched = Fingerprint::compute(&path).await.unwrap();
        assert_eq!(touched.size_bytes, resized.size_bytes);
        assert_ne!(resized.key(), touched.key());
    }

    #[tokio::test]
    async fn test_get_returns_stored_metadata() {
        let cache = MemoryCacheStore::new();
        assert!(cache.get(&key(1)).await.is_none());

        cache.put(key(1), metadata(1)).await;
        assert_eq!(cache.get(&key(1)).await, Some(metadata(1)));
        assert!(cache.get(&key(2)).await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryCacheStore::new();
        cache.put(key(1), metadata(1)).await;
        let mut newer = metadata(1);
        newer.tempo_bpm = Some(90.0);
        cache.put(key(1), newer.clone()).await;

        assert_eq!(cache.get(&key(1)).await, Some(newer));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = MemoryCacheStore::with_capacity(2);
        cache.put(key(1), metadata(1)).await;
        cache.put(key(2), metadata(2)).await;
        cache.put(key(3), metadata(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&key(1)).await.is_none());
        assert!(cache.get(&key(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCacheStore::new();
        cache.put(key(1), metadata(1)).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
