//! Project discovery pipeline
//!
//! Scan → per candidate: catalog lookup → fingerprint → cache → decode +
//! extract on miss → record. Candidates run in fixed-size batches; a batch
//! settles completely (successes and failures) before the next one starts.
//!
//! Per-candidate failures never abort the run. The only error surfaced by
//! [`ProjectDiscovery::discover`] is a root folder that cannot be scanned.

use crate::db::ProjectStore;
use crate::models::{ProjectCandidate, ProjectRecord};
use crate::services::{
    CacheStore, DecodeError, FieldExtractor, Fingerprint, GzipXmlDecoder, MemoryCacheStore,
    ProjectDecoder, ProjectScanner, ScanError,
};
use crate::utils::created_at;
use futures::future::join_all;
use serde::Serialize;
use setlist_common::config::DiscoveryConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Discovery errors
///
/// `Scan` is returned from `discover`; every other variant is recorded as a
/// [`DiscoveryFailure`] for the candidate it happened to.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to stat {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Decoding {0} exceeded {1:?}")]
    Timeout(PathBuf, Duration),

    #[error("Catalog error: {0}")]
    Store(#[from] setlist_common::Error),

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Per-run discovery settings
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    pub recursive: bool,
    pub max_depth: usize,
    pub include_backups: bool,
    /// Re-extract projects already present in the catalog
    pub update_existing: bool,
    pub batch_size: usize,
    /// Pause between batches (zero disables)
    pub batch_pause: Duration,
    /// Upper bound on reading and decoding one set file
    pub file_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            recursive: config.recursive,
            max_depth: config.max_depth,
            include_backups: config.include_backups,
            update_existing: config.update_existing,
            batch_size: config.batch_size,
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            file_timeout: Duration::from_millis(config.file_timeout_ms),
        }
    }
}

impl DiscoveryOptions {
    /// Depth actually handed to the scanner
    pub fn effective_depth(&self) -> usize {
        if self.recursive {
            self.max_depth
        } else {
            0
        }
    }
}

/// A candidate that could not be turned into a record
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryFailure {
    pub candidate: ProjectCandidate,
    pub reason: String,
}

/// Outcome of one discovery run
///
/// Every scanned candidate appears in exactly one of the two lists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub succeeded: Vec<ProjectRecord>,
    pub failed: Vec<DiscoveryFailure>,
}

/// Counts for a [`DiscoveryReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DiscoveryReport {
    pub fn summary(&self) -> DiscoverySummary {
        DiscoverySummary {
            total: self.succeeded.len() + self.failed.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
        }
    }
}

/// Discovery pipeline with its collaborators
#[derive(Clone)]
pub struct ProjectDiscovery {
    decoder: Arc<dyn ProjectDecoder>,
    extractor: FieldExtractor,
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn ProjectStore>,
}

impl ProjectDiscovery {
    /// Pipeline with the gzip/XML decoder and an unbounded in-memory cache
    pub fn new(store: Arc<dyn ProjectStore>, extractor: FieldExtractor) -> Self {
        Self {
            decoder: Arc::new(GzipXmlDecoder::new()),
            extractor,
            cache: Arc::new(MemoryCacheStore::new()),
            store,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ProjectDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Discover every project under `root`
    pub async fn discover(
        &self,
        root: &Path,
        options: &DiscoveryOptions,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let start_time = Instant::now();
        let candidates = self.scan(root, options).await?;
        let total = candidates.len();

        tracing::info!(
            root = %root.display(),
            candidates = total,
            depth = options.effective_depth(),
            "Discovery started"
        );

        let batch_size = options.batch_size.max(1);
        let mut report = DiscoveryReport::default();

        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if batch_index > 0 && !options.batch_pause.is_zero() {
                tokio::time::sleep(options.batch_pause).await;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|candidate| self.process_candidate(candidate, options)),
            )
            .await;

            for (candidate, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => report.succeeded.push(record),
                    Err(e) => {
                        tracing::warn!(
                            path = %candidate.payload_path.display(),
                            error = %e,
                            "Project processing failed"
                        );
                        report.failed.push(DiscoveryFailure {
                            candidate: candidate.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            let processed = report.succeeded.len() + report.failed.len();
            tracing::debug!(
                progress = format!("{}/{}", processed, total),
                "Batch settled"
            );
        }

        let summary = report.summary();
        tracing::info!(
            root = %root.display(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Discovery complete"
        );

        Ok(report)
    }

    async fn scan(
        &self,
        root: &Path,
        options: &DiscoveryOptions,
    ) -> Result<Vec<ProjectCandidate>, DiscoveryError> {
        let scanner = ProjectScanner::new().include_backups(options.include_backups);
        let root = root.to_path_buf();
        let depth = options.effective_depth();

        tokio::task::spawn_blocking(move || scanner.scan(&root, depth))
            .await
            .map_err(|e| DiscoveryError::Task(e.to_string()))?
            .map_err(DiscoveryError::from)
    }

    /// Turn one candidate into a record
    pub async fn process_candidate(
        &self,
        candidate: &ProjectCandidate,
        options: &DiscoveryOptions,
    ) -> Result<ProjectRecord, DiscoveryError> {
        let payload_path = &candidate.payload_path;

        if let Some(existing) = self.store.get_by_payload_path(payload_path).await? {
            if !options.update_existing {
                tracing::debug!(path = %payload_path.display(), "Already catalogued");
                return Ok(existing);
            }
        }

        let stat = tokio::fs::metadata(payload_path)
            .await
            .map_err(|e| DiscoveryError::Io(payload_path.clone(), e))?;
        let fingerprint = Fingerprint::from_metadata(payload_path, &stat);
        let key = fingerprint.key();

        let metadata = match self.cache.get(&key).await {
            Some(metadata) => {
                tracing::debug!(path = %payload_path.display(), "Cache hit");
                metadata
            }
            None => {
                let document = self.decode(payload_path, options.file_timeout).await?;
                let metadata = self.extractor.extract_all(
                    &document,
                    fingerprint.size_bytes,
                    fingerprint.modified,
                );
                self.cache.put(key, metadata.clone()).await;
                metadata
            }
        };

        Ok(ProjectRecord::new(candidate, created_at(&stat), metadata))
    }

    async fn decode(
        &self,
        path: &Path,
        file_timeout: Duration,
    ) -> Result<crate::models::ParsedDocument, DiscoveryError> {
        let decoder = Arc::clone(&self.decoder);
        let owned_path = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || decoder.decode(&owned_path));

        match tokio::time::timeout(file_timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => Err(DiscoveryError::Task(e.to_string())),
            Err(_) => Err(DiscoveryError::Timeout(path.to_path_buf(), file_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = DiscoveryConfig::default();
        config.batch_pause_ms = 0;
        config.file_timeout_ms = 1_500;

        let options = DiscoveryOptions::from(&config);
        assert!(options.recursive);
        assert_eq!(options.max_depth, 3);
        assert_eq!(options.batch_size, 5);
        assert!(options.batch_pause.is_zero());
        assert_eq!(options.file_timeout, Duration::from_millis(1_500));
    }

    #[test]
    fn test_non_recursive_depth_is_zero() {
        let options = DiscoveryOptions {
            recursive: false,
            max_depth: 7,
            ..Default::default()
        };
        assert_eq!(options.effective_depth(), 0);
    }

    #[test]
    fn test_summary_counts() {
        let candidate = ProjectCandidate {
            directory_path: PathBuf::from("/a/X Project"),
            project_name: "X".to_string(),
            payload_path: PathBuf::from("/a/X Project/X.als"),
        };
        let report = DiscoveryReport {
            succeeded: Vec::new(),
            failed: vec![DiscoveryFailure {
                candidate,
                reason: "boom".to_string(),
            }],
        };

        assert_eq!(
            report.summary(),
            DiscoverySummary {
                total: 1,
                succeeded: 0,
                failed: 1
            }
        );
    }
}
