//! Project records produced by discovery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory + set file pair found by the scanner, not yet extracted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectCandidate {
    /// `"<Name> Project"` directory
    pub directory_path: PathBuf,
    /// `<Name>`
    pub project_name: String,
    /// `<Name>.als` inside the directory
    pub payload_path: PathBuf,
}

/// One audio track of a set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Zero-based position in the set's track list
    pub index: usize,
    pub name: String,
    pub is_muted: bool,
    pub is_soloed: bool,
}

/// Metadata mined from one set file
///
/// This is the unit stored in the fingerprint cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub tempo_bpm: Option<f64>,
    pub musical_key: Option<String>,
    pub format_version: Option<String>,
    pub tracks: Vec<TrackInfo>,
    pub sample_reference_count: u32,
    /// `m:ss`
    pub estimated_set_length: Option<String>,
    pub file_size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

impl ExtractedMetadata {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Catalog-ready project
///
/// Created once per successfully processed candidate and handed to the
/// catalog store; discovery never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_name: String,
    pub directory_path: PathBuf,
    pub payload_path: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: ExtractedMetadata,
}

impl ProjectRecord {
    pub fn new(
        candidate: &ProjectCandidate,
        created_at: DateTime<Utc>,
        metadata: ExtractedMetadata,
    ) -> Self {
        Self {
            project_name: candidate.project_name.clone(),
            directory_path: candidate.directory_path.clone(),
            payload_path: candidate.payload_path.clone(),
            created_at,
            metadata,
        }
    }
}
