//! Aggregate statistics over a project folder
//!
//! Scans deep (backups included) and only stats set files; nothing is decoded.

use crate::models::ProjectCandidate;
use crate::services::{ProjectScanner, ScanError};
use crate::utils::created_at;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Depth used for statistics scans
pub const STATS_SCAN_DEPTH: usize = 10;

/// A project with the creation time of its set file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedProject {
    #[serde(flatten)]
    pub candidate: ProjectCandidate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectStats {
    pub total_projects: usize,
    pub total_size_bytes: u64,
    pub avg_size_bytes: f64,
    pub oldest_project: Option<DatedProject>,
    pub newest_project: Option<DatedProject>,
}

/// Count projects under `root` and summarize their set files
///
/// Set files that vanish or cannot be stat'ed between scan and stat still
/// count as projects but contribute no size or date.
pub fn project_stats(root: &Path) -> Result<ProjectStats, ScanError> {
    let candidates = ProjectScanner::new()
        .include_backups(true)
        .scan(root, STATS_SCAN_DEPTH)?;

    let mut stats = ProjectStats {
        total_projects: candidates.len(),
        ..Default::default()
    };

    for candidate in candidates {
        let metadata = match std::fs::metadata(&candidate.payload_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    path = %candidate.payload_path.display(),
                    error = %e,
                    "Could not stat set file"
                );
                continue;
            }
        };

        stats.total_size_bytes += metadata.len();
        let created = created_at(&metadata);

        if stats
            .oldest_project
            .as_ref()
            .map_or(true, |oldest| created < oldest.created_at)
        {
            stats.oldest_project = Some(DatedProject {
                candidate: candidate.clone(),
                created_at: created,
            });
        }

        if stats
            .newest_project
            .as_ref()
            .map_or(true, |newest| created > newest.created_at)
        {
            stats.newest_project = Some(DatedProject {
                candidate,
                created_at: created,
            });
        }
    }

    if stats.total_projects > 0 {
        stats.avg_size_bytes = stats.total_size_bytes as f64 / stats.total_projects as f64;
    }

    Ok(stats)
}
