//! Project directory scanner
//!
//! Walks a root folder looking for `"<Name> Project"` directories that hold a
//! `<Name>.als` set file. Project directories are leaves: their contents
//! (samples, backups, analysis files) are never descended into.
//!
//! Only a root that cannot be listed is an error. Unreadable subdirectories
//! and project directories without a set file are logged and skipped.

use crate::models::ProjectCandidate;
use regex::RegexSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use walkdir::WalkDir;

/// Directory-name suffix marking a project container
pub const PROJECT_DIR_SUFFIX: &str = " Project";

/// Set file extension
pub const PAYLOAD_EXTENSION: &str = "als";

/// Scanner errors (root-level only)
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Root exists but cannot be listed
    #[error("Cannot read root directory {0}: {1}")]
    RootUnreadable(PathBuf, std::io::Error),
}

/// Scan outcome with the reasons directories were passed over
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Candidates sorted by set file path
    pub candidates: Vec<ProjectCandidate>,
    /// Directories excluded by backup heuristics
    pub skipped_backups: Vec<PathBuf>,
    /// Project directories lacking their set file
    pub missing_payloads: Vec<PathBuf>,
    /// Directories that could not be read
    pub unreadable: Vec<String>,
}

fn backup_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)backup",
            r"\d{4}-\d{2}-\d{2}", // date stamp
            r"\.bak$",
            r"~$",
        ])
        .expect("backup patterns are valid regexes")
    })
}

/// True when a directory name looks like a backup copy
pub fn is_backup_name(name: &str) -> bool {
    backup_patterns().is_match(name)
}

/// `"<Name> Project"` → `"<Name>"`
pub fn project_name_from_dir(dir_name: &str) -> Option<&str> {
    dir_name
        .strip_suffix(PROJECT_DIR_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Project directory scanner
#[derive(Debug, Clone, Default)]
pub struct ProjectScanner {
    include_backups: bool,
}

impl ProjectScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also descend into and report backup-looking directories
    pub fn include_backups(mut self, include: bool) -> Self {
        self.include_backups = include;
        self
    }

    /// Find project candidates under `root`
    ///
    /// `max_depth` 0 examines only the root's immediate children; each
    /// additional level lets the scan descend one more non-project directory.
    pub fn scan(&self, root: &Path, max_depth: usize) -> Result<Vec<ProjectCandidate>, ScanError> {
        Ok(self.scan_with_report(root, max_depth)?.candidates)
    }

    /// Scan and keep track of everything that was skipped
    pub fn scan_with_report(&self, root: &Path, max_depth: usize) -> Result<ScanReport, ScanError> {
        check_root(root)?;

        let mut report = ScanReport::default();
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth.saturating_add(1))
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory");
                    report.unreadable.push(e.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let dir_name = entry.file_name().to_string_lossy();

            if !self.include_backups && is_backup_name(&dir_name) {
                tracing::debug!(path = %entry.path().display(), "Skipping backup directory");
                report.skipped_backups.push(entry.path().to_path_buf());
                walker.skip_current_dir();
                continue;
            }

            let Some(project_name) = project_name_from_dir(&dir_name) else {
                continue;
            };

            // Project directories are leaves
            walker.skip_current_dir();

            let payload_path = entry
                .path()
                .join(format!("{}.{}", project_name, PAYLOAD_EXTENSION));

            if payload_path.is_file() {
                tracing::debug!(path = %payload_path.display(), "Found project");
                report.candidates.push(ProjectCandidate {
                    directory_path: entry.path().to_path_buf(),
                    project_name: project_name.to_string(),
                    payload_path,
                });
            } else {
                tracing::warn!(
                    path = %payload_path.display(),
                    "Project directory found but no set file"
                );
                report.missing_payloads.push(entry.path().to_path_buf());
            }
        }

        report
            .candidates
            .sort_by(|a, b| a.payload_path.cmp(&b.payload_path));

        tracing::debug!(
            root = %root.display(),
            candidates = report.candidates.len(),
            skipped_backups = report.skipped_backups.len(),
            missing_payloads = report.missing_payloads.len(),
            unreadable = report.unreadable.len(),
            "Scan complete"
        );

        Ok(report)
    }
}

fn check_root(root: &Path) -> Result<(), ScanError> {
    let metadata = match std::fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScanError::PathNotFound(root.to_path_buf()))
        }
        Err(e) => return Err(ScanError::RootUnreadable(root.to_path_buf(), e)),
    };

    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    std::fs::read_dir(root)
        .map(|_| ())
        .map_err(|e| ScanError::RootUnreadable(root.to_path_buf(), e))
}
