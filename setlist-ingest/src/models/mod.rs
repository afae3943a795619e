//! Data models for setlist-ingest
//!
//! - Parsed set documents (element tree)
//! - Candidates, extracted metadata and catalog records

pub mod document;
pub mod project;

pub use document::{Element, ParsedDocument};
pub use project::{ExtractedMetadata, ProjectCandidate, ProjectRecord, TrackInfo};
