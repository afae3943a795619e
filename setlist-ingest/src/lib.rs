//! setlist-ingest library interface
//!
//! Finds live-set project folders, decodes their set files and extracts
//! catalog metadata. The binary in `main.rs` is a thin shell over this.

pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use db::{MemoryProjectStore, ProjectStore, SqliteProjectStore};
pub use models::{ExtractedMetadata, ParsedDocument, ProjectCandidate, ProjectRecord, TrackInfo};
pub use services::{
    decode_and_parse, project_stats, DiscoveryOptions, DiscoveryReport, FieldExtractor,
    ProjectDiscovery,
};
