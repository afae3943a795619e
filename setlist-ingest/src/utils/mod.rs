//! Utility modules for setlist-ingest

pub mod file_times;

pub use file_times::{created_at, modified_at};
