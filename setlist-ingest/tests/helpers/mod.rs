//! Test helper utilities
//!
//! Shared fixtures for setlist-ingest integration tests

pub mod decoders;
pub mod set_files;

pub use decoders::{CountingDecoder, SlowDecoder};
pub use set_files::{make_project, set_xml, write_corrupt_project, write_set_file, SetFixture};
