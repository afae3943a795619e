//! # Setlist Common Library
//!
//! Shared code for the Setlist crates:
//! - Error type used across the catalog and ingest layers
//! - TOML configuration loading and root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
