//! Filesystem timestamp helpers

use chrono::{DateTime, Utc};
use std::fs::Metadata;

/// Last modification time, or the epoch when the platform cannot report it
pub fn modified_at(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Creation time, falling back to modification time on filesystems
/// without birth timestamps
pub fn created_at(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| modified_at(metadata))
}
