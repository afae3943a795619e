//! Discovery pipeline services

pub mod discovery_orchestrator;
pub mod field_extractor;
pub mod fingerprint_cache;
pub mod payload_decoder;
pub mod project_scanner;
pub mod project_stats;

pub use discovery_orchestrator::{
    DiscoveryError, DiscoveryFailure, DiscoveryOptions, DiscoveryReport, DiscoverySummary,
    ProjectDiscovery,
};
pub use field_extractor::{find_key, FieldExtractor};
pub use fingerprint_cache::{CacheStore, Fingerprint, FingerprintKey, MemoryCacheStore};
pub use payload_decoder::{decode_and_parse, DecodeError, GzipXmlDecoder, ProjectDecoder};
pub use project_scanner::{is_backup_name, ProjectScanner, ScanError, ScanReport};
pub use project_stats::{project_stats, DatedProject, ProjectStats};
