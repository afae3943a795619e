//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup; it is logged and
//! the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the scan root folder
pub const ROOT_FOLDER_ENV: &str = "SETLIST_ROOT_FOLDER";

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "SETLIST_CONFIG";

/// Environment variable overriding the catalog database location
pub const DATABASE_PATH_ENV: &str = "SETLIST_DATABASE";

/// Top-level TOML configuration
///
/// Every section is optional in the file; absent keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder scanned for `"<Name> Project"` directories
    pub root_folder: Option<PathBuf>,
    /// SQLite catalog file
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Discovery run defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub recursive: bool,
    pub max_depth: usize,
    pub include_backups: bool,
    pub update_existing: bool,
    /// Candidates processed concurrently per batch
    pub batch_size: usize,
    /// Pause between batches in milliseconds (0 disables)
    pub batch_pause_ms: u64,
    /// Per-file read/decode timeout in milliseconds
    pub file_timeout_ms: u64,
    /// Upper bound on in-memory cache entries (unbounded when absent)
    pub cache_capacity: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 3,
            include_backups: false,
            update_existing: false,
            batch_size: 5,
            batch_pause_ms: 100,
            file_timeout_ms: 30_000,
            cache_capacity: None,
        }
    }
}

/// Heuristic constants used by field extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Exclusive lower bound for an accepted tempo
    pub tempo_min: f64,
    /// Exclusive upper bound for an accepted tempo
    pub tempo_max: f64,
    /// Tempo assumed for set-length estimation when none was extracted
    pub default_tempo: f64,
    pub beats_per_bar: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tempo_min: 0.0,
            tempo_max: 500.0,
            default_tempo: 120.0,
            beats_per_bar: 4,
        }
    }
}

impl TomlConfig {
    /// Check values that would make a discovery run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.discovery.batch_size == 0 {
            return Err(Error::Config("discovery.batch_size must be at least 1".to_string()));
        }
        let extraction = &self.extraction;
        if !(extraction.tempo_min.is_finite() && extraction.tempo_max.is_finite())
            || extraction.tempo_min >= extraction.tempo_max
        {
            return Err(Error::Config(format!(
                "extraction tempo range is empty: ({}, {})",
                extraction.tempo_min, extraction.tempo_max
            )));
        }
        if !(extraction.default_tempo > 0.0 && extraction.default_tempo.is_finite()) {
            return Err(Error::Config("extraction.default_tempo must be positive".to_string()));
        }
        if extraction.beats_per_bar == 0 {
            return Err(Error::Config("extraction.beats_per_bar must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, degrading to defaults when no usable file exists
///
/// Lookup: explicit path → `SETLIST_CONFIG` → platform config dir.
/// An explicit path that fails to load is an error; a missing implicit file is not.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return load_toml_config(Path::new(&path));
    }

    match default_config_path() {
        Some(path) if path.exists() => match load_toml_config(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
                Ok(TomlConfig::default())
            }
        },
        _ => {
            debug!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Platform config file location (`<config dir>/setlist/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("setlist").join("config.toml"))
}

/// Resolve the scan root folder
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Resolve the catalog database file
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.database_path {
        return path.clone();
    }

    dirs::data_local_dir()
        .map(|d| d.join("setlist").join("catalog.db"))
        .unwrap_or_else(|| PathBuf::from("./setlist_data/catalog.db"))
}

/// OS-dependent default scan root
fn default_root_folder() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery.max_depth, 3);
        assert_eq!(config.discovery.batch_size, 5);
        assert_eq!(config.extraction.tempo_max, 500.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/music/sets"

            [discovery]
            max_depth = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/music/sets")));
        assert_eq!(config.discovery.max_depth, 1);
        assert!(config.discovery.recursive);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.extraction.beats_per_bar, 4);
    }

    #[test]
    fn test_validate_rejects_empty_tempo_range() {
        let mut config = TomlConfig::default();
        config.extraction.tempo_min = 300.0;
        config.extraction.tempo_max = 200.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = TomlConfig::default();
        config.discovery.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_arg_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
