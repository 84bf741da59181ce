//! # Configuration Management
//!
//! Handles all configuration for VDataBProt components. Every section has a
//! `Default`, and a TOML file only needs to name the fields it overrides:
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/vdbp"
//!
//! [access]
//! prefetch_threshold = 0.6
//!
//! [cache]
//! capacity = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::CompressionAlgorithm;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub codec: CodecConfig,
    pub access: AccessConfig,
    pub cache: CacheConfig,
    pub auditor: AuditorConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            message: format!("Failed to read config {:?}", path),
            source: e,
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| Error::Configuration {
            message: format!("Invalid config {:?}: {}", path, e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.access.prefetch_threshold.is_finite() {
            return Err(Error::Configuration {
                message: "access.prefetch_threshold must be a finite number".to_string(),
            });
        }
        if !self.auditor.derived_strength.is_finite() {
            return Err(Error::Configuration {
                message: "auditor.derived_strength must be a finite number".to_string(),
            });
        }
        if self.cache.capacity == Some(0) {
            return Err(Error::Configuration {
                message: "cache.capacity must be positive when set".to_string(),
            });
        }
        if let Some(level) = self.codec.level {
            let range = zstd::compression_level_range();
            if self.codec.algorithm == CompressionAlgorithm::Zstd && !range.contains(&level) {
                return Err(Error::Configuration {
                    message: format!(
                        "codec.level {} outside supported range {}..={}",
                        level,
                        range.start(),
                        range.end()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// fsync the record log after every put
    pub sync_writes: bool,
    /// Rewrite a record log on open when dead entries outnumber live ones
    pub compact_on_open: bool,
    /// Dead entries required before compaction on open is considered
    pub compaction_min_dead: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
            compact_on_open: true,
            compaction_min_dead: 1024,
        }
    }
}

impl StorageConfig {
    pub fn vectors_path(&self) -> PathBuf {
        self.data_dir.join("vectors.log")
    }

    pub fn links_path(&self) -> PathBuf {
        self.data_dir.join("links.log")
    }

    pub fn access_log_path(&self) -> PathBuf {
        self.data_dir.join("access.log")
    }
}

/// Codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub algorithm: CompressionAlgorithm,
    /// Zstd level; `None` selects the maximum ratio
    pub level: Option<i32>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Zstd,
            level: None,
        }
    }
}

/// Access layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub prefetch_enabled: bool,
    /// Links strictly stronger than this are prefetched
    pub prefetch_threshold: f32,
    /// Recompute the fingerprint on every read
    pub verify_on_read: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            prefetch_enabled: true,
            prefetch_threshold: 0.4,
            verify_on_read: true,
        }
    }
}

/// Prefetch cache configuration. Both bounds are off by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum staged entries; the oldest staged entry is evicted when full
    pub capacity: Option<usize>,
    /// Staged entries older than this are discarded instead of served
    pub ttl_ms: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Integrity auditor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// Two accesses this close together are considered related
    pub co_access_window_ms: u64,
    /// Strength given to links derived from co-access
    pub derived_strength: f32,
    pub patrol_interval_secs: u64,
    pub analysis_interval_secs: u64,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            co_access_window_ms: 5_000,
            derived_strength: 0.5,
            patrol_interval_secs: 3_600,
            analysis_interval_secs: 300,
        }
    }
}

impl AuditorConfig {
    pub fn co_access_window(&self) -> Duration {
        Duration::from_millis(self.co_access_window_ms)
    }

    pub fn patrol_interval(&self) -> Duration {
        Duration::from_secs(self.patrol_interval_secs)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_secs(self.analysis_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.access.prefetch_threshold, 0.4);
        assert_eq!(config.auditor.derived_strength, 0.5);
        assert_eq!(config.cache.capacity, None);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.codec.algorithm, CompressionAlgorithm::Zstd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[storage]
data_dir = "/tmp/vdbp"
sync_writes = false

[codec]
algorithm = "snappy"

[cache]
capacity = 16
ttl_ms = 250

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/vdbp"));
        assert!(!config.storage.sync_writes);
        assert_eq!(config.codec.algorithm, CompressionAlgorithm::Snappy);
        assert_eq!(config.cache.capacity, Some(16));
        assert_eq!(config.cache.ttl(), Some(Duration::from_millis(250)));
        assert_eq!(config.logging.level, LogLevel::Debug);
        // Untouched sections keep their defaults
        assert_eq!(config.access.prefetch_threshold, 0.4);
        assert!(config.storage.compact_on_open);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = Config::default();
        config.cache.capacity = Some(0);
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        let mut config = Config::default();
        config.codec.level = Some(1000);
        assert!(config.validate().is_err());
    }
}
