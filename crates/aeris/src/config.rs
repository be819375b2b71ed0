//! Configuration.
//!
//! ```toml
//! bucket = "aeris"
//! segment_size = "5MiB"
//! log_filter = "info"
//!
//! [store]
//! kind = "local"
//! root = "/var/lib/aeris"
//! ```

use crate::error::{AerisError, Result};
use crate::segment::{SegmentPolicy, DEFAULT_MAX_SEGMENT_SIZE};
use crate::store::{Bucket, LocalStore, MemoryStore, ObjectStore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Default bucket name.
pub const DEFAULT_BUCKET: &str = "aeris";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// A byte count written with a mandatory unit, e.g. `"5MiB"` or `"512 KB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

const UNITS: [(&str, u64); 7] = [
    ("GiB", 1 << 30),
    ("MiB", 1 << 20),
    ("KiB", 1 << 10),
    ("GB", 1_000_000_000),
    ("MB", 1_000_000),
    ("KB", 1_000),
    ("B", 1),
];

impl ByteSize {
    /// Number of bytes.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = AerisError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| AerisError::validation(format!("byte size '{s}' needs a unit")))?;
        let (digits, unit) = s.split_at(split);
        let unit = unit.trim();
        let count: u64 = digits
            .parse()
            .map_err(|_| AerisError::validation(format!("invalid byte size '{s}'")))?;
        let scale = UNITS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(unit))
            .map(|(_, scale)| *scale)
            .ok_or_else(|| AerisError::validation(format!("unknown byte unit '{unit}'")))?;
        count
            .checked_mul(scale)
            .map(ByteSize)
            .ok_or_else(|| AerisError::validation(format!("byte size '{s}' overflows")))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, scale) = UNITS
            .iter()
            .find(|(_, scale)| self.0 != 0 && self.0 % scale == 0)
            .copied()
            .unwrap_or(("B", 1));
        write!(f, "{}{}", self.0 / scale, name)
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local memory; lost on exit.
    #[default]
    Memory,
    /// Files under a root directory.
    Local {
        /// Root directory.
        root: PathBuf,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AerisConfig {
    /// Bucket holding every key.
    pub bucket: String,
    /// Size budget per segment.
    pub segment_size: ByteSize,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Storage backend.
    pub store: StoreConfig,
}

impl Default for AerisConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            segment_size: ByteSize(DEFAULT_MAX_SEGMENT_SIZE),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            store: StoreConfig::default(),
        }
    }
}

impl AerisConfig {
    /// Reads a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Parses TOML. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::ConfigError` for malformed TOML or a byte size
    /// without a unit, and `AerisError::Validation` for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() || self.bucket.contains('/') {
            return Err(AerisError::validation(format!(
                "invalid bucket name '{}'",
                self.bucket
            )));
        }
        if self.segment_size.0 == 0 {
            return Err(AerisError::validation("segment_size must be positive"));
        }
        Ok(())
    }

    /// Sets the bucket name.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the storage backend.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Uses a local store rooted at `root`.
    pub fn with_local_store(self, root: impl Into<PathBuf>) -> Self {
        self.with_store(StoreConfig::Local { root: root.into() })
    }

    /// Sets the segment size budget.
    pub fn with_segment_size(mut self, size: ByteSize) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Segmentation policy derived from `segment_size`.
    pub fn segment_policy(&self) -> SegmentPolicy {
        SegmentPolicy::default().with_max_segment_size(self.segment_size.0)
    }

    /// Opens the configured backend.
    pub fn open_store(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(match &self.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::Local { root } => Arc::new(LocalStore::open(root)?),
        })
    }

    /// Opens the configured backend and binds it to the bucket.
    pub fn open_bucket(&self) -> Result<Bucket> {
        self.validate()?;
        Ok(Bucket::new(self.open_store()?, self.bucket.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_parsing() {
        assert_eq!("5MiB".parse::<ByteSize>().unwrap(), ByteSize(5 * 1024 * 1024));
        assert_eq!("512 KB".parse::<ByteSize>().unwrap(), ByteSize(512_000));
        assert_eq!("1gib".parse::<ByteSize>().unwrap(), ByteSize(1 << 30));
        assert_eq!("42B".parse::<ByteSize>().unwrap(), ByteSize(42));
        assert!(matches!("4096".parse::<ByteSize>(), Err(AerisError::Validation(_))));
        assert!(matches!("5 parsecs".parse::<ByteSize>(), Err(AerisError::Validation(_))));
        assert!(matches!("MiB".parse::<ByteSize>(), Err(AerisError::Validation(_))));
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize(5 * 1024 * 1024).to_string(), "5MiB");
        assert_eq!(ByteSize(3_000).to_string(), "3KB");
        assert_eq!(ByteSize(1_000_001).to_string(), "1000001B");
        assert_eq!(ByteSize(0).to_string(), "0B");
    }

    #[test]
    fn test_defaults() {
        let config = AerisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AerisConfig::default());
        assert_eq!(config.segment_policy().max_segment_size, DEFAULT_MAX_SEGMENT_SIZE);
    }

    #[test]
    fn test_full_config() {
        let config = AerisConfig::from_toml_str(
            r#"
            bucket = "hugs"
            segment_size = "1MiB"
            log_filter = "alopex_aeris=debug"

            [store]
            kind = "local"
            root = "/tmp/aeris"
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket, "hugs");
        assert_eq!(config.segment_size, ByteSize(1 << 20));
        assert_eq!(config.store, StoreConfig::Local { root: PathBuf::from("/tmp/aeris") });
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            AerisConfig::from_toml_str("segment_size = \"1024\""),
            Err(AerisError::ConfigError(_))
        ));
        assert!(matches!(
            AerisConfig::from_toml_str("bucket = \"\""),
            Err(AerisError::Validation(_))
        ));
        assert!(matches!(
            AerisConfig::from_toml_str("segment_size = \"0B\""),
            Err(AerisError::Validation(_))
        ));
    }

    #[test]
    fn test_builders_and_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AerisConfig::default()
            .with_bucket("obs")
            .with_local_store(dir.path())
            .with_segment_size(ByteSize(2048))
            .with_log_filter("warn");
        let bucket = config.open_bucket().unwrap();
        bucket.set("k", b"v").unwrap();
        assert!(dir.path().join("obs/k").is_file());
        assert_eq!(config.segment_policy().max_segment_size, 2048);
    }

    #[test]
    fn test_config_serializes_back() {
        let config = AerisConfig::default().with_local_store("/data");
        let text = toml::to_string(&config).unwrap();
        assert_eq!(AerisConfig::from_toml_str(&text).unwrap(), config);
    }
}
