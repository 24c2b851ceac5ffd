//! Database cache configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::converter::DEFAULT_KEY_COLUMN;
use crate::{Error, Result};

/// Default location of the tab-separated product dump.
pub const DEFAULT_SOURCE_PATH: &str = "db/en.openfoodfacts.org.products.csv";

/// Configuration for a [`DatabaseCache`](crate::DatabaseCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tab-separated source file
    pub source_path: PathBuf,
    /// Full database file; derived from `source_path` when unset
    pub full_path: Option<PathBuf>,
    /// Keys-only cache file; derived from `source_path` when unset
    pub keys_path: Option<PathBuf>,
    /// Header name of the key column
    pub key_column: String,
    /// Record bit-width override; narrower than natural folds keys, 0 is
    /// no override
    pub record_bits: Option<u64>,
    /// Expose at most this many records
    pub limit: Option<u64>,
    /// Keep decoded field data in memory when loading the full file
    pub retain_records: bool,
    /// Write missing derived files after a slower load
    pub write_derived: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            full_path: None,
            keys_path: None,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            record_bits: None,
            limit: None,
            retain_records: true,
            write_derived: true,
        }
    }
}

impl CacheConfig {
    /// Configuration for a source file, everything else default.
    pub fn for_source(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check field values.
    pub fn validate(&self) -> Result<()> {
        if self.key_column.is_empty() {
            return Err(Error::Config("key_column must not be empty".to_string()));
        }
        if let Some(bits) = self.record_bits {
            if bits > 64 {
                return Err(Error::Config(format!(
                    "record_bits must be at most 64, got {}",
                    bits
                )));
            }
        }
        Ok(())
    }

    /// Resolved file locations.
    pub fn paths(&self) -> DatabasePaths {
        let derived = DatabasePaths::from_source(&self.source_path);
        DatabasePaths {
            source: derived.source,
            full: self.full_path.clone().unwrap_or(derived.full),
            keys_only: self.keys_path.clone().unwrap_or(derived.keys_only),
        }
    }
}

/// Locations of the three database tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePaths {
    /// Tab-separated source
    pub source: PathBuf,
    /// Full database file
    pub full: PathBuf,
    /// Keys-only cache file
    pub keys_only: PathBuf,
}

impl DatabasePaths {
    /// Conventional paths next to the source: `<stem>.bin` and
    /// `<stem>.keys.bin`, ignoring a trailing `.gz`.
    pub fn from_source(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let base = if source.extension().is_some_and(|ext| ext == "gz") {
            source.with_extension("")
        } else {
            source.clone()
        };
        Self {
            full: base.with_extension("bin"),
            keys_only: base.with_extension("keys.bin"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = CacheConfig::default().paths();
        assert_eq!(
            paths.full,
            PathBuf::from("db/en.openfoodfacts.org.products.bin")
        );
        assert_eq!(
            paths.keys_only,
            PathBuf::from("db/en.openfoodfacts.org.products.keys.bin")
        );
    }

    #[test]
    fn test_gzip_source_paths() {
        let paths = DatabasePaths::from_source("data/products.csv.gz");
        assert_eq!(paths.source, PathBuf::from("data/products.csv.gz"));
        assert_eq!(paths.full, PathBuf::from("data/products.bin"));
        assert_eq!(paths.keys_only, PathBuf::from("data/products.keys.bin"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = CacheConfig {
            full_path: Some(PathBuf::from("/srv/full.bin")),
            ..CacheConfig::for_source("a/b.tsv")
        };
        let paths = config.paths();
        assert_eq!(paths.full, PathBuf::from("/srv/full.bin"));
        assert_eq!(paths.keys_only, PathBuf::from("a/b.keys.bin"));
    }

    #[test]
    fn test_from_yaml() {
        let config = CacheConfig::from_yaml_str(
            "source_path: data/products.tsv\nkey_column: id\nrecord_bits: 16\nlimit: 1000\n",
        )
        .unwrap();
        assert_eq!(config.source_path, PathBuf::from("data/products.tsv"));
        assert_eq!(config.key_column, "id");
        assert_eq!(config.record_bits, Some(16));
        assert_eq!(config.limit, Some(1000));
        assert!(config.retain_records);
        assert!(config.write_derived);
    }

    #[test]
    fn test_yaml_validation() {
        assert_eq!(
            CacheConfig::from_yaml_str("record_bits: 0\n")
                .unwrap()
                .record_bits,
            Some(0)
        );
        assert!(CacheConfig::from_yaml_str("record_bits: 65\n").is_err());
        assert!(CacheConfig::from_yaml_str("key_column: ''\n").is_err());
        assert!(CacheConfig::from_yaml_str("unknown_field: 1\n").is_ok());
    }
}
