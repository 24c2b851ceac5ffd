//! Cached record reader.
//!
//! Cold reads walk the full database file like [`RecordReader`]; repeated
//! reads of the same index are served from an LRU cache.

use quick_cache::sync::Cache;
use std::sync::Arc;

use super::reader::RecordReader;
use crate::schema::Record;
use crate::Result;

/// Default cache capacity (number of records).
const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Configuration for the cached reader.
#[derive(Debug, Clone)]
pub struct CachedReaderConfig {
    /// Maximum number of records in the cache.
    pub cache_capacity: usize,
    /// Whether to enable caching.
    pub cache_enabled: bool,
}

impl Default for CachedReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}

impl CachedReaderConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity: capacity,
            cache_enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            cache_capacity: 0,
            cache_enabled: false,
        }
    }
}

/// Record reader with an LRU cache in front of the file walk.
pub struct CachedRecordReader {
    inner: RecordReader,
    cache: Option<Cache<u64, Arc<Record>>>,
    config: CachedReaderConfig,
}

impl CachedRecordReader {
    /// Wrap a reader with the default configuration.
    pub fn new(inner: RecordReader) -> Self {
        Self::with_config(inner, CachedReaderConfig::default())
    }

    /// Wrap a reader with a custom configuration.
    pub fn with_config(inner: RecordReader, config: CachedReaderConfig) -> Self {
        let cache = if config.cache_enabled && config.cache_capacity > 0 {
            Some(Cache::new(config.cache_capacity))
        } else {
            None
        };
        Self {
            inner,
            cache,
            config,
        }
    }

    /// Read the record at `index`, consulting the cache first.
    pub fn read(&self, index: u64) -> Result<Arc<Record>> {
        if let Some(ref cache) = self.cache {
            if let Some(record) = cache.get(&index) {
                return Ok(record);
            }
        }

        let record = Arc::new(self.inner.read(index)?);

        if let Some(ref cache) = self.cache {
            cache.insert(index, record.clone());
        }
        Ok(record)
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.config.cache_capacity,
                len: cache.len(),
                enabled: true,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
            },
        }
    }

    /// The underlying uncached reader.
    pub fn inner(&self) -> &RecordReader {
        &self.inner
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::DatabaseWriter;
    use crate::schema::Schema;
    use tempfile::NamedTempFile;

    fn create_test_file() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let schema = Schema::from_iter(["code", "name"]);
        let mut writer = DatabaseWriter::new(file.reopen().unwrap(), &schema).unwrap();
        writer.write_record(1, [Some("1"), Some("Apple")]).unwrap();
        writer.write_record(2, [Some("2"), Some("Banana")]).unwrap();
        writer.finish().unwrap();
        file
    }

    #[test]
    fn test_cached_reader_basic() {
        let file = create_test_file();
        let reader = CachedRecordReader::new(RecordReader::open(file.path()).unwrap());

        assert_eq!(reader.read(0).unwrap().get("name"), Some("Apple"));
        assert_eq!(reader.read(1).unwrap().get("name"), Some("Banana"));
        assert!(reader.read(2).is_err());
    }

    #[test]
    fn test_cache_hit() {
        let file = create_test_file();
        let reader = CachedRecordReader::new(RecordReader::open(file.path()).unwrap());

        let first = reader.read(1).unwrap();
        assert_eq!(reader.cache_stats().len, 1);

        let second = reader.read(1).unwrap();
        assert_eq!(reader.cache_stats().len, 1);
        assert!(Arc::ptr_eq(&first, &second));

        reader.clear_cache();
        assert_eq!(reader.cache_stats().len, 0);
    }

    #[test]
    fn test_no_cache_config() {
        let file = create_test_file();
        let reader = CachedRecordReader::with_config(
            RecordReader::open(file.path()).unwrap(),
            CachedReaderConfig::no_cache(),
        );

        let first = reader.read(0).unwrap();
        let second = reader.read(0).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        let stats = reader.cache_stats();
        assert!(!stats.enabled);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn test_custom_capacity() {
        let file = create_test_file();
        let reader = CachedRecordReader::with_config(
            RecordReader::open(file.path()).unwrap(),
            CachedReaderConfig::with_capacity(100),
        );
        let stats = reader.cache_stats();
        assert!(stats.enabled);
        assert_eq!(stats.capacity, 100);
    }
}
