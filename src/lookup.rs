//! Lookup by external identifier.
//!
//! An identifier (a product code, or any text) is turned into a key with
//! [`numeric_or_hash`], located in the key sequence, and the resulting
//! record index is handed to a [`RetrievalEngine`]. The private retrieval
//! protocol lives behind that trait.

use ahash::AHashMap;
use std::sync::Arc;

use crate::binary::{CachedReaderConfig, CachedRecordReader};
use crate::cache::{DatabaseCache, LoadedDatabase};
use crate::key::numeric_or_hash;
use crate::schema::Record;
use crate::{Error, Result};

/// Retrieves the record at an index of a loaded database.
///
/// Implementations treat `db.keys()[i]` as the value stored at position
/// `i` and size their representation from `db.record_bits()`.
pub trait RetrievalEngine {
    /// Result of one retrieval.
    type Output;

    /// Retrieve position `index`.
    fn retrieve(&self, db: &LoadedDatabase, index: u64) -> Result<Self::Output>;
}

/// Outcome of [`lookup`].
#[derive(Debug, Clone)]
pub struct LookupResult<T> {
    /// Identifier as given
    pub identifier: String,
    /// Key derived from the identifier
    pub key: u64,
    /// Record index the key was found at
    pub index: u64,
    /// Engine output
    pub output: T,
}

/// Record index for `identifier`, by linear scan of the key sequence.
///
/// Returns the first matching position when keys repeat.
pub fn resolve_identifier(db: &LoadedDatabase, identifier: &str) -> Option<u64> {
    db.position_of(numeric_or_hash(identifier))
}

/// Load the database if needed, resolve `identifier` and run `engine` on
/// its position.
pub fn lookup<E: RetrievalEngine>(
    cache: &DatabaseCache,
    engine: &E,
    identifier: &str,
) -> Result<LookupResult<E::Output>> {
    let db = cache.get()?;
    let key = numeric_or_hash(identifier);
    let index = db
        .position_of(key)
        .ok_or_else(|| Error::IdentifierNotFound(identifier.to_string()))?;
    log::debug!("Identifier '{}' resolved to index {}", identifier, index);

    let output = engine.retrieve(&db, index)?;
    Ok(LookupResult {
        identifier: identifier.to_string(),
        key,
        index,
        output,
    })
}

/// Hash index from key to first record position.
///
/// Gives the same answers as [`LoadedDatabase::position_of`] in O(1), for
/// callers resolving many identifiers against one database. Probe keys of
/// a narrowed database must go through [`LoadedDatabase::normalize_key`]
/// first.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    positions: AHashMap<u64, u64>,
}

impl KeyIndex {
    /// Index a key sequence.
    pub fn build(keys: &[u64]) -> Self {
        let mut positions = AHashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            positions.entry(*key).or_insert(i as u64);
        }
        Self { positions }
    }

    /// First position of `key`.
    pub fn position_of(&self, key: u64) -> Option<u64> {
        self.positions.get(&key).copied()
    }

    /// Number of distinct keys.
    pub fn distinct_keys(&self) -> usize {
        self.positions.len()
    }
}

/// Non-private engine: reads the record in the clear.
///
/// Serves records from memory when the database holds them, otherwise
/// from the full database file through a cached reader.
pub struct DirectRetrieval {
    config: CachedReaderConfig,
    reader: parking_lot::Mutex<Option<Arc<CachedRecordReader>>>,
}

impl DirectRetrieval {
    /// Create an engine with the default reader cache.
    pub fn new() -> Self {
        Self::with_config(CachedReaderConfig::default())
    }

    /// Create an engine with a custom reader cache.
    pub fn with_config(config: CachedReaderConfig) -> Self {
        Self {
            config,
            reader: parking_lot::Mutex::new(None),
        }
    }

    fn reader_for(&self, db: &LoadedDatabase) -> Arc<CachedRecordReader> {
        let mut guard = self.reader.lock();
        match guard.as_ref() {
            Some(reader) if reader.inner().path() == db.full_path() => reader.clone(),
            _ => {
                let reader = Arc::new(CachedRecordReader::with_config(
                    db.record_reader(),
                    self.config.clone(),
                ));
                *guard = Some(reader.clone());
                reader
            }
        }
    }
}

impl Default for DirectRetrieval {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalEngine for DirectRetrieval {
    type Output = Arc<Record>;

    fn retrieve(&self, db: &LoadedDatabase, index: u64) -> Result<Arc<Record>> {
        if index >= db.len() as u64 {
            return Err(Error::IndexOutOfRange {
                index,
                count: db.len() as u64,
            });
        }
        match db.records() {
            Some(records) => Ok(Arc::new(records[index as usize].clone())),
            None => self.reader_for(db).read(index),
        }
    }
}
