//! Tiered database cache.
//!
//! A [`DatabaseCache`] loads the database once, from the fastest
//! representation available:
//!
//! 1. keys-only cache file (keys and schema only)
//! 2. full database file, then writes the keys-only cache
//! 3. tab-separated source, then writes the full database file
//!
//! The derived writes are best-effort; a failure is logged and the load
//! still succeeds. The first caller runs the load while holding the cache
//! lock, so concurrent callers wait for it and never repeat the work. The
//! outcome, success or failure, is kept for the life of the cache.

use parking_lot::Mutex;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::binary::{
    read_all_records, scan_keys, write_database, write_keys_only, KeysOnly, RecordReader,
};
use crate::config::{CacheConfig, DatabasePaths};
use crate::converter::{ConversionReport, SourceItem, SourceReader};
use crate::key::{apply_width_override, bit_width_for_keys, narrow_key};
use crate::schema::{Record, Schema};
use crate::storage::{write_atomically, FsStorage, Storage};
use crate::{Error, Result};

/// Representation a database was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTier {
    /// Keys-only cache file
    KeysOnly,
    /// Full database file
    FullBinary,
    /// Tab-separated source
    Source,
}

impl LoadTier {
    /// Get the internal name of this tier.
    pub fn name(&self) -> &'static str {
        match self {
            LoadTier::KeysOnly => "keys_only",
            LoadTier::FullBinary => "full_binary",
            LoadTier::Source => "source",
        }
    }
}

/// A loaded database: keys, schema and record bit-width, plus field data
/// when the load went through the full file or the source.
pub struct LoadedDatabase {
    keys: Vec<u64>,
    schema: Arc<Schema>,
    record_bits: u64,
    natural_record_bits: u64,
    records: Option<Vec<Record>>,
    tier: LoadTier,
    full_path: PathBuf,
    source_report: Option<ConversionReport>,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for LoadedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDatabase")
            .field("len", &self.keys.len())
            .field("columns", &self.schema.columns())
            .field("record_bits", &self.record_bits)
            .field("natural_record_bits", &self.natural_record_bits)
            .field("tier", &self.tier)
            .field("full_path", &self.full_path)
            .finish()
    }
}

impl LoadedDatabase {
    /// Keys in record order; position `i` is record index `i`.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    /// Shared column schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Column names in physical order.
    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    /// Record bit-width the retrieval engine should size for.
    pub fn record_bits(&self) -> u64 {
        self.record_bits
    }

    /// Bit-width of the keys before any override.
    pub fn natural_record_bits(&self) -> u64 {
        self.natural_record_bits
    }

    /// Whether keys were folded to a narrower width.
    pub fn is_narrowed(&self) -> bool {
        self.record_bits < self.natural_record_bits
    }

    /// In-memory records; `None` after a keys-only load.
    pub fn records(&self) -> Option<&[Record]> {
        self.records.as_deref()
    }

    /// Tier the database was loaded from.
    pub fn tier(&self) -> LoadTier {
        self.tier
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the database has no records.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Path of the full database file used for random access.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Rows accepted and skipped while parsing the source; `None` unless
    /// the database was loaded from the source.
    pub fn source_report(&self) -> Option<&ConversionReport> {
        self.source_report.as_ref()
    }

    /// Reduce a derived key the same way the stored keys were.
    pub fn normalize_key(&self, key: u64) -> u64 {
        if self.is_narrowed() {
            narrow_key(key, self.record_bits)
        } else {
            key
        }
    }

    /// First record index holding `key`, by linear scan.
    pub fn position_of(&self, key: u64) -> Option<u64> {
        let key = self.normalize_key(key);
        self.keys.iter().position(|k| *k == key).map(|i| i as u64)
    }

    /// Random-access reader over the full database file, opening it
    /// through the cache's storage.
    pub fn record_reader(&self) -> RecordReader {
        RecordReader::with_storage(
            self.full_path.clone(),
            self.schema.clone(),
            self.storage.clone(),
        )
    }

    /// Record at `index`, from memory when held, otherwise from disk.
    pub fn record(&self, index: u64) -> Result<Record> {
        if index >= self.keys.len() as u64 {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.keys.len() as u64,
            });
        }
        match self.records {
            Some(ref records) => Ok(records[index as usize].clone()),
            None => self.record_reader().read(index),
        }
    }
}

/// Load state, guarded by the cache lock.
enum CacheState {
    Empty,
    Loaded(Arc<LoadedDatabase>),
    Failed(Arc<Error>),
}

/// Keys, schema and optional records produced by one tier.
struct TierOutput {
    keys: Vec<u64>,
    schema: Arc<Schema>,
    natural_record_bits: u64,
    records: Option<Vec<Record>>,
    source_report: Option<ConversionReport>,
}

/// Single-flight, load-once database cache.
pub struct DatabaseCache {
    config: CacheConfig,
    paths: DatabasePaths,
    storage: Arc<dyn Storage>,
    state: Mutex<CacheState>,
}

impl DatabaseCache {
    /// Create an empty cache over the local filesystem.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_storage(config, Arc::new(FsStorage))
    }

    /// Create an empty cache that accesses files through `storage`.
    pub fn with_storage(config: CacheConfig, storage: Arc<dyn Storage>) -> Self {
        let paths = config.paths();
        Self {
            config,
            paths,
            storage,
            state: Mutex::new(CacheState::Empty),
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolved tier paths.
    pub fn paths(&self) -> &DatabasePaths {
        &self.paths
    }

    /// Whether a load has completed successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.lock(), CacheState::Loaded(_))
    }

    /// Whether the load has failed.
    pub fn is_failed(&self) -> bool {
        matches!(*self.state.lock(), CacheState::Failed(_))
    }

    /// Get the database, loading it on first use.
    ///
    /// Callers arriving during the load block until it resolves. After a
    /// failure every call returns [`Error::LoadFailed`] with the original
    /// error; the load is not retried.
    pub fn get(&self) -> Result<Arc<LoadedDatabase>> {
        let mut state = self.state.lock();
        match &*state {
            CacheState::Loaded(db) => {
                log::debug!("Using cached database");
                return Ok(db.clone());
            }
            CacheState::Failed(err) => return Err(Error::LoadFailed(err.clone())),
            CacheState::Empty => {}
        }

        match self.load() {
            Ok(db) => {
                let db = Arc::new(db);
                *state = CacheState::Loaded(db.clone());
                Ok(db)
            }
            Err(err) => {
                log::error!("Failed to load database: {}", err);
                let err = Arc::new(err);
                *state = CacheState::Failed(err.clone());
                Err(Error::LoadFailed(err))
            }
        }
    }

    fn load(&self) -> Result<LoadedDatabase> {
        self.config.validate()?;
        let (tier, output) = if self.storage.exists(&self.paths.keys_only) {
            log::info!("Loading database from keys-only cache {:?}", self.paths.keys_only);
            (LoadTier::KeysOnly, self.load_keys_only()?)
        } else if self.storage.exists(&self.paths.full) {
            log::info!("Loading database from binary {:?}", self.paths.full);
            (LoadTier::FullBinary, self.load_full_binary()?)
        } else if self.storage.exists(&self.paths.source) {
            log::info!("Loading database from source {:?} (slowest option)", self.paths.source);
            (LoadTier::Source, self.load_source()?)
        } else {
            return Err(Error::SourceNotFound {
                keys_path: self.paths.keys_only.clone(),
                full_path: self.paths.full.clone(),
                source_path: self.paths.source.clone(),
            });
        };

        let TierOutput {
            mut keys,
            schema,
            natural_record_bits,
            mut records,
            source_report,
        } = output;

        if let Some(limit) = self.config.limit {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            keys.truncate(limit);
            if let Some(ref mut records) = records {
                records.truncate(limit);
            }
        }
        let record_bits =
            apply_width_override(&mut keys, natural_record_bits, self.config.record_bits);

        log::info!(
            "Database loaded from {}: {} records, {} columns, record size: {} bits",
            tier.name(),
            keys.len(),
            schema.len(),
            record_bits
        );

        Ok(LoadedDatabase {
            keys,
            schema,
            record_bits,
            natural_record_bits,
            records,
            tier,
            full_path: self.paths.full.clone(),
            source_report,
            storage: self.storage.clone(),
        })
    }

    fn load_keys_only(&self) -> Result<TierOutput> {
        let file = self.storage.open(&self.paths.keys_only)?;
        let decoded = KeysOnly::load(&file, None)?;
        Ok(TierOutput {
            keys: decoded.keys,
            schema: decoded.schema,
            natural_record_bits: decoded.record_bits,
            records: None,
            source_report: None,
        })
    }

    fn load_full_binary(&self) -> Result<TierOutput> {
        let mut file = BufReader::new(self.storage.open(&self.paths.full)?);
        let (schema, keys, records) = if self.config.retain_records {
            let (schema, records) = read_all_records(&mut file, None)?;
            let keys = records.iter().map(Record::key).collect();
            (schema, keys, Some(records))
        } else {
            let (schema, keys) = scan_keys(&mut file, None)?;
            (schema, keys, None)
        };
        let natural_record_bits = bit_width_for_keys(&keys);

        if self.config.write_derived {
            log::info!("Creating keys-only cache for future use...");
            let written = write_atomically(self.storage.as_ref(), &self.paths.keys_only, |file| {
                let file = write_keys_only(file, &schema, natural_record_bits, &keys)?;
                Ok(((), file))
            });
            match written {
                Ok(()) => log::info!(
                    "Created keys-only cache {:?}: {} keys",
                    self.paths.keys_only,
                    keys.len()
                ),
                Err(e) => log::warn!("Could not create keys-only cache: {}", e),
            }
        }

        Ok(TierOutput {
            keys,
            schema,
            natural_record_bits,
            records,
            source_report: None,
        })
    }

    fn load_source(&self) -> Result<TierOutput> {
        let file = self.storage.open(&self.paths.source)?;
        let mut source = SourceReader::new(file, &self.config.key_column)?;
        let schema = source.schema().clone();

        let mut keys = Vec::new();
        let mut records = Vec::new();
        let mut report = ConversionReport::default();
        while let Some(item) = source.next_item()? {
            match item {
                SourceItem::Record { key, values } => {
                    keys.push(key);
                    records.push(Record::new(key, schema.clone(), values));
                    report.accepted_count += 1;
                    report.max_key = report.max_key.max(key);
                    if keys.len() % 100_000 == 0 {
                        log::debug!("Loaded {} records...", keys.len());
                    }
                }
                SourceItem::Skipped(row) => {
                    log::warn!("Skipping row at line {}: {}", row.line_number, row.reason);
                    report.skipped_rows.push(row);
                }
            }
        }
        if report.skipped_count() > 0 {
            log::warn!("Skipped {} malformed rows", report.skipped_count());
        }
        let natural_record_bits = bit_width_for_keys(&keys);
        report.record_bits = natural_record_bits;

        if self.config.write_derived {
            log::info!("Saving binary version for future use...");
            let written = write_atomically(self.storage.as_ref(), &self.paths.full, |file| {
                let file = write_database(file, &schema, &records)?;
                Ok(((), file))
            });
            match written {
                Ok(()) => log::info!("Saved binary database {:?}", self.paths.full),
                Err(e) => log::warn!("Could not save binary version: {}", e),
            }
        }

        Ok(TierOutput {
            keys,
            schema,
            natural_record_bits,
            records: Some(records),
            source_report: Some(report),
        })
    }
}
