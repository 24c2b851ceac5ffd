//! Full database file readers.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::format::*;
use crate::schema::{Record, Schema};
use crate::storage::{FsStorage, Storage};
use crate::{Error, Result};

/// Progress is logged every this many scanned records.
const SCAN_PROGRESS_INTERVAL: u64 = 100_000;

/// Preamble and record count of a full database file.
#[derive(Debug, Clone)]
pub struct DatabaseHeader {
    pub schema: Arc<Schema>,
    pub record_count: u64,
}

impl DatabaseHeader {
    /// Read the header from the start of a full database file.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let schema = read_preamble(r)?;
        let record_count = read_u64(r, "record count")?;
        Ok(Self {
            schema: Arc::new(schema),
            record_count,
        })
    }

    /// Records to visit under an optional limit.
    fn bounded(&self, limit: Option<u64>) -> u64 {
        limit.map_or(self.record_count, |l| l.min(self.record_count))
    }
}

fn skip_record_values<R: Read>(r: &mut R, column_count: usize) -> Result<()> {
    for _ in 0..column_count {
        skip_value(r)?;
    }
    Ok(())
}

fn read_record_values<R: Read>(r: &mut R, column_count: usize) -> Result<Vec<Option<String>>> {
    let mut values = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        values.push(read_value(r)?);
    }
    Ok(values)
}

/// Scan every key of a full database file, skipping field data.
///
/// Keys are returned in record order, so position `i` is record `i`.
pub fn scan_keys<R: Read>(r: &mut R, limit: Option<u64>) -> Result<(Arc<Schema>, Vec<u64>)> {
    let header = DatabaseHeader::read(r)?;
    let total = header.bounded(limit);
    let column_count = header.schema.len();
    log::info!(
        "Scanning keys from binary: {} total records, {} columns",
        header.record_count,
        column_count
    );

    let mut keys = Vec::with_capacity(total.min(1 << 24) as usize);
    for i in 0..total {
        keys.push(read_u64(r, "record key")?);
        skip_record_values(r, column_count)?;

        if (i + 1) % SCAN_PROGRESS_INTERVAL == 0 {
            log::debug!("Scanned {} keys...", i + 1);
        }
    }
    Ok((header.schema, keys))
}

/// Decode every record of a full database file.
pub fn read_all_records<R: Read>(
    r: &mut R,
    limit: Option<u64>,
) -> Result<(Arc<Schema>, Vec<Record>)> {
    let header = DatabaseHeader::read(r)?;
    let total = header.bounded(limit);
    let column_count = header.schema.len();
    log::info!(
        "Loading records from binary: {} total records, {} columns",
        header.record_count,
        column_count
    );

    let mut records = Vec::with_capacity(total.min(1 << 20) as usize);
    for i in 0..total {
        let key = read_u64(r, "record key")?;
        let values = read_record_values(r, column_count)?;
        records.push(Record::new(key, header.schema.clone(), values));

        if (i + 1) % SCAN_PROGRESS_INTERVAL == 0 {
            log::debug!("Loaded {} records...", i + 1);
        }
    }
    Ok((header.schema, records))
}

/// Random-access reader for one full database file.
///
/// Every [`read`](RecordReader::read) opens the file independently, so a
/// reader can be shared between threads. There is no offset table: the
/// records before `index` are walked and skipped, so a read costs
/// O(index).
#[derive(Clone)]
pub struct RecordReader {
    path: PathBuf,
    schema: Arc<Schema>,
    storage: Arc<dyn Storage>,
}

impl RecordReader {
    /// Create a reader that labels fields with `schema`.
    pub fn new(path: impl Into<PathBuf>, schema: Arc<Schema>) -> Self {
        Self::with_storage(path, schema, Arc::new(FsStorage))
    }

    /// Create a reader that opens the file through `storage`.
    pub fn with_storage(
        path: impl Into<PathBuf>,
        schema: Arc<Schema>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            path: path.into(),
            schema,
            storage,
        }
    }

    /// Open a reader using the schema stored in the file itself.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = BufReader::new(FsStorage.open(&path)?);
        let header = DatabaseHeader::read(&mut file)?;
        Ok(Self::new(path, header.schema))
    }

    /// Path of the full database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema used to label decoded fields.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Decode the record at `index`.
    ///
    /// Stored values are matched to the caller's schema by position;
    /// columns the file does not have come back missing.
    pub fn read(&self, index: u64) -> Result<Record> {
        let mut file = BufReader::new(self.storage.open(&self.path)?);

        // The stored column names are skipped; only their count matters
        let column_count = read_u32(&mut file, "column count")? as usize;
        for _ in 0..column_count {
            let len = read_u32(&mut file, "column name length")?;
            file.seek_relative(i64::from(len))?;
        }
        let record_count = read_u64(&mut file, "record count")?;
        if index >= record_count {
            return Err(Error::IndexOutOfRange {
                index,
                count: record_count,
            });
        }

        for _ in 0..index {
            file.seek_relative(KEY_SIZE as i64)?;
            for _ in 0..column_count {
                let len = read_u32(&mut file, "value length")?;
                if len != MISSING_VALUE_LEN {
                    file.seek_relative(i64::from(len))?;
                }
            }
        }

        let key = read_u64(&mut file, "record key")?;
        let values = read_record_values(&mut file, column_count)?;
        Ok(Record::new(key, self.schema.clone(), values))
    }
}

/// Read the record at `index` of the full database file at `path`.
pub fn read_record(path: impl AsRef<Path>, schema: &Arc<Schema>, index: u64) -> Result<Record> {
    RecordReader::new(path.as_ref(), schema.clone()).read(index)
}
