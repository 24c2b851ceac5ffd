//! Binary database writers.

use std::io::{BufWriter, Seek, SeekFrom, Write};

use super::format::*;
use crate::schema::{Record, Schema};
use crate::{Error, Result};

/// Streaming writer for the full database layout.
///
/// The record count is not known until the last record, so [`new`] writes
/// a zero placeholder after the preamble and remembers its offset;
/// [`finish`] seeks back and overwrites it with the real count.
///
/// [`new`]: DatabaseWriter::new
/// [`finish`]: DatabaseWriter::finish
pub struct DatabaseWriter<W: Write + Seek> {
    out: BufWriter<W>,
    count_offset: u64,
    column_count: usize,
    record_count: u64,
}

impl<W: Write + Seek> DatabaseWriter<W> {
    /// Write the preamble and the record count placeholder.
    pub fn new(inner: W, schema: &Schema) -> Result<Self> {
        let mut out = BufWriter::with_capacity(1024 * 1024, inner);
        write_preamble(&mut out, schema)?;
        let count_offset = out.stream_position()?;
        write_u64(&mut out, 0)?;

        Ok(Self {
            out,
            count_offset,
            column_count: schema.len(),
            record_count: 0,
        })
    }

    /// Append one record.
    ///
    /// Exactly one slot per schema column is written: values past the
    /// schema are dropped, and a short row is padded with missing slots.
    pub fn write_record<'a, I>(&mut self, key: u64, values: I) -> Result<()>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        write_u64(&mut self.out, key)?;
        let mut values = values.into_iter();
        for _ in 0..self.column_count {
            write_value(&mut self.out, values.next().flatten())?;
        }
        self.record_count += 1;
        Ok(())
    }

    /// Append a decoded record.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.write_record(record.key(), record.values().iter().map(|v| v.as_deref()))
    }

    /// Records written so far.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Back-patch the record count, flush, and return the inner writer
    /// positioned at the end of the data.
    pub fn finish(mut self) -> Result<W> {
        self.out.seek(SeekFrom::Start(self.count_offset))?;
        write_u64(&mut self.out, self.record_count)?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        self.out
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

/// Write a complete full database from in-memory records.
pub fn write_database<W: Write + Seek>(inner: W, schema: &Schema, records: &[Record]) -> Result<W> {
    let mut writer = DatabaseWriter::new(inner, schema)?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()
}

/// Write the keys-only cache layout: preamble, `u64 record_bits`,
/// `u64 key_count`, then the raw keys.
pub fn write_keys_only<W: Write>(
    inner: W,
    schema: &Schema,
    record_bits: u64,
    keys: &[u64],
) -> Result<W> {
    let mut out = BufWriter::with_capacity(1024 * 1024, inner);
    write_preamble(&mut out, schema)?;
    write_u64(&mut out, record_bits)?;
    write_u64(&mut out, keys.len() as u64)?;
    for key in keys {
        write_u64(&mut out, *key)?;
    }
    out.flush()?;
    out.into_inner().map_err(|e| Error::Io(e.into_error()))
}
