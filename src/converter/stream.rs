//! Streaming converter from a tab-separated source to the full database
//! layout.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::source::{SkippedRow, SourceItem, SourceReader};
use crate::binary::DatabaseWriter;
use crate::key::bit_width_for_max;
use crate::storage::{write_atomically, FsStorage, Storage};
use crate::Result;

/// Key column used when none is configured.
pub const DEFAULT_KEY_COLUMN: &str = "code";

/// Progress is logged every this many streamed records.
const PROGRESS_INTERVAL: u64 = 50_000;

/// Outcome of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Records written
    pub accepted_count: u64,
    /// Rows that were skipped, in source order
    pub skipped_rows: Vec<SkippedRow>,
    /// Largest key written
    pub max_key: u64,
    /// Natural record bit-width of the written keys
    pub record_bits: u64,
    /// Whether the record limit stopped the conversion early
    pub truncated: bool,
}

impl ConversionReport {
    /// Number of skipped rows.
    pub fn skipped_count(&self) -> usize {
        self.skipped_rows.len()
    }
}

/// Options for [`StreamConverter`].
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Header name of the key column
    pub key_column: String,
    /// Stop after this many records
    pub max_records: Option<u64>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            max_records: None,
        }
    }
}

/// Converts a tab-separated source into the full database layout in one
/// forward pass.
///
/// Only one row is held in memory at a time. The output is written to a
/// temporary file and renamed over the destination once complete, so a
/// failed conversion never replaces an existing database.
pub struct StreamConverter {
    options: ConvertOptions,
    storage: Arc<dyn Storage>,
}

impl StreamConverter {
    /// Create a converter with the given options.
    pub fn new(options: ConvertOptions) -> Self {
        Self::with_storage(options, Arc::new(FsStorage))
    }

    /// Create a converter that accesses files through `storage`.
    pub fn with_storage(options: ConvertOptions, storage: Arc<dyn Storage>) -> Self {
        Self { options, storage }
    }

    /// Convert `source_path` into a full database file at `dest_path`.
    pub fn convert(&self, source_path: &Path, dest_path: &Path) -> Result<ConversionReport> {
        let file = self.storage.open(source_path)?;
        // Header check happens before the destination is touched
        let source = SourceReader::new(file, &self.options.key_column)?;

        log::info!(
            "Converting {:?} with {} columns, using '{}' as key",
            source_path,
            source.schema().len(),
            self.options.key_column
        );
        if let Some(max) = self.options.max_records {
            log::info!("Converting up to {} records", max);
        }

        let report = write_atomically(self.storage.as_ref(), dest_path, |file| {
            self.stream(source, file)
        })?;

        log::info!(
            "Conversion completed: {} records saved to {:?}, {} rows skipped",
            report.accepted_count,
            dest_path,
            report.skipped_count()
        );
        Ok(report)
    }

    /// Stream records from `source` into `file`.
    fn stream(
        &self,
        mut source: SourceReader,
        file: std::fs::File,
    ) -> Result<(ConversionReport, std::fs::File)> {
        let schema = source.schema().clone();
        let mut writer = DatabaseWriter::new(file, &schema)?;
        let mut report = ConversionReport::default();

        while let Some(item) = source.next_item()? {
            match item {
                SourceItem::Record { .. }
                    if self
                        .options
                        .max_records
                        .is_some_and(|max| report.accepted_count >= max) =>
                {
                    log::info!("Reached maximum record limit of {}", report.accepted_count);
                    report.truncated = true;
                    break;
                }
                SourceItem::Record { key, values } => {
                    writer.write_record(key, values.iter().map(|v| v.as_deref()))?;
                    report.accepted_count += 1;
                    report.max_key = report.max_key.max(key);

                    if report.accepted_count % PROGRESS_INTERVAL == 0 {
                        log::debug!("Streamed {} records...", report.accepted_count);
                    }
                }
                SourceItem::Skipped(row) => {
                    log::warn!("Skipping row at line {}: {}", row.line_number, row.reason);
                    report.skipped_rows.push(row);
                }
            }
        }

        report.record_bits = bit_width_for_max(report.max_key);
        let file = writer.finish()?;
        Ok((report, file))
    }
}

/// Convert `source_path` to `dest_path` with the default key column.
pub fn convert(
    source_path: impl AsRef<Path>,
    dest_path: impl AsRef<Path>,
    max_records: Option<u64>,
) -> Result<ConversionReport> {
    let options = ConvertOptions {
        max_records,
        ..ConvertOptions::default()
    };
    StreamConverter::new(options).convert(source_path.as_ref(), dest_path.as_ref())
}
