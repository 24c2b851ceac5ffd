//! Keyed records from a tab-separated source.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;

use super::tsv::{TsvLine, TsvReader};
use crate::key::numeric_or_hash;
use crate::schema::Schema;
use crate::{Error, Result};

/// Why a source row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The line is not valid UTF-8
    InvalidUtf8,
    /// The row ends before the key column
    MissingKey { fields: usize, key_index: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidUtf8 => write!(f, "invalid UTF-8"),
            SkipReason::MissingKey { fields, key_index } => write!(
                f,
                "row has {} fields, key column is field {}",
                fields,
                key_index + 1
            ),
        }
    }
}

/// A source row that was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based physical line number (the header is line 1)
    pub line_number: u64,
    pub reason: SkipReason,
}

/// Next item from a [`SourceReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    /// A keyed row; one slot per schema column, `None` past the row's end
    Record {
        key: u64,
        values: Vec<Option<String>>,
    },
    /// A malformed row, skipped
    Skipped(SkippedRow),
}

/// Reads keyed rows from a tab-separated source whose first line names the
/// columns.
pub struct SourceReader {
    rows: TsvReader,
    schema: Arc<Schema>,
    key_index: usize,
}

impl SourceReader {
    /// Read the header and locate `key_column`.
    ///
    /// Fails with [`Error::KeyColumnMissing`] before any row is read when
    /// the column is not in the header.
    pub fn new<R: Read + Send + 'static>(reader: R, key_column: &str) -> Result<Self> {
        let mut rows = TsvReader::new(reader)?;
        let header = match rows.next_line()? {
            Some(TsvLine::Fields(header)) => header,
            Some(TsvLine::Invalid) => return Err(Error::InvalidUtf8("header row")),
            None => return Err(Error::MissingHeader),
        };

        let schema = Schema::new(header);
        let key_index = schema
            .position(key_column)
            .ok_or_else(|| Error::KeyColumnMissing(key_column.to_string()))?;

        Ok(Self {
            rows,
            schema: Arc::new(schema),
            key_index,
        })
    }

    /// Columns from the header row.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Position of the key column.
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    /// Read the next row, or `None` at end of input.
    pub fn next_item(&mut self) -> Result<Option<SourceItem>> {
        let line = match self.rows.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let line_number = self.rows.line_number();

        let fields = match line {
            TsvLine::Fields(fields) => fields,
            TsvLine::Invalid => {
                return Ok(Some(SourceItem::Skipped(SkippedRow {
                    line_number,
                    reason: SkipReason::InvalidUtf8,
                })))
            }
        };

        if self.key_index >= fields.len() {
            return Ok(Some(SourceItem::Skipped(SkippedRow {
                line_number,
                reason: SkipReason::MissingKey {
                    fields: fields.len(),
                    key_index: self.key_index,
                },
            })));
        }

        let key = numeric_or_hash(&fields[self.key_index]);
        let mut values: Vec<Option<String>> = fields
            .into_iter()
            .take(self.schema.len())
            .map(Some)
            .collect();
        values.resize(self.schema.len(), None);

        Ok(Some(SourceItem::Record { key, values }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &str, key: &str) -> Result<SourceReader> {
        SourceReader::new(Cursor::new(data.as_bytes().to_vec()), key)
    }

    #[test]
    fn test_locates_key_column() {
        let source = reader("name\tcode\n", "code").unwrap();
        assert_eq!(source.key_index(), 1);
        assert_eq!(source.schema().columns(), &["name", "code"]);
    }

    #[test]
    fn test_missing_key_column() {
        assert!(matches!(
            reader("name\tbrand\n", "code"),
            Err(Error::KeyColumnMissing(col)) if col == "code"
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(reader("", "code"), Err(Error::MissingHeader)));
    }

    #[test]
    fn test_rows() {
        let mut source = reader("code\tname\n1\tApple\nabc\n\tX\tY\n", "code").unwrap();

        assert_eq!(
            source.next_item().unwrap(),
            Some(SourceItem::Record {
                key: 1,
                values: vec![Some("1".into()), Some("Apple".into())],
            })
        );
        assert_eq!(
            source.next_item().unwrap(),
            Some(SourceItem::Record {
                key: numeric_or_hash("abc"),
                values: vec![Some("abc".into()), None],
            })
        );
        // Extra fields are dropped; an empty key hashes
        assert_eq!(
            source.next_item().unwrap(),
            Some(SourceItem::Record {
                key: numeric_or_hash(""),
                values: vec![Some("".into()), Some("X".into())],
            })
        );
        assert_eq!(source.next_item().unwrap(), None);
    }

    #[test]
    fn test_short_row_is_skipped() {
        let mut source = reader("name\tcode\nonly-name\n", "code").unwrap();
        assert_eq!(
            source.next_item().unwrap(),
            Some(SourceItem::Skipped(SkippedRow {
                line_number: 2,
                reason: SkipReason::MissingKey {
                    fields: 1,
                    key_index: 1
                },
            }))
        );
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::MissingKey {
            fields: 1,
            key_index: 1,
        };
        assert_eq!(reason.to_string(), "row has 1 fields, key column is field 2");
    }
}
