//! Column schema and decoded records.

use std::collections::HashMap;
use std::sync::Arc;

/// Marker rendered for a column the record has no value for.
///
/// Distinct from an empty string, which is a present value.
pub const MISSING: &str = "<missing>";

/// Ordered column names shared by every record of one database file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Create a schema from column names in physical order.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Column names in physical order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the first column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

impl<S: Into<String>> FromIterator<S> for Schema {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// One decoded record.
///
/// Holds one slot per schema column; `None` marks a field the source row
/// did not have. The schema is shared, not copied, between records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: u64,
    schema: Arc<Schema>,
    values: Vec<Option<String>>,
}

impl Record {
    /// Create a record; `values` is padded with missing slots or truncated
    /// to the schema length.
    pub fn new(key: u64, schema: Arc<Schema>, mut values: Vec<Option<String>>) -> Self {
        values.resize(schema.len(), None);
        Self {
            key,
            schema,
            values,
        }
    }

    /// The record key.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The shared schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Values in schema order.
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Value of `column`, or `None` when absent or not in the schema.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.schema.position(column)?;
        self.values.get(idx)?.as_deref()
    }

    /// Whether `column` has no value in this record.
    pub fn is_missing(&self, column: &str) -> bool {
        self.get(column).is_none()
    }

    /// `(column, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.schema
            .columns()
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_deref()))
    }

    /// Column-to-value map with absent fields rendered as [`MISSING`].
    pub fn field_map(&self) -> HashMap<String, String> {
        self.fields()
            .map(|(c, v)| (c.to_string(), v.unwrap_or(MISSING).to_string()))
            .collect()
    }
}
