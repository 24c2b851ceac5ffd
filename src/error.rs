//! Error types for pirdb.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Error type for pirdb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// None of the keys-only cache, full binary file or source file exist
    #[error(
        "no database source found (looked for {keys_path:?}, {full_path:?}, {source_path:?})"
    )]
    SourceNotFound {
        keys_path: PathBuf,
        full_path: PathBuf,
        source_path: PathBuf,
    },

    /// Configured key column is absent from the source header
    #[error("key column '{0}' not found in header")]
    KeyColumnMissing(String),

    /// Source file has no header row
    #[error("source file has no header row")]
    MissingHeader,

    /// A binary read ran out of bytes
    #[error("truncated file while reading {0}")]
    TruncatedFile(&'static str),

    /// Record index past the end of the file
    #[error("record index {index} out of range ({count} records)")]
    IndexOutOfRange { index: u64, count: u64 },

    /// Stored text is not valid UTF-8
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Global cache not installed
    #[error("database cache not initialized")]
    NotInitialized,

    /// Identifier does not resolve to any record
    #[error("identifier '{0}' not found")]
    IdentifierNotFound(String),

    /// Retrieval engine failure
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The one-time database load failed; shared by every caller
    #[error("database load failed: {0}")]
    LoadFailed(Arc<Error>),
}

/// Result type alias for pirdb operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an unexpected EOF onto [`Error::TruncatedFile`], keeping other IO errors.
    pub(crate) fn from_read(err: std::io::Error, context: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::TruncatedFile(context)
        } else {
            Error::Io(err)
        }
    }

    /// The underlying error for a shared load failure, or `self`.
    pub fn root(&self) -> &Error {
        match self {
            Error::LoadFailed(inner) => inner.root(),
            other => other,
        }
    }
}
