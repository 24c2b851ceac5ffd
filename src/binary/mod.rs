//! Binary database layouts.
//!
//! Two little-endian layouts share a column preamble:
//!
//! ```text
//! COLUMN PREAMBLE
//! +---------------------+
//! | u32 column_count    |
//! | u32 name_len, bytes |  x column_count
//! +---------------------+
//!
//! FULL DATABASE                         KEYS-ONLY CACHE
//! +---------------------+               +---------------------+
//! |  COLUMN PREAMBLE    |               |  COLUMN PREAMBLE    |
//! +---------------------+               +---------------------+
//! | u64 record_count    |  back-patched | u64 record_bits     |
//! +---------------------+               | u64 key_count       |
//! | u64 key             |               +---------------------+
//! | u32 len, bytes      |  x columns    | u64 key             |  x key_count
//! +---------------------+  x records    +---------------------+
//! ```
//!
//! Every record carries one value slot per column, in preamble order.
//! A slot length of [`MISSING_VALUE_LEN`] marks an absent field.

mod cached_reader;
mod format;
mod keys;
mod reader;
mod writer;


pub use cached_reader::{CacheStats, CachedReaderConfig, CachedRecordReader};
pub use format::*;
pub use keys::KeysOnly;
pub use reader::{read_all_records, read_record, scan_keys, DatabaseHeader, RecordReader};
pub use writer::{write_database, write_keys_only, DatabaseWriter};
