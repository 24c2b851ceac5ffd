//! pirdb - Product dataset loader for private information retrieval.
//!
//! This crate turns a large tab-separated product dump into a sequence of
//! integer keys, one per record, and gives random access to the full
//! record behind any position. A private retrieval protocol works over the
//! key sequence and the record bit-width; this crate only prepares and
//! serves the data.
//!
//! # Features
//!
//! - **Key derivation**: Numeric identifiers are used as-is, anything else
//!   is hashed to 64 bits
//! - **Streaming conversion**: Sources of any size are converted in one
//!   pass with bounded memory, gzip input included
//! - **Random access**: Any record can be read from the full database file
//!   without loading the rest
//! - **Tiered loading**: Keys-only cache, then full binary, then source,
//!   writing the faster representation for next time
//! - **Thread-safe**: Concurrent first use loads the database exactly once
//!
//! # Quick Start
//!
//! ```ignore
//! use pirdb::{CacheConfig, DatabaseCache};
//!
//! let cache = DatabaseCache::new(CacheConfig::for_source("db/products.csv"));
//!
//! // First call loads from the fastest tier available
//! let db = cache.get()?;
//! println!("{} records, {} bits", db.len(), db.record_bits());
//!
//! // Field data for a position
//! let record = db.record(0)?;
//! println!("{:?}", record.field_map());
//! ```
//!
//! # Conversion
//!
//! ```ignore
//! use pirdb::converter::convert;
//! use std::path::Path;
//!
//! let report = convert(Path::new("products.csv.gz"), Path::new("products.bin"), None)?;
//! println!("{} records, {} skipped", report.accepted_count, report.skipped_count());
//! ```
//!
//! # Lookup
//!
//! Identifiers are resolved against the key sequence and handed to a
//! [`RetrievalEngine`]. [`DirectRetrieval`] reads records in the clear:
//!
//! ```ignore
//! use pirdb::{lookup, DirectRetrieval};
//!
//! let result = lookup(&cache, &DirectRetrieval::new(), "3017620422003")?;
//! println!("{:?}", result.output.field_map());
//! ```

mod error;
mod global;
mod metadata;

pub mod binary;
pub mod cache;
pub mod config;
pub mod converter;
pub mod key;
pub mod lookup;
pub mod schema;
pub mod storage;

// Re-export core types
pub use error::{Error, Result};
pub use schema::{Record, Schema, MISSING};

// Re-export key derivation
pub use key::{bit_width_for_max, numeric_or_hash, remap_to_width};

// Re-export cache types
pub use cache::{DatabaseCache, LoadTier, LoadedDatabase};
pub use config::{CacheConfig, DatabasePaths};
pub use storage::{FsStorage, Storage};

// Re-export global API functions
pub use global::{global_cache, install_global_cache, is_installed, load_global};

// Re-export conversion
pub use converter::{convert, ConversionReport, StreamConverter};

// Re-export metadata
pub use metadata::ConversionMetadata;

// Re-export lookup
pub use lookup::{lookup, DirectRetrieval, KeyIndex, LookupResult, RetrievalEngine};

// Re-export binary reader types for advanced usage
pub use binary::{read_record, CachedRecordReader, KeysOnly, RecordReader};
