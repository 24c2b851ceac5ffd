//! Conversion from tab-separated sources to the binary layouts.

mod source;
mod stream;
mod tsv;

pub use source::{SkipReason, SkippedRow, SourceItem, SourceReader};
pub use stream::{convert, ConversionReport, ConvertOptions, StreamConverter, DEFAULT_KEY_COLUMN};
pub use tsv::{TsvLine, TsvReader};
