//! Tab-separated source reader.

use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Read};

use crate::Result;

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One physical line of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TsvLine {
    /// Tab-split fields
    Fields(Vec<String>),
    /// Line that could not be decoded as UTF-8
    Invalid,
}

/// Line-at-a-time tab-separated reader.
///
/// Only the current line is held in memory. Fields are split on `\t`
/// verbatim, without quote processing; a trailing `\r` is dropped and
/// blank lines are skipped.
pub struct TsvReader {
    inner: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
    line_number: u64,
}

impl TsvReader {
    /// Wrap a reader, transparently decompressing gzip input.
    ///
    /// Concatenated gzip members are read through to the last one.
    pub fn new<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let mut buffered = BufReader::with_capacity(256 * 1024, reader);
        let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

        let inner: Box<dyn BufRead + Send> = if is_gzip {
            log::debug!("Source is gzip-compressed");
            Box::new(BufReader::with_capacity(
                256 * 1024,
                MultiGzDecoder::new(buffered),
            ))
        } else {
            Box::new(buffered)
        };

        Ok(Self {
            inner,
            buf: Vec::new(),
            line_number: 0,
        })
    }

    /// 1-based number of the line last returned.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Read the next non-blank line, or `None` at end of input.
    pub fn next_line(&mut self) -> Result<Option<TsvLine>> {
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let mut line = self.buf.as_slice();
            if let Some(rest) = line.strip_suffix(b"\n") {
                line = rest;
            }
            if let Some(rest) = line.strip_suffix(b"\r") {
                line = rest;
            }
            if line.is_empty() {
                continue;
            }

            return Ok(Some(match std::str::from_utf8(line) {
                Ok(text) => TsvLine::Fields(text.split('\t').map(str::to_string).collect()),
                Err(_) => TsvLine::Invalid,
            }));
        }
    }
}
