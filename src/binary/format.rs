//! Binary format constants and primitive codecs.
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use crate::schema::Schema;
use crate::{Error, Result};

/// Reserved value length marking a field the source row did not have.
///
/// Followed by no value bytes. An empty string is length 0.
pub const MISSING_VALUE_LEN: u32 = u32::MAX;

/// Size of the `u64` record count that follows the preamble.
pub const RECORD_COUNT_SIZE: u64 = 8;

/// Size of a stored key.
pub const KEY_SIZE: usize = 8;

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u32<R: Read>(r: &mut R, context: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|e| Error::from_read(e, context))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, context: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|e| Error::from_read(e, context))?;
    Ok(u64::from_le_bytes(buf))
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_bytes<R: Read>(r: &mut R, len: u32, context: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.by_ref().take(u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(Error::TruncatedFile(context));
    }
    Ok(buf)
}

fn length_of(text: &str) -> Result<u32> {
    u32::try_from(text.len())
        .ok()
        .filter(|len| *len != MISSING_VALUE_LEN)
        .ok_or_else(|| Error::Config(format!("value of {} bytes is too long", text.len())))
}

/// Write the column preamble: `u32 column_count`, then each name as
/// `u32 length` + raw bytes.
pub fn write_preamble<W: Write>(w: &mut W, schema: &Schema) -> Result<()> {
    write_u32(w, schema.len() as u32)?;
    for column in schema.columns() {
        write_u32(w, length_of(column)?)?;
        w.write_all(column.as_bytes())?;
    }
    Ok(())
}

/// Read the column preamble.
pub fn read_preamble<R: Read>(r: &mut R) -> Result<Schema> {
    let count = read_u32(r, "column count")?;
    let mut columns = Vec::new();
    for _ in 0..count {
        let len = read_u32(r, "column name length")?;
        let bytes = read_bytes(r, len, "column name")?;
        let name = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8("column name"))?;
        columns.push(name);
    }
    Ok(Schema::new(columns))
}

/// Encoded size of the column preamble.
pub fn preamble_len(schema: &Schema) -> u64 {
    4 + schema
        .columns()
        .iter()
        .map(|c| 4 + c.len() as u64)
        .sum::<u64>()
}

/// Write one field slot.
pub fn write_value<W: Write>(w: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        Some(text) => {
            write_u32(w, length_of(text)?)?;
            w.write_all(text.as_bytes())?;
        }
        None => write_u32(w, MISSING_VALUE_LEN)?,
    }
    Ok(())
}

/// Read one field slot.
pub fn read_value<R: Read>(r: &mut R) -> Result<Option<String>> {
    let len = read_u32(r, "value length")?;
    if len == MISSING_VALUE_LEN {
        return Ok(None);
    }
    let bytes = read_bytes(r, len, "value")?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| Error::InvalidUtf8("record value"))
}

/// Skip one field slot without decoding it.
pub fn skip_value<R: Read>(r: &mut R) -> Result<()> {
    let len = read_u32(r, "value length")?;
    if len != MISSING_VALUE_LEN {
        skip_bytes(r, u64::from(len), "value")?;
    }
    Ok(())
}

/// Skip `len` bytes, failing if the stream ends first.
pub(crate) fn skip_bytes<R: Read>(r: &mut R, len: u64, context: &'static str) -> Result<()> {
    let skipped = std::io::copy(&mut r.by_ref().take(len), &mut std::io::sink())?;
    if skipped != len {
        return Err(Error::TruncatedFile(context));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_preamble_layout() {
        let schema = Schema::from_iter(["code", "name"]);
        let mut buf = Vec::new();
        write_preamble(&mut buf, &schema).unwrap();

        assert_eq!(buf.len() as u64, preamble_len(&schema));
        assert_eq!(&buf[0..4], &2u32.to_le_bytes());
        assert_eq!(&buf[4..8], &4u32.to_le_bytes());
        assert_eq!(&buf[8..12], b"code");

        let decoded = read_preamble(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, schema);
    }

    #[test]
    fn test_empty_value_keeps_length_prefix() {
        let mut buf = Vec::new();
        write_value(&mut buf, Some("")).unwrap();
        assert_eq!(buf, 0u32.to_le_bytes());
        assert_eq!(read_value(&mut Cursor::new(&buf)).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_missing_value_marker() {
        let mut buf = Vec::new();
        write_value(&mut buf, None).unwrap();
        assert_eq!(buf, MISSING_VALUE_LEN.to_le_bytes());
        assert_eq!(read_value(&mut Cursor::new(&buf)).unwrap(), None);
    }

    #[test]
    fn test_truncated_value() {
        let mut buf = Vec::new();
        write_value(&mut buf, Some("Banana")).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_value(&mut Cursor::new(&buf)),
            Err(Error::TruncatedFile("value"))
        ));
        assert!(matches!(
            skip_value(&mut Cursor::new(&buf)),
            Err(Error::TruncatedFile("value"))
        ));
    }

    #[test]
    fn test_truncated_preamble() {
        let schema = Schema::from_iter(["code"]);
        let mut buf = Vec::new();
        write_preamble(&mut buf, &schema).unwrap();
        for len in 0..buf.len() {
            assert!(read_preamble(&mut Cursor::new(&buf[..len])).is_err());
        }
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(u32::MAX - 1).to_le_bytes());
        assert!(matches!(
            read_preamble(&mut Cursor::new(&buf)),
            Err(Error::TruncatedFile("column name"))
        ));
    }
}
