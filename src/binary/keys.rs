//! Keys-only cache file reader with memory-mapping support.

use memmap2::Mmap;
use std::fs::File;
use std::sync::Arc;

use super::format::*;
use crate::schema::Schema;
use crate::{Error, Result};

/// Decoded keys-only cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysOnly {
    /// Schema copied from the full database file
    pub schema: Arc<Schema>,
    /// Record bit-width recorded when the cache was written
    pub record_bits: u64,
    /// Keys in record order
    pub keys: Vec<u64>,
}

impl KeysOnly {
    /// Decode a keys-only cache file, keeping at most `limit` keys.
    pub fn load(file: &File, limit: Option<u64>) -> Result<Self> {
        if file.metadata()?.len() == 0 {
            return Err(Error::TruncatedFile("column count"));
        }
        let mmap = unsafe { Mmap::map(file)? };
        Self::from_bytes(&mmap, limit)
    }

    /// Decode a keys-only cache from bytes.
    pub fn from_bytes(data: &[u8], limit: Option<u64>) -> Result<Self> {
        let mut cursor = data;
        let schema = read_preamble(&mut cursor)?;
        let record_bits = read_u64(&mut cursor, "record bit-width")?;
        let key_count = read_u64(&mut cursor, "key count")?;

        let wanted = limit.map_or(key_count, |l| l.min(key_count));
        let available = (cursor.len() / KEY_SIZE) as u64;
        if available < wanted {
            return Err(Error::TruncatedFile("keys"));
        }

        let keys = cursor
            .chunks_exact(KEY_SIZE)
            .take(wanted as usize)
            .map(|chunk| {
                let mut buf = [0u8; KEY_SIZE];
                buf.copy_from_slice(chunk);
                u64::from_le_bytes(buf)
            })
            .collect();

        Ok(Self {
            schema: Arc::new(schema),
            record_bits,
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write_keys_only;
    use std::io::Write;

    fn sample() -> Vec<u8> {
        let schema = Schema::from_iter(["code", "name"]);
        write_keys_only(Vec::new(), &schema, 16, &[1, 2, 300]).unwrap()
    }

    #[test]
    fn test_decode_keys_only() {
        let decoded = KeysOnly::from_bytes(&sample(), None).unwrap();
        assert_eq!(decoded.schema.columns(), &["code", "name"]);
        assert_eq!(decoded.record_bits, 16);
        assert_eq!(decoded.keys, vec![1, 2, 300]);
    }

    #[test]
    fn test_decode_with_limit() {
        let decoded = KeysOnly::from_bytes(&sample(), Some(2)).unwrap();
        assert_eq!(decoded.keys, vec![1, 2]);
    }

    #[test]
    fn test_truncated_keys() {
        let mut data = sample();
        data.truncate(data.len() - 1);
        assert!(matches!(
            KeysOnly::from_bytes(&data, None),
            Err(Error::TruncatedFile("keys"))
        ));
        // The first two keys are still intact
        assert_eq!(KeysOnly::from_bytes(&data, Some(2)).unwrap().keys, vec![1, 2]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&sample()).unwrap();
        let decoded = KeysOnly::load(&file, None).unwrap();
        assert_eq!(decoded.keys, vec![1, 2, 300]);
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::tempfile().unwrap();
        assert!(matches!(
            KeysOnly::load(&file, None),
            Err(Error::TruncatedFile(_))
        ));
    }
}
