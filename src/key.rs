//! Key derivation.
//!
//! Every record is addressed by a 64-bit key taken from its key column:
//! the column text parsed as an unsigned decimal integer, or a DJB2-style
//! string hash when it is not numeric.

/// Seed of the rolling string hash.
pub const HASH_SEED: u64 = 5381;

/// Record bit-width reported for an empty or all-zero key set.
pub const DEFAULT_RECORD_BITS: u64 = 32;

/// Derive the key for an identifier.
///
/// Surrounding whitespace is ignored for the numeric parse, but the hash is
/// computed over the identifier exactly as given.
pub fn numeric_or_hash(text: &str) -> u64 {
    parse_unsigned(text.trim()).unwrap_or_else(|| string_hash(text))
}

/// Rolling multiplicative hash: `hash = hash * 33 + c` over every character,
/// wrapping modulo 2^64.
///
/// Not collision resistant.
pub fn string_hash(text: &str) -> u64 {
    text.chars().fold(HASH_SEED, |hash, c| {
        hash.wrapping_mul(33).wrapping_add(u64::from(c))
    })
}

fn parse_unsigned(text: &str) -> Option<u64> {
    // `u64::from_str` accepts a leading '+', plain decimal digits only here
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Minimum byte-aligned bit-width that can hold `max_key`.
///
/// Equals `ceil(log2(max_key + 1))` rounded up to a multiple of 8, or
/// [`DEFAULT_RECORD_BITS`] when `max_key == 0`.
pub fn bit_width_for_max(max_key: u64) -> u64 {
    if max_key == 0 {
        return DEFAULT_RECORD_BITS;
    }
    let bits = u64::from(u64::BITS - max_key.leading_zeros());
    (bits + 7) / 8 * 8
}

/// [`bit_width_for_max`] over the largest key of a key set.
pub fn bit_width_for_keys(keys: &[u64]) -> u64 {
    bit_width_for_max(keys.iter().copied().max().unwrap_or(0))
}

/// Replace every key with `key mod 2^width`.
///
/// This is lossy: distinct keys may fold onto the same value and no
/// collision is reported. Widths of 64 or more leave keys unchanged.
pub fn remap_to_width(keys: &mut [u64], width: u64) {
    if let Some(modulus) = width_modulus(width) {
        for key in keys.iter_mut() {
            *key %= modulus;
        }
    }
}

/// Reduce a single key to `width` bits, as [`remap_to_width`] does.
pub fn narrow_key(key: u64, width: u64) -> u64 {
    match width_modulus(width) {
        Some(modulus) => key % modulus,
        None => key,
    }
}

fn width_modulus(width: u64) -> Option<u64> {
    if width >= 64 {
        None
    } else {
        Some(1u64 << width)
    }
}

/// Apply a caller-requested record width to a key set.
///
/// Narrower than `natural` remaps the keys; wider (or equal) leaves them
/// as they are. A requested width of 0 is no override. Returns the width
/// to report.
pub fn apply_width_override(keys: &mut [u64], natural: u64, requested: Option<u64>) -> u64 {
    match requested.filter(|width| *width > 0) {
        Some(width) if width < natural => {
            log::info!(
                "Narrowing {}-bit keys to {} bits; colliding keys are not detected",
                natural,
                width
            );
            remap_to_width(keys, width);
            width
        }
        Some(width) => width,
        None => natural,
    }
}
