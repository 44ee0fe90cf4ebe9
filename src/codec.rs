// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level helpers shared by the BUP and DTB formats.
//!
//! Fixed layouts themselves are packed [`zerocopy`] records built from
//! byte-order types: `little_endian::U32` for BUP records and
//! `big_endian::U32` for the FDT header and the DTBCHECK trailer. The helpers
//! here cover what those records can't express on their own: alignment,
//! NUL-padded string fields and loose big-endian reads.

use thiserror::Error;

/// Whitespace and padding stripped from fixed-width string fields.
const FIELD_TRIM: &[char] = &[' ', '\t', '\n', '\0'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{field} is too long ({len} > {limit}): {value}")]
    StringTooLong { field: &'static str, value: String, len: usize, limit: usize },
    #[error("{field} is not UTF-8 encoded")]
    StringNotUtf8 { field: &'static str },
    #[error("{field} does not fit in a 32-bit field: {value}")]
    ValueTooLarge { field: &'static str, value: u64 },
}

/// Rounds `n` up to the next multiple of `b`.
#[inline]
pub const fn align(n: usize, b: usize) -> usize {
    n.div_ceil(b) * b
}

/// Number of padding bytes needed to bring `n` up to a multiple of `b`.
#[inline]
pub const fn padding_len(n: usize, b: usize) -> usize {
    align(n, b) - n
}

/// Packs `value` into an `N`-byte NUL-padded field.
///
/// `limit` is the longest string accepted, which may be shorter than the
/// field itself (partition names are capped at the GPT limit of 36 even though
/// the field holds 40 bytes).
pub fn pack_cstr<const N: usize>(
    field: &'static str,
    value: &str,
    limit: usize,
) -> Result<[u8; N], CodecError> {
    let bytes = value.as_bytes();
    let limit = limit.min(N);

    if bytes.len() > limit {
        return Err(CodecError::StringTooLong {
            field,
            value: value.to_owned(),
            len: bytes.len(),
            limit,
        });
    }

    let mut out = [0u8; N];
    out[..bytes.len()].copy_from_slice(bytes);

    Ok(out)
}

/// Decodes a NUL-padded field, trimming padding and surrounding whitespace.
pub fn unpack_cstr<'a>(field: &'static str, bytes: &'a [u8]) -> Result<&'a str, CodecError> {
    core::str::from_utf8(bytes)
        .map(|s| s.trim_matches(FIELD_TRIM))
        .map_err(|_| CodecError::StringNotUtf8 { field })
}

/// Narrows a length or offset to a 32-bit on-disk field.
pub fn to_u32(field: &'static str, value: u64) -> Result<u32, CodecError> {
    u32::try_from(value).map_err(|_| CodecError::ValueTooLarge { field, value })
}

/// Reads a big-endian `u32` at `offset`, if the slice is long enough.
#[inline]
pub fn be_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes(raw.try_into().ok()?))
}
