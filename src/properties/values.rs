// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid property value")]
pub struct InvalidPropertyValue;

pub trait PropertyValue<'a>: Sized {
    fn parse(value: &'a [u8]) -> Result<Self, InvalidPropertyValue>;
}

impl<'a> PropertyValue<'a> for u32 {
    #[inline]
    fn parse(value: &'a [u8]) -> Result<Self, InvalidPropertyValue> {
        match value {
            [a, b, c, d] => Ok(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => Err(InvalidPropertyValue),
        }
    }
}

impl<'a> PropertyValue<'a> for u64 {
    #[inline]
    fn parse(value: &'a [u8]) -> Result<Self, InvalidPropertyValue> {
        match value {
            [a, b, c, d] => Ok(u64::from_be_bytes([0, 0, 0, 0, *a, *b, *c, *d])),
            [a, b, c, d, e, f, g, h] => Ok(u64::from_be_bytes([*a, *b, *c, *d, *e, *f, *g, *h])),
            _ => Err(InvalidPropertyValue),
        }
    }
}

impl<'a> PropertyValue<'a> for &'a str {
    #[inline]
    fn parse(value: &'a [u8]) -> Result<Self, InvalidPropertyValue> {
        core::str::from_utf8(value).map(|s| s.trim_end_matches('\0')).map_err(|_| InvalidPropertyValue)
    }
}

#[derive(Debug, Clone)]
pub struct StringList<'a> {
    strs: core::str::Split<'a, char>,
}

impl<'a> PropertyValue<'a> for StringList<'a> {
    #[inline]
    fn parse(value: &'a [u8]) -> Result<Self, InvalidPropertyValue> {
        Ok(Self { strs: <&'a str as PropertyValue<'a>>::parse(value)?.split('\0') })
    }
}

impl<'a> Iterator for StringList<'a> {
    type Item = &'a str;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        self.strs.next()
    }
}

/// A fixed-width big-endian element of a property array.
///
/// Properties carry no type information of their own; the schema decides
/// whether a value is read as `u8`, `u32`, `s32`, `u64` or `f32` cells.
pub trait Cell: Copy + PartialOrd + core::fmt::Debug {
    /// Encoded width in bytes
    const SIZE: usize;
    /// Short type name used in diagnostics
    const NAME: &'static str;

    /// Decodes one element; `bytes` is exactly [`Cell::SIZE`] long.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_cell {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Cell for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();
                const NAME: &'static str = $name;

                #[inline]
                fn decode(bytes: &[u8]) -> Option<Self> {
                    Some(<$ty>::from_be_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}

impl_cell! {
    u8 => "u8",
    u32 => "u32",
    i32 => "s32",
    u64 => "u64",
    f32 => "float",
}

/// Decodes `value` as consecutive big-endian cells. Returns `None` when the
/// length is not a multiple of the cell width.
pub fn decode_array<T: Cell>(value: &[u8]) -> Option<Vec<T>> {
    if value.len() % T::SIZE != 0 {
        return None;
    }

    value.chunks_exact(T::SIZE).map(T::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_cells() {
        let raw = [0x00, 0x00, 0x00, 0x05, 0xff, 0xff, 0xff, 0xfe];

        assert_eq!(decode_array::<u32>(&raw), Some(vec![5, 0xffff_fffe]));
        assert_eq!(decode_array::<i32>(&raw), Some(vec![5, -2]));
        assert_eq!(decode_array::<u64>(&raw), Some(vec![0x0000_0005_ffff_fffe]));
        assert_eq!(decode_array::<u8>(&raw[..3]), Some(vec![0, 0, 0]));
        assert_eq!(decode_array::<u32>(&raw[..6]), None);
        assert_eq!(decode_array::<u32>(&[]), Some(vec![]));
    }

    #[test]
    fn decode_float() {
        let raw = 1.5f32.to_be_bytes();
        assert_eq!(decode_array::<f32>(&raw), Some(vec![1.5]));
    }

    #[test]
    fn string_list() {
        let list: Vec<_> = StringList::parse(b"vrs-11\0vrs-11-quirks\0").unwrap().collect();
        assert_eq!(list, ["vrs-11", "vrs-11-quirks"]);
    }
}
