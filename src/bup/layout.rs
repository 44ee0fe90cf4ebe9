// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Raw on-disk records. Every field is little-endian and nothing is padded.

use core::mem::{offset_of, size_of};

use zerocopy::{little_endian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic value at the start of every blob.
pub const BUP_MAGIC: [u8; 16] = *b"NVIDIA__BLOB__V3";

/// Size of the `part_name` field.
pub const PART_NAME_SIZE: usize = 40;
/// Longest partition name accepted (the GPT limit).
pub const PART_NAME_MAX: usize = 36;
/// Size of the `spec_info` field.
pub const SPEC_INFO_SIZE: usize = 128;

pub const HEADER_LEN: usize = size_of::<RawHeader>();
pub const UPDATE_ENTRY_LEN: usize = size_of::<RawUpdateEntry>();
pub const BMP_ENTRY_LEN: usize = size_of::<RawBmpEntry>();

/// Offsets of the fields patched once every payload has been written.
pub const BLOB_SIZE_OFFSET: u64 = offset_of!(RawHeader, blob_size) as u64;
pub const UNCOMP_BLOB_SIZE_OFFSET: u64 = offset_of!(RawHeader, uncomp_blob_size) as u64;

/// Raw on-disk layout of the blob header.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
pub struct RawHeader {
    /// Magic value. This should be equal to [`BUP_MAGIC`].
    pub magic: [u8; 16],
    pub version: little_endian::U32,
    /// Size of the whole file
    pub blob_size: little_endian::U32,
    /// Size of this header plus the accessory
    pub header_size: little_endian::U32,
    pub entry_count: little_endian::U32,
    pub blob_type: little_endian::U32,
    pub uncomp_blob_size: little_endian::U32,
}

/// Raw on-disk layout of an update entry.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
pub struct RawUpdateEntry {
    pub part_name: [u8; PART_NAME_SIZE],
    pub offset: little_endian::U32,
    pub length: little_endian::U32,
    pub version: little_endian::U32,
    pub op_mode: little_endian::U32,
    pub spec_info: [u8; SPEC_INFO_SIZE],
}

/// Raw on-disk layout of a BMP entry.
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(packed)]
pub struct RawBmpEntry {
    pub bmp_type: little_endian::U32,
    pub offset: little_endian::U32,
    pub length: little_endian::U32,
    pub resolution: little_endian::U32,
    pub reserved: [u8; 36],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(HEADER_LEN, 40);
        assert_eq!(UPDATE_ENTRY_LEN, 184);
        assert_eq!(BMP_ENTRY_LEN, 52);
        assert_eq!(BLOB_SIZE_OFFSET, 20);
        assert_eq!(UNCOMP_BLOB_SIZE_OFFSET, 36);
    }

    #[test]
    fn header_is_little_endian() {
        let header = RawHeader {
            magic: BUP_MAGIC,
            version: 0x0103_0622.into(),
            blob_size: 0.into(),
            header_size: 40.into(),
            entry_count: 1.into(),
            blob_type: 0.into(),
            uncomp_blob_size: 0.into(),
        };

        let bytes = header.as_bytes();
        assert_eq!(&bytes[..16], b"NVIDIA__BLOB__V3");
        assert_eq!(&bytes[16..20], &[0x22, 0x06, 0x03, 0x01]);
        assert_eq!(&bytes[24..28], &[40, 0, 0, 0]);
    }
}
