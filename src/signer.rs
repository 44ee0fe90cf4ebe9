// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Trailer signing of validated DTBs.
//!
//! A signed DTB is the original blob with `totalsize` bumped, zero padding, a
//! 16-byte metadata record and a CRC-32 over everything before it, so that
//! the total length is a multiple of 64 bytes:
//!
//! ```text
//! | header' | body | padding | major_rev chip_id tool_version "DTBC" | crc |
//! ```
//!
//! All trailer fields are big-endian.

use crc::{Crc, CRC_32_ISO_HDLC};
use log::debug;
use thiserror::Error;
use zerocopy::{big_endian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    chip::ChipInfo,
    codec,
    parsing::{FdtError, FdtHeader, FDT_HEADER_LEN},
};

/// "DTBC"
pub const DTBCHECK_MAGIC: u32 = 0x4454_4243;
/// Signed blobs are padded to a multiple of this
pub const DTB_ALIGNMENT: usize = 64;

const METADATA_LEN: usize = core::mem::size_of::<Metadata>();
const SIGNATURE_LEN: usize = core::mem::size_of::<u32>();
const TRAILER_LEN: usize = METADATA_LEN + SIGNATURE_LEN;

/// Offset of `totalsize` in the FDT header, the only header field signing
/// rewrites
const TOTALSIZE_OFFSET: usize = 4;
const TOTALSIZE_END: usize = 8;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Metadata {
    pub major_rev: big_endian::U32,
    pub chip_id: big_endian::U32,
    pub tool_version: big_endian::U32,
    pub magic: big_endian::U32,
}

impl Metadata {
    pub fn new(info: ChipInfo) -> Self {
        Self {
            major_rev: info.major_rev.into(),
            chip_id: info.chip_id.into(),
            tool_version: info.tool_version.into(),
            magic: DTBCHECK_MAGIC.into(),
        }
    }
}

impl core::fmt::Display for Metadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "(major_rev {:#x}, chip_id {:#x}, tool_version {}, magic {:#010x})",
            self.major_rev.get(),
            self.chip_id.get(),
            self.tool_version.get(),
            self.magic.get(),
        )
    }
}

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid DTB header: {0}")]
    Header(#[from] FdtError),
    #[error("signed DTB would exceed the maximum size")]
    TooLarge,
    #[error("signed DTB length {0} is not a multiple of 64")]
    Misaligned(usize),
    #[error("signed DTB is {0} bytes longer than the original, expected 20 to 83")]
    BadTrailerLength(isize),
    #[error("signed DTB content differs from the original")]
    ContentMismatch,
    #[error("metadata mismatch: expected {expected}, found {found}")]
    MetadataMismatch { expected: Metadata, found: Metadata },
    #[error("CRC mismatch: computed {computed:#010x}, stored {stored:#010x}")]
    CrcMismatch { computed: u32, stored: u32 },
}

/// Appends the metadata trailer and CRC to `data`, whose parsed header is
/// `header`.
pub fn sign(header: &FdtHeader, data: &[u8], info: ChipInfo) -> Result<Vec<u8>, SignError> {
    let body = data.get(FDT_HEADER_LEN..).ok_or(FdtError::BufferTooSmall(data.len()))?;

    let unaligned = data.len() + TRAILER_LEN;
    let aligned = codec::align(unaligned, DTB_ALIGNMENT);
    let growth = u32::try_from(aligned - data.len()).map_err(|_| SignError::TooLarge)?;

    let mut header = *header;
    header.totalsize = header.totalsize.checked_add(growth).ok_or(SignError::TooLarge)?;

    let mut signed = Vec::with_capacity(aligned);
    signed.extend_from_slice(&header.to_bytes());
    signed.extend_from_slice(body);
    signed.resize(aligned - TRAILER_LEN, 0);
    signed.extend_from_slice(Metadata::new(info).as_bytes());

    let crc = CRC32.checksum(&signed);
    signed.extend_from_slice(&crc.to_be_bytes());

    debug!("signed DTB: {} -> {} bytes, crc {crc:#010x}", data.len(), signed.len());

    FdtHeader::parse(&signed)?.check(&signed)?;

    Ok(signed)
}

/// Checks that `signed` is `unsigned` signed for `info`.
pub fn verify(signed: &[u8], unsigned: &[u8], info: ChipInfo) -> Result<(), SignError> {
    if signed.len() % DTB_ALIGNMENT != 0 {
        return Err(SignError::Misaligned(signed.len()));
    }

    let diff = signed.len() as isize - unsigned.len() as isize;
    if diff < TRAILER_LEN as isize || diff >= (TRAILER_LEN + DTB_ALIGNMENT) as isize {
        return Err(SignError::BadTrailerLength(diff));
    }

    let content_end = signed.len() - diff as usize;
    let same_prefix = signed.get(..TOTALSIZE_OFFSET) == unsigned.get(..TOTALSIZE_OFFSET);
    let same_rest = signed.get(TOTALSIZE_END..content_end) == unsigned.get(TOTALSIZE_END..);
    if !same_prefix || !same_rest {
        return Err(SignError::ContentMismatch);
    }

    let (covered, stored) = signed.split_at(signed.len() - SIGNATURE_LEN);
    let metadata_at = covered.len() - METADATA_LEN;

    let expected = Metadata::new(info);
    let found = Metadata::read_from_bytes(&covered[metadata_at..]).map_err(|_| SignError::ContentMismatch)?;
    if found != expected {
        return Err(SignError::MetadataMismatch { expected, found });
    }

    let computed = CRC32.checksum(covered);
    let stored = codec::be_u32_at(stored, 0).ok_or(SignError::ContentMismatch)?;
    if computed != stored {
        return Err(SignError::CrcMismatch { computed, stored });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chip::Chip, tests::FdtBuilder};

    fn sku_fdt() -> Vec<u8> {
        FdtBuilder::new()
            .begin_node("")
            .begin_node("sku")
            .begin_node("node@0")
            .prop_u32s("valid-sku-ids", &[1])
            .end_node()
            .end_node()
            .end_node()
            .build()
    }

    fn sign_fdt(data: &[u8], chip: Chip) -> Vec<u8> {
        let header = FdtHeader::parse(data).unwrap();
        sign(&header, data, chip.info()).unwrap()
    }

    #[test]
    fn signed_layout() {
        let data = sku_fdt();
        let signed = sign_fdt(&data, Chip::T234);

        assert_eq!(signed.len() % DTB_ALIGNMENT, 0);
        assert!(signed.len() >= data.len() + TRAILER_LEN);
        assert!(signed.len() < data.len() + TRAILER_LEN + DTB_ALIGNMENT);

        let (covered, crc) = signed.split_at(signed.len() - 4);
        assert_eq!(u32::from_be_bytes(crc.try_into().unwrap()), CRC32.checksum(covered));

        let metadata = &signed[signed.len() - TRAILER_LEN..signed.len() - 4];
        let expected: Vec<u8> = [4u32, 0x23, 1, DTBCHECK_MAGIC].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(metadata, &expected[..]);

        assert_eq!(signed[..4], data[..4]);
        assert_eq!(signed[8..data.len()], data[8..]);
        let header = FdtHeader::parse(&signed).unwrap();
        assert_eq!(header.totalsize as usize, signed.len());
    }

    #[test]
    fn crc_matches_zlib() {
        assert_eq!(CRC32.checksum(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn verify_round_trip() {
        let data = sku_fdt();
        for chip in Chip::ALL {
            let signed = sign_fdt(&data, chip);
            verify(&signed, &data, chip.info()).unwrap();
        }
    }

    #[test]
    fn verify_rejects_wrong_chip() {
        let data = sku_fdt();
        let signed = sign_fdt(&data, Chip::T194);

        assert!(matches!(verify(&signed, &data, Chip::T234.info()), Err(SignError::MetadataMismatch { .. })));
    }

    #[test]
    fn verify_rejects_tampering() {
        let data = sku_fdt();
        let mut signed = sign_fdt(&data, Chip::T234);

        let last = signed.len() - 1;
        signed[last] ^= 0xff;
        assert!(matches!(verify(&signed, &data, Chip::T234.info()), Err(SignError::CrcMismatch { .. })));

        signed[last] ^= 0xff;
        signed[FDT_HEADER_LEN] ^= 0x01;
        assert!(matches!(verify(&signed, &data, Chip::T234.info()), Err(SignError::ContentMismatch)));

        assert!(matches!(verify(&signed[..signed.len() - 1], &data, Chip::T234.info()), Err(SignError::Misaligned(_))));
        assert!(matches!(verify(&signed, &signed, Chip::T234.info()), Err(SignError::BadTrailerLength(0))));
    }

    #[test]
    fn sign_rejects_bad_header() {
        let data = sku_fdt();
        let mut header = FdtHeader::parse(&data).unwrap();
        header.magic = 0;

        assert!(matches!(sign(&header, &data, Chip::T234.info()), Err(SignError::Header(FdtError::BadMagic(0)))));
    }
}
