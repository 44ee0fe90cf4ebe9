// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use core::ops::Range;

use thiserror::Error;
use zerocopy::{big_endian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const FDT_MAGIC: u32 = 0xd00dfeed;
pub const FDT_VERSION: u32 = 17;
pub const FDT_LAST_COMP_VERSION: u32 = 16;
/// Size of the v17 header in bytes
pub const FDT_HEADER_LEN: usize = core::mem::size_of::<RawFdtHeader>();
/// Largest `totalsize` accepted
pub const FDT_MAX_TOTALSIZE: u32 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BigEndianToken(pub(crate) u32);

impl BigEndianToken {
    pub const BEGIN_NODE: Self = Self(1);
    pub const END_NODE: Self = Self(2);
    pub const PROP: Self = Self(3);
    pub const NOP: Self = Self(4);
    pub const END: Self = Self(9);
}

/// Cursor over the structure block. Every read keeps the stream 4-byte
/// aligned relative to where it started.
#[derive(Clone)]
pub(crate) struct Stream<'a>(&'a [u8]);

impl<'a> Stream<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self(data)
    }

    pub(crate) fn advance_token(&mut self) -> Result<BigEndianToken, ParseError> {
        self.advance_u32().map(BigEndianToken)
    }

    pub(crate) fn advance_u32(&mut self) -> Result<u32, ParseError> {
        let (raw, rest) = self.0.split_first_chunk::<4>().ok_or(ParseError::UnexpectedEndOfData)?;
        self.0 = rest;

        Ok(u32::from_be_bytes(*raw))
    }

    /// Reads a NUL-terminated string and skips to the next 4-byte boundary.
    pub(crate) fn advance_cstr(&mut self) -> Result<&'a str, ParseError> {
        let cstr = core::ffi::CStr::from_bytes_until_nul(self.0).map_err(|_| ParseError::InvalidCStrValue)?;
        self.skip_aligned(cstr.to_bytes_with_nul().len());

        cstr.to_str().map_err(|_| ParseError::InvalidCStrValue)
    }

    /// Takes `n` bytes of payload and skips to the next 4-byte boundary.
    pub(crate) fn advance_aligned(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let data = self.0.get(..n).ok_or(ParseError::UnexpectedEndOfData)?;
        self.skip_aligned(n);

        Ok(data)
    }

    fn skip_aligned(&mut self, n: usize) {
        // Round up to the next multiple of 4, if necessary
        let skip = (n + 3) & !3;
        // Padding after the final item may be cut off by the block end
        self.0 = self.0.get(skip..).unwrap_or_default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("cstr was either non-terminated or invalid UTF-8")]
    InvalidCStrValue,
    #[error("encountered invalid FDT token value {0:#x} while parsing")]
    InvalidTokenValue(u32),
    #[error("encountered end of data while parsing but expected more")]
    UnexpectedEndOfData,
    #[error("encountered an unexpected FDT token value while parsing")]
    UnexpectedToken,
}

/// Which structural header constraint failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    TotalSize,
    StructBlock,
    StringsBlock,
    MemReserveMap,
}

impl core::fmt::Display for HeaderField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HeaderField::TotalSize => write!(f, "totalsize"),
            HeaderField::StructBlock => write!(f, "structure block"),
            HeaderField::StringsBlock => write!(f, "strings block"),
            HeaderField::MemReserveMap => write!(f, "memory reservation map"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FdtError {
    #[error("the given buffer ({0} bytes) was too small to contain a FDT header")]
    BufferTooSmall(usize),
    #[error("bad FDT magic value {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported FDT version {version} (last compatible {last_comp_version})")]
    UnsupportedVersion { version: u32, last_comp_version: u32 },
    #[error("FDT header {0} is out of bounds or misaligned")]
    BadLayout(HeaderField),
    #[error("FDT totalsize {totalsize} does not match the buffer length {len}")]
    SizeMismatch { totalsize: u32, len: usize },
    #[error("Invalid node name '{0}'")]
    InvalidNodeName(String),
    #[error("Invalid property name '{0}'")]
    InvalidPropertyName(String),
    #[error("Duplicate node '{0}'")]
    DuplicateNode(String),
    #[error("Duplicate property '{0}'")]
    DuplicateProperty(String),
    #[error("Duplicate phandle '{0}'")]
    DuplicatePhandle(u32),
    #[error("Property 'phandle' of node '{0}' is not a single cell")]
    InvalidPhandle(String),
    #[error("FDT is truncated")]
    Truncated,
    #[error("FDT is corrupt")]
    Corrupt,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// On-disk header layout
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct RawFdtHeader {
    magic: big_endian::U32,
    totalsize: big_endian::U32,
    off_dt_struct: big_endian::U32,
    off_dt_strings: big_endian::U32,
    off_mem_rsvmap: big_endian::U32,
    version: big_endian::U32,
    last_comp_version: big_endian::U32,
    boot_cpuid_phys: big_endian::U32,
    size_dt_strings: big_endian::U32,
    size_dt_struct: big_endian::U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    /// FDT header magic
    pub magic: u32,
    /// Total size in bytes of the FDT structure
    pub totalsize: u32,
    /// Offset in bytes from the start of the header to the structure block
    pub off_dt_struct: u32,
    /// Offset in bytes from the start of the header to the strings block
    pub off_dt_strings: u32,
    /// Offset in bytes from the start of the header to the memory reservation
    /// block
    pub off_mem_rsvmap: u32,
    /// FDT version
    pub version: u32,
    /// Last compatible FDT version
    pub last_comp_version: u32,
    /// System boot CPU ID
    pub boot_cpuid_phys: u32,
    /// Length in bytes of the strings block
    pub size_dt_strings: u32,
    /// Length in bytes of the struct block
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Decodes the first [`FDT_HEADER_LEN`] bytes of `data` without checking
    /// any of the fields.
    pub fn parse(data: &[u8]) -> Result<Self, FdtError> {
        let (raw, _) = RawFdtHeader::read_from_prefix(data).map_err(|_| FdtError::BufferTooSmall(data.len()))?;

        Ok(Self {
            magic: raw.magic.get(),
            totalsize: raw.totalsize.get(),
            off_dt_struct: raw.off_dt_struct.get(),
            off_dt_strings: raw.off_dt_strings.get(),
            off_mem_rsvmap: raw.off_mem_rsvmap.get(),
            version: raw.version.get(),
            last_comp_version: raw.last_comp_version.get(),
            boot_cpuid_phys: raw.boot_cpuid_phys.get(),
            size_dt_strings: raw.size_dt_strings.get(),
            size_dt_struct: raw.size_dt_struct.get(),
        })
    }

    /// Checks the header against the blob it was read from: magic, version,
    /// block bounds and alignment, and that `data` is exactly `totalsize`
    /// bytes long.
    pub fn check(&self, data: &[u8]) -> Result<(), FdtError> {
        let header_len = FDT_HEADER_LEN as u64;
        let totalsize = u64::from(self.totalsize);
        let end = |off: u32, size: u32| u64::from(off) + u64::from(size);

        if self.magic != FDT_MAGIC {
            return Err(FdtError::BadMagic(self.magic));
        }

        if self.version != FDT_VERSION || self.last_comp_version != FDT_LAST_COMP_VERSION {
            return Err(FdtError::UnsupportedVersion {
                version: self.version,
                last_comp_version: self.last_comp_version,
            });
        }

        if totalsize < header_len || self.totalsize > FDT_MAX_TOTALSIZE {
            return Err(FdtError::BadLayout(HeaderField::TotalSize));
        }

        if u64::from(self.off_dt_struct) < header_len
            || end(self.off_dt_struct, self.size_dt_struct) > totalsize
            || self.off_dt_struct % 4 != 0
        {
            return Err(FdtError::BadLayout(HeaderField::StructBlock));
        }

        if u64::from(self.off_dt_strings) < header_len || end(self.off_dt_strings, self.size_dt_strings) > totalsize {
            return Err(FdtError::BadLayout(HeaderField::StringsBlock));
        }

        if u64::from(self.off_mem_rsvmap) < header_len
            || u64::from(self.off_mem_rsvmap) > totalsize
            || self.off_mem_rsvmap % 8 != 0
        {
            return Err(FdtError::BadLayout(HeaderField::MemReserveMap));
        }

        if data.len() as u64 != totalsize {
            return Err(FdtError::SizeMismatch { totalsize: self.totalsize, len: data.len() });
        }

        Ok(())
    }

    /// Re-encodes the header, big-endian
    pub fn to_bytes(&self) -> [u8; FDT_HEADER_LEN] {
        let raw = RawFdtHeader {
            magic: self.magic.into(),
            totalsize: self.totalsize.into(),
            off_dt_struct: self.off_dt_struct.into(),
            off_dt_strings: self.off_dt_strings.into(),
            off_mem_rsvmap: self.off_mem_rsvmap.into(),
            version: self.version.into(),
            last_comp_version: self.last_comp_version.into(),
            boot_cpuid_phys: self.boot_cpuid_phys.into(),
            size_dt_strings: self.size_dt_strings.into(),
            size_dt_struct: self.size_dt_struct.into(),
        };

        let mut out = [0u8; FDT_HEADER_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    pub fn struct_range(&self) -> Range<usize> {
        let start = self.off_dt_struct as usize;
        let end = start + self.size_dt_struct as usize;

        start..end
    }

    pub fn strings_range(&self) -> Range<usize> {
        let start = self.off_dt_strings as usize;
        let end = start + self.size_dt_strings as usize;

        start..end
    }
}

fn is_node_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | ',' | '-' | '.' | '_')
}

fn is_property_char(c: char) -> bool {
    is_node_char(c) || matches!(c, '#' | '?')
}

/// `name[@unit]`, both parts non-empty
pub fn is_valid_node_name(name: &str) -> bool {
    let valid = |s: &str| !s.is_empty() && s.chars().all(is_node_char);

    match name.split_once('@') {
        Some((base, unit)) => valid(base) && valid(unit),
        None => valid(name),
    }
}

pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_property_char)
}

/// Reads the NUL-terminated property name at `offset` within the strings
/// block.
pub(crate) fn string_at(strings: &[u8], offset: usize) -> Result<&str, ParseError> {
    core::ffi::CStr::from_bytes_until_nul(strings.get(offset..).ok_or(ParseError::UnexpectedEndOfData)?)
        .map_err(|_| ParseError::InvalidCStrValue)?
        .to_str()
        .map_err(|_| ParseError::InvalidCStrValue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_u32() {
        let bytes = 0xF00DCAFEu32.to_be_bytes();
        let mut stream = Stream::new(&bytes);

        assert_eq!(stream.advance_u32(), Ok(0xF00DCAFE));
        assert_eq!(stream.advance_u32(), Err(ParseError::UnexpectedEndOfData));
    }

    #[test]
    fn advance_cstr_aligns() {
        let bytes = b"sku\0\0\0\0\x09";
        let mut stream = Stream::new(bytes);

        assert_eq!(stream.advance_cstr(), Ok("sku"));
        assert_eq!(stream.advance_token(), Ok(BigEndianToken::END));
        assert_eq!(stream.advance_token(), Err(ParseError::UnexpectedEndOfData));

        let bytes = b"node@0\0\0\0\0\0\x09";
        let mut stream = Stream::new(bytes);
        assert_eq!(stream.advance_cstr(), Ok("node@0"));
        assert_eq!(stream.advance_token(), Ok(BigEndianToken::END));
    }

    #[test]
    fn node_names() {
        assert!(is_valid_node_name("clock@1a"));
        assert!(is_valid_node_name("i2c_firewall_rules"));
        assert!(is_valid_node_name("vdd-cpu,0"));
        assert!(!is_valid_node_name("bad@"));
        assert!(!is_valid_node_name("@0"));
        assert!(!is_valid_node_name("a@b@c"));
        assert!(!is_valid_node_name("has space"));
        assert!(!is_valid_node_name(""));
    }

    #[test]
    fn property_names() {
        assert!(is_valid_property_name("#address-cells"));
        assert!(is_valid_property_name("linux,phandle"));
        assert!(is_valid_property_name("ok?"));
        assert!(!is_valid_property_name("a@b"));
        assert!(!is_valid_property_name(""));
    }
}
