// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Bootloader update payload (BUP) blobs.
//!
//! A blob is a fixed little-endian header, an optional opaque accessory, a
//! table of fixed-size entries and the payloads those entries point at:
//!
//! ```text
//! | header | accessory? | entry 0 .. entry n-1 | payload 0 .. payload n-1 |
//! ```
//!
//! [`writer`] lays blobs out in two passes over a seekable sink, [`reader`]
//! inspects, checks and extracts existing blobs, and [`entry`] parses the
//! textual entry lists the packer is driven by.

use std::{fmt, io};

use thiserror::Error;

use crate::{codec::CodecError, config::ConfigError};

pub mod entry;
pub mod layout;
pub mod reader;
pub mod writer;

pub use entry::{parse_entry_list, BmpEntrySpec, EntrySpec, UpdateEntrySpec};
pub use reader::{missing_specs, Blob, BlobHeader, EntryTable, Extraction, MissingSpec, UpdateEntry, DEFAULT_MAX_ENTRIES};
pub use writer::{pack, resolve_payloads, write_blob, PackSummary, Payload};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid entry tuple {entry:?}: expected {expected} fields, found {found}")]
    InvalidEntry { entry: String, expected: usize, found: usize },
    #[error("Entry list is empty")]
    EmptyEntryList,
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Blob type {0} cannot be inspected (type 1 BMP blobs are not currently supported)")]
    UnsupportedBlobType(u32),
    #[error("Entry table check failed: {} missing (partition, spec) pair(s)", .0.len())]
    CoverageHole(Vec<MissingSpec>),
    #[error("I/O error")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error comes from entry content not fitting its on-disk
    /// field.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::Codec(CodecError::StringTooLong { .. } | CodecError::ValueTooLarge { .. }))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// What a blob carries, stored in the header's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BlobType {
    /// Bootloader partition images
    Update,
    /// Boot splash bitmaps
    Bmp,
}

impl BlobType {
    pub const fn code(self) -> u32 {
        match self {
            BlobType::Update => 0,
            BlobType::Bmp => 1,
        }
    }

    /// Name of the file the packer writes for this type.
    pub const fn file_name(self) -> &'static str {
        match self {
            BlobType::Update => "ota.blob",
            BlobType::Bmp => "bmp.blob",
        }
    }

    /// Number of whitespace-separated fields in one entry of this type.
    pub const fn entry_fields(self) -> usize {
        match self {
            BlobType::Update => 5,
            BlobType::Bmp => 3,
        }
    }
}

/// BCD-encoded blob format version.
///
/// ```text
/// bits 27:24  minor (bcd)
/// bits 23:16  major (bcd)
/// bits 15:14  release revision
/// bits 12:8   release month (bcd)
/// bits  7:0   release year (bcd, 20yy)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BupVersion(pub u32);

impl BupVersion {
    /// Version written by this packer: 3.1, released 2022.06, revision 0.
    pub const CURRENT: BupVersion = BupVersion::new(0x3, 0x1, 0x22, 0x6, 0);

    pub const fn new(major: u32, minor: u32, yy: u32, mm: u32, rev: u32) -> Self {
        Self(yy | mm << 8 | rev << 14 | major << 16 | minor << 24)
    }

    pub const fn major(self) -> u32 {
        (self.0 & 0x00ff_0000) >> 16
    }

    pub const fn minor(self) -> u32 {
        (self.0 & 0x0f00_0000) >> 24
    }

    pub const fn year(self) -> u32 {
        self.0 & 0xff
    }

    pub const fn month(self) -> u32 {
        (self.0 & 0x1f00) >> 8
    }

    pub const fn revision(self) -> u32 {
        (self.0 & 0xc000) >> 14
    }
}

/// `vMaj.Min-20yy.mm-rev`, each field shown as its BCD digits.
impl fmt::Display for BupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{:x}.{:x}-20{:x}.{:x}-{:x}",
            self.major(),
            self.minor(),
            self.year(),
            self.month(),
            self.revision()
        )
    }
}

/// Formats `n` with `,` thousands separators.
pub(crate) fn thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}
