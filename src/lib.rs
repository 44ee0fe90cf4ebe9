// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! # `bupkit`
//!
//! Tooling for two firmware artifacts of Tegra-class boards:
//!
//! - **BUP** blobs, which bundle bootloader partition images (or boot splash
//!   bitmaps) behind a fixed little-endian header and entry table. See
//!   [`bup`].
//! - **DTBCHECK**, which validates a Flattened Devicetree blob against a
//!   per-chip schema and appends a metadata trailer and CRC-32 so firmware
//!   can tell a checked DTB from an unchecked one. See [`schema`] and
//!   [`signer`].
//!
//! ## License
//!
//! This crate is licensed under the Mozilla Public License 2.0 (see the LICENSE file).
//!
//! ## Example
//!
//! ```rust,no_run
//! use bupkit::chip::Chip;
//!
//! let dtb = std::fs::read("board.dtb").unwrap();
//! let chip = Chip::T234;
//!
//! let signed = bupkit::dtbcheck(&dtb, chip, &chip.tables()).unwrap();
//! std::fs::write("board.dtb.signed", signed).unwrap();
//! ```

#[cfg(test)]
mod tests;

pub mod bup;
pub mod chip;
pub mod codec;
pub mod config;
pub mod logger;
pub mod node;
pub mod parsing;
pub mod properties;
pub mod schema;
pub mod signer;

#[cfg(feature = "pretty-printing")]
mod pretty_print;

use log::debug;

use chip::{Chip, ChipTables};
use codec::CodecError;

pub use node::{DeviceTree, Node};
pub use parsing::{FdtError, FdtHeader, ParseError};
pub use schema::SchemaViolation;
pub use signer::SignError;

/// Broad classes of failure, for callers deciding how to report one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing input, unreadable file, write failure
    Io,
    /// Malformed FDT structure
    FdtCorrupt,
    /// DTB content rejected by the chip schema
    SchemaViolation,
    /// A value doesn't fit its on-disk field
    ContentOverflow,
    /// A BUP entry table misses (partition, spec) pairs
    CoverageHole,
    /// An unparseable record that was skipped
    ParseSoft,
    /// Malformed command-line input such as an entry list
    InvalidInput,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fdt(#[from] FdtError),
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error(transparent)]
    Bup(#[from] bup::Error),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid chip parameters: {0}")]
    ChipParams(#[from] serde_json::Error),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fdt(_) => ErrorKind::FdtCorrupt,
            Error::Schema(_) => ErrorKind::SchemaViolation,
            Error::Sign(SignError::Header(_)) => ErrorKind::FdtCorrupt,
            Error::Sign(SignError::TooLarge) => ErrorKind::ContentOverflow,
            Error::Sign(_) => ErrorKind::FdtCorrupt,
            Error::Bup(e) => match e {
                bup::Error::Codec(CodecError::StringNotUtf8 { .. }) => ErrorKind::ParseSoft,
                bup::Error::Codec(_) => ErrorKind::ContentOverflow,
                bup::Error::CoverageHole(_) => ErrorKind::CoverageHole,
                bup::Error::InvalidEntry { .. } | bup::Error::EmptyEntryList | bup::Error::UnsupportedBlobType(_) => {
                    ErrorKind::InvalidInput
                }
                bup::Error::Config(_) | bup::Error::Io(_) => ErrorKind::Io,
            },
            Error::Config(_) | Error::ChipParams(_) | Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parses `data`, validates it against the schema of `chip` and returns the
/// signed blob, verified against the input.
pub fn dtbcheck(data: &[u8], chip: Chip, tables: &ChipTables) -> Result<Vec<u8>> {
    let tree = DeviceTree::parse(data)?;
    debug!("parsed {} nodes", tree.all_nodes().count());

    schema::validate(&tree, chip, tables)?;

    let signed = signer::sign(tree.header(), data, chip.info())?;
    signer::verify(&signed, data, chip.info())?;

    Ok(signed)
}
