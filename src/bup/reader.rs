// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Inspecting, checking and extracting update blobs.

use std::{
    borrow::Cow,
    collections::{BTreeSet, HashSet},
    fmt,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use zerocopy::FromBytes;

use super::{
    layout::{RawHeader, RawUpdateEntry, BUP_MAGIC, HEADER_LEN},
    thousands, BlobType, BupVersion, Error, Result,
};
use crate::codec;

/// Default number of entries read from a blob.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Extraction request matching every partition.
pub const EXTRACT_ALL: &str = "all";

const TITLES: [&str; 6] = ["part_name", "offset", "part_size", "version", "op_mode", "tnspec"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub magic: [u8; 16],
    pub version: BupVersion,
    pub blob_size: u32,
    pub header_size: u32,
    pub entry_count: u32,
    pub blob_type: u32,
    pub uncomp_blob_size: u32,
    /// First 8 bytes of the accessory, when there is one
    pub accessory: Option<u64>,
}

impl BlobHeader {
    /// Reads the header and, if `header_size` says one follows, the start of
    /// the accessory.
    pub fn read(mut reader: impl Read) -> Result<Self> {
        let raw = RawHeader::read_from_io(&mut reader)?;

        let header_size = raw.header_size.get();
        let accessory = if header_size as usize > HEADER_LEN {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            Some(u64::from_le_bytes(buf))
        } else {
            None
        };

        Ok(Self {
            magic: raw.magic,
            version: BupVersion(raw.version.get()),
            blob_size: raw.blob_size.get(),
            header_size,
            entry_count: raw.entry_count.get(),
            blob_type: raw.blob_type.get(),
            uncomp_blob_size: raw.uncomp_blob_size.get(),
            accessory,
        })
    }

    pub fn magic_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.magic)
    }

    /// Whether this looks like an update blob this tool understands.
    pub fn is_valid(&self) -> bool {
        self.magic == BUP_MAGIC && self.blob_type == BlobType::Update.code()
    }

    fn mismatch_report(&self) -> String {
        format!(
            "Invalid input blob file. Results may be unexpected.\n\
             \x20     Input magic: {}\n\
             \x20  Expected magic: {}\n\
             \x20   Input version: {:#010x}\n\
             \x20Expected version: {:#010x}\n\
             \x20      Input type: {}\n\
             \x20   Expected type: {} (type 1 BMP blobs are not currently supported)",
            self.magic_str(),
            String::from_utf8_lossy(&BUP_MAGIC),
            self.version.0,
            BupVersion::CURRENT.0,
            self.blob_type,
            BlobType::Update.code(),
        )
    }
}

impl fmt::Display for BlobHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BLOB HEADER:")?;
        writeln!(f, "       Magic: {}", self.magic_str())?;
        writeln!(f, "     Version: {} ({:#010x})", self.version, self.version.0)?;
        writeln!(f, "   Blob Size: {} bytes", thousands(self.blob_size))?;
        writeln!(f, " Header Size: {} bytes", thousands(self.header_size))?;
        writeln!(f, " Entry Count: {} partition(s)", self.entry_count)?;
        writeln!(f, "        Type: {} (0 for update, 1 for BMP)", self.blob_type)?;
        writeln!(f, "Uncompressed")?;
        writeln!(f, "   Blob Size: {} bytes", thousands(self.uncomp_blob_size))?;
        match self.accessory {
            Some(accessory) => write!(f, "   Accessory: {accessory:#018x}"),
            None => write!(f, "   Accessory: Not Present"),
        }
    }
}

/// A decoded update entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub part_name: String,
    pub offset: u32,
    pub part_size: u32,
    pub version: u32,
    pub op_mode: u32,
    pub tnspec: String,
}

impl UpdateEntry {
    fn read(reader: impl Read) -> Result<Self> {
        let raw = RawUpdateEntry::read_from_io(reader)?;

        Ok(Self {
            part_name: codec::unpack_cstr("part_name", &raw.part_name)?.to_owned(),
            offset: raw.offset.get(),
            part_size: raw.length.get(),
            version: raw.version.get(),
            op_mode: raw.op_mode.get(),
            tnspec: codec::unpack_cstr("tnspec", &raw.spec_info)?.to_owned(),
        })
    }

    /// The spec this entry is restricted to, if any.
    pub fn spec(&self) -> Option<&str> {
        match self.tnspec.as_str() {
            "" | super::entry::COMMON_SPEC => None,
            spec => Some(spec),
        }
    }

    pub fn op_str(&self) -> Cow<'static, str> {
        match self.op_mode {
            0 => Cow::Borrowed(""),
            1 => Cow::Borrowed("dev"),
            2 => Cow::Borrowed("prod"),
            n => Cow::Owned(n.to_string()),
        }
    }

    /// `<part_name>[_<op_str>][_<tnspec>].raw.bin`
    pub fn file_name(&self) -> String {
        let op_str = self.op_str();
        let parts = [self.part_name.as_str(), &*op_str, self.spec().unwrap_or("")];
        let stem: Vec<&str> = parts.into_iter().filter(|p| !p.is_empty()).collect();

        format!("{}.raw.bin", stem.join("_"))
    }

    fn cells(&self) -> [String; 6] {
        [
            self.part_name.clone(),
            self.offset.to_string(),
            self.part_size.to_string(),
            format!("{:x}", self.version),
            self.op_mode.to_string(),
            self.tnspec.clone(),
        ]
    }
}

/// A `(partition, spec)` pair the entry table doesn't cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSpec {
    pub part_name: String,
    pub spec: String,
}

impl fmt::Display for MissingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The {} missed SPEC {}.", self.part_name, self.spec)
    }
}

/// Every `(p, s)` pair where `p` has some spec-specific entry and `s` is a
/// spec used anywhere, but no entry `(p, s)` exists.
pub fn missing_specs<'a>(entries: impl IntoIterator<Item = &'a UpdateEntry>) -> Vec<MissingSpec> {
    let mut parts: Vec<&str> = Vec::new();
    let mut specs: Vec<&str> = Vec::new();
    let mut present = HashSet::new();

    for entry in entries {
        let Some(spec) = entry.spec() else { continue };

        if !parts.contains(&entry.part_name.as_str()) {
            parts.push(&entry.part_name);
        }
        if !specs.contains(&spec) {
            specs.push(spec);
        }
        present.insert((entry.part_name.as_str(), spec));
    }

    parts
        .iter()
        .flat_map(|&p| specs.iter().map(move |&s| (p, s)))
        .filter(|pair| !present.contains(pair))
        .map(|(p, s)| MissingSpec { part_name: p.to_owned(), spec: s.to_owned() })
        .collect()
}

/// Result of an extraction request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub saved: Vec<PathBuf>,
    /// Requested names with no matching entry
    pub missing: Vec<String>,
}

/// An update blob opened for inspection.
pub struct Blob<R> {
    reader: R,
    header: BlobHeader,
    /// One slot per entry read; `None` for entries that failed to decode
    records: Vec<Option<UpdateEntry>>,
}

impl<R: Read + Seek> Blob<R> {
    /// Reads the header and up to `max_entries` entries.
    ///
    /// A header that doesn't look like an update blob and entries that fail
    /// to decode are warned about and tolerated.
    pub fn read(mut reader: R, max_entries: usize) -> Result<Self> {
        reader.rewind()?;
        let header = BlobHeader::read(&mut reader)?;
        if !header.is_valid() {
            warn!("{}", header.mismatch_report());
        }

        let count = (header.entry_count as usize).min(max_entries);
        reader.seek(SeekFrom::Start(u64::from(header.header_size)))?;

        let mut records = Vec::with_capacity(count);
        for idx in 0..count {
            match UpdateEntry::read(&mut reader) {
                Ok(entry) => {
                    debug!("entry {idx}: {entry:?}");
                    records.push(Some(entry));
                }
                Err(e) => {
                    warn!("Cannot parse partition number {idx} ({e}). Payload blob may be corrupt.");
                    records.push(None);
                }
            }
        }

        Ok(Self { reader, header, records })
    }

    pub fn header(&self) -> &BlobHeader {
        &self.header
    }

    /// Successfully decoded entries, in table order.
    pub fn entries(&self) -> impl Iterator<Item = &UpdateEntry> {
        self.records.iter().flatten()
    }

    /// Number of entries that failed to decode.
    pub fn skipped(&self) -> usize {
        self.records.iter().filter(|r| r.is_none()).count()
    }

    pub fn entry_table(&self) -> EntryTable<'_> {
        EntryTable { records: &self.records }
    }

    /// Fails with [`Error::CoverageHole`] unless every partition with a
    /// spec-specific entry has one for every spec in the blob.
    pub fn check_coverage(&self) -> Result<()> {
        let missing = missing_specs(self.entries());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::CoverageHole(missing))
        }
    }

    /// Writes the payloads of the entries named in `request` (`;`-separated,
    /// or `all`) into `out_dir`.
    pub fn extract(&mut self, request: &str, out_dir: &Path) -> Result<Extraction> {
        let wanted: BTreeSet<&str> =
            request.split(';').map(|n| n.trim_matches(&[' ', '\t', '\n', '\0'][..])).filter(|n| !n.is_empty()).collect();
        let all = wanted.contains(EXTRACT_ALL);

        let mut found = HashSet::new();
        let mut saved = Vec::new();

        for entry in self.records.iter().flatten() {
            if !all && !wanted.contains(entry.part_name.as_str()) {
                continue;
            }

            let path = out_dir.join(entry.file_name());
            let mut file = File::create(&path)?;

            self.reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
            let copied = io::copy(&mut (&mut self.reader).take(u64::from(entry.part_size)), &mut file)?;
            if copied != u64::from(entry.part_size) {
                warn!("{}: blob ends {} bytes short of the entry", entry.part_name, u64::from(entry.part_size) - copied);
            }

            info!("Saved file \"{}\"", entry.file_name());
            found.insert(entry.part_name.as_str());
            saved.push(path);
        }

        let missing = wanted
            .into_iter()
            .filter(|name| *name != EXTRACT_ALL && !found.contains(name))
            .map(str::to_owned)
            .collect();

        Ok(Extraction { saved, missing })
    }
}

/// The entry table, column widths fitted to the contents.
pub struct EntryTable<'a> {
    records: &'a [Option<UpdateEntry>],
}

impl fmt::Display for EntryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Option<[String; 6]>> = self.records.iter().map(|r| r.as_ref().map(UpdateEntry::cells)).collect();

        let mut widths = TITLES.map(str::len);
        for cells in rows.iter().flatten() {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.len());
            }
        }

        writeln!(f, "ENTRY TABLE:")?;
        write!(f, "|")?;
        for (title, w) in TITLES.iter().zip(widths) {
            write!(f, " {title:^w$} |")?;
        }

        for row in &rows {
            writeln!(f)?;
            write!(f, "|")?;

            let Some(cells) = row else {
                let w = widths.iter().sum::<usize>() + 3 * (widths.len() - 1);
                write!(f, " {:^w$} |", "SKIPPED")?;
                continue;
            };

            let [part_name, offset, part_size, version, op_mode, tnspec] = cells;
            let [w0, w1, w2, w3, w4, w5] = widths;
            write!(
                f,
                " {part_name:>w0$} | {offset:>w1$} | {part_size:>w2$} | {version:^w3$} | {op_mode:^w4$} | {tnspec:<w5$} |"
            )?;
        }

        Ok(())
    }
}
