// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Two-pass blob layout.
//!
//! Payload offsets and the blob size are only known once the payloads have
//! been copied, so the header goes out with zero sizes and the entry table as
//! zeroed placeholders. Both are patched in place afterwards.

use std::{
    fs::File,
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use zerocopy::IntoBytes;

use super::{
    layout::{
        RawBmpEntry, RawHeader, RawUpdateEntry, BLOB_SIZE_OFFSET, BMP_ENTRY_LEN, BUP_MAGIC, HEADER_LEN, PART_NAME_MAX,
        SPEC_INFO_SIZE, UNCOMP_BLOB_SIZE_OFFSET, UPDATE_ENTRY_LEN,
    },
    BlobType, BupVersion, EntrySpec, Result,
};
use crate::{codec, config::FileResolver};

/// An entry with its payload file located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub entry: EntrySpec,
    pub path: PathBuf,
}

/// Where everything ended up in a written blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub blob_size: u32,
    pub header_size: u32,
    /// `(offset, length)` of each payload, in entry order
    pub placements: Vec<(u32, u32)>,
}

/// Locates every entry's payload file before anything is written.
pub fn resolve_payloads(entries: Vec<EntrySpec>, resolver: &FileResolver) -> Result<Vec<Payload>> {
    entries
        .into_iter()
        .map(|entry| {
            let path = resolver.resolve(entry.file())?;
            Ok(Payload { entry, path })
        })
        .collect()
}

fn entry_len(entry: &EntrySpec) -> usize {
    match entry {
        EntrySpec::Update(_) => UPDATE_ENTRY_LEN,
        EntrySpec::Bmp(_) => BMP_ENTRY_LEN,
    }
}

fn write_entry(mut writer: impl Write, entry: &EntrySpec, offset: u32, length: u32) -> Result<()> {
    match entry {
        EntrySpec::Update(e) => {
            let raw = RawUpdateEntry {
                part_name: codec::pack_cstr("part_name", &e.part_name, PART_NAME_MAX)?,
                offset: offset.into(),
                length: length.into(),
                version: e.version.into(),
                op_mode: e.op_mode.into(),
                spec_info: codec::pack_cstr("spec_info", &e.spec_info, SPEC_INFO_SIZE)?,
            };
            raw.write_to_io(&mut writer)?;
        }
        EntrySpec::Bmp(e) => {
            let raw = RawBmpEntry {
                bmp_type: e.bmp_type.into(),
                offset: offset.into(),
                length: length.into(),
                resolution: e.resolution.into(),
                reserved: [0; 36],
            };
            raw.write_to_io(&mut writer)?;
        }
    }

    Ok(())
}

/// Lays out a blob of type `ty` into `writer`, which must start empty.
pub fn write_blob<W: Write + Seek>(
    mut writer: W,
    ty: BlobType,
    accessory: &[u8],
    payloads: &[Payload],
) -> Result<PackSummary> {
    let header_size = codec::to_u32("header_size", (HEADER_LEN + accessory.len()) as u64)?;
    let entry_count = codec::to_u32("entry_count", payloads.len() as u64)?;

    let header = RawHeader {
        magic: BUP_MAGIC,
        version: BupVersion::CURRENT.0.into(),
        blob_size: 0.into(),
        header_size: header_size.into(),
        entry_count: entry_count.into(),
        blob_type: ty.code().into(),
        uncomp_blob_size: 0.into(),
    };
    header.write_to_io(&mut writer)?;
    writer.write_all(accessory)?;

    for payload in payloads {
        writer.write_all(&vec![0u8; entry_len(&payload.entry)])?;
    }

    let mut placements = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let offset = codec::to_u32("offset", writer.stream_position()?)?;
        let mut file = File::open(&payload.path)?;
        let length = codec::to_u32("length", io::copy(&mut file, &mut writer)?)?;

        debug!("{}: offset {offset}, length {length}", payload.path.display());
        placements.push((offset, length));
    }

    let blob_size = codec::to_u32("blob_size", writer.stream_position()?)?;
    for field in [BLOB_SIZE_OFFSET, UNCOMP_BLOB_SIZE_OFFSET] {
        writer.seek(SeekFrom::Start(field))?;
        writer.write_all(&blob_size.to_le_bytes())?;
    }

    writer.seek(SeekFrom::Start(u64::from(header_size)))?;
    for (payload, &(offset, length)) in payloads.iter().zip(&placements) {
        write_entry(&mut writer, &payload.entry, offset, length)?;
    }

    writer.flush()?;

    Ok(PackSummary { blob_size, header_size, placements })
}

/// Packs `entries` into `ota.blob` or `bmp.blob` under `out_dir`, returning
/// the path written.
pub fn pack(
    ty: BlobType,
    accessory: &[u8],
    entries: Vec<EntrySpec>,
    resolver: &FileResolver,
    out_dir: &Path,
) -> Result<(PathBuf, PackSummary)> {
    let payloads = resolve_payloads(entries, resolver)?;

    let path = out_dir.join(ty.file_name());
    let writer = BufWriter::new(File::create(&path)?);
    let summary = write_blob(writer, ty, accessory, &payloads)?;

    info!("wrote {} ({} bytes, {} entries)", path.display(), summary.blob_size, summary.placements.len());

    Ok((path, summary))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zerocopy::FromBytes;

    use super::*;
    use crate::bup::parse_entry_list;

    fn payloads(dir: &Path, files: &[(&str, &[u8])], list: &str, ty: BlobType) -> Vec<Payload> {
        for (name, data) in files {
            std::fs::write(dir.join(name), data).unwrap();
        }

        resolve_payloads(parse_entry_list(list, ty).unwrap(), &FileResolver::new(dir)).unwrap()
    }

    #[test]
    fn minimal_update_blob() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = payloads(dir.path(), &[("a.bin", b"HELLO")], "a.bin mb1 2 0 common", BlobType::Update);

        let mut out = Cursor::new(Vec::new());
        let summary = write_blob(&mut out, BlobType::Update, &[], &payloads).unwrap();
        let blob = out.into_inner();

        assert_eq!(summary.header_size, 40);
        assert_eq!(summary.placements, [(224, 5)]);
        assert_eq!(summary.blob_size as usize, blob.len());

        let (header, rest) = RawHeader::read_from_prefix(&blob).unwrap();
        assert_eq!(header.magic, BUP_MAGIC);
        assert_eq!(header.version.get(), 0x0103_0622);
        assert_eq!(header.blob_size.get(), 229);
        assert_eq!(header.uncomp_blob_size.get(), 229);
        assert_eq!(header.entry_count.get(), 1);
        assert_eq!(header.blob_type.get(), 0);

        let (entry, payload) = RawUpdateEntry::read_from_prefix(rest).unwrap();
        assert_eq!(codec::unpack_cstr("part_name", &entry.part_name).unwrap(), "mb1");
        assert_eq!(entry.offset.get(), 224);
        assert_eq!(entry.length.get(), 5);
        assert_eq!(entry.version.get(), 2);
        assert_eq!(entry.op_mode.get(), 0);
        assert_eq!(entry.spec_info, [0; SPEC_INFO_SIZE]);
        assert_eq!(payload, b"HELLO");
    }

    #[test]
    fn accessory_follows_header() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = payloads(
            dir.path(),
            &[("a.bin", b"AAA"), ("b.bin", b"BB")],
            "a.bin mb1 0 0 common; b.bin mb2 0 0 common",
            BlobType::Update,
        );

        let accessory = 0x1122_3344_5566_7788u64.to_le_bytes();
        let mut out = Cursor::new(Vec::new());
        let summary = write_blob(&mut out, BlobType::Update, &accessory, &payloads).unwrap();
        let blob = out.into_inner();

        assert_eq!(summary.header_size, 48);
        assert_eq!(&blob[40..48], &accessory);

        let first = 48 + 2 * UPDATE_ENTRY_LEN as u32;
        assert_eq!(summary.placements, [(first, 3), (first + 3, 2)]);
        assert_eq!(&blob[first as usize..], b"AAABB");
    }

    #[test]
    fn bmp_blob_layout() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = payloads(dir.path(), &[("logo.bmp", b"BM")], "logo.bmp nvidia 720", BlobType::Bmp);

        let mut out = Cursor::new(Vec::new());
        let summary = write_blob(&mut out, BlobType::Bmp, &[], &payloads).unwrap();
        let blob = out.into_inner();

        let (header, rest) = RawHeader::read_from_prefix(&blob).unwrap();
        assert_eq!(header.blob_type.get(), 1);

        let (entry, _) = RawBmpEntry::read_from_prefix(rest).unwrap();
        assert_eq!(entry.bmp_type.get(), 0);
        assert_eq!(entry.resolution.get(), 1);
        assert_eq!(entry.offset.get(), 92);
        assert_eq!(summary.placements, [(92, 2)]);
    }

    #[test]
    fn missing_payload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let entries = parse_entry_list("nope.bin mb1 0 0 common", BlobType::Update).unwrap();

        let err = resolve_payloads(entries, &FileResolver::new(dir.path())).unwrap_err();
        assert!(err.to_string().contains("nope.bin"));
    }

    #[test]
    fn pack_writes_named_blob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"HELLO").unwrap();
        let entries = parse_entry_list("a.bin mb1 2 0 common", BlobType::Update).unwrap();

        let (path, summary) =
            pack(BlobType::Update, &[], entries, &FileResolver::new(dir.path()), dir.path()).unwrap();

        assert_eq!(path, dir.path().join("ota.blob"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), u64::from(summary.blob_size));
    }
}
