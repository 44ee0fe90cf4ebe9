// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{fs, fs::File, path::Path};

use bupkit::{
    bup::{self, parse_entry_list, Blob, BlobType, DEFAULT_MAX_ENTRIES},
    config::FileResolver,
    ErrorKind,
};

fn write_payloads(dir: &Path, files: &[(&str, &[u8])]) {
    for (name, data) in files {
        fs::write(dir.join(name), data).unwrap();
    }
}

#[test]
fn pack_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    write_payloads(dir.path(), &[("mb1.bin", b"MB1-IMAGE"), ("a.dtb", b"DTB-A"), ("b.dtb", b"DTB-B")]);

    let entries = parse_entry_list(
        "mb1.bin mb1 0x10 0 common; a.dtb bpmp-fw-dtb 2 1 board-a; b.dtb bpmp-fw-dtb 2 1 board-b",
        BlobType::Update,
    )
    .unwrap();
    let (path, summary) =
        bup::pack(BlobType::Update, &[], entries, &FileResolver::new(dir.path()), dir.path()).unwrap();

    let mut blob = Blob::read(File::open(&path).unwrap(), DEFAULT_MAX_ENTRIES).unwrap();
    assert!(blob.header().is_valid());
    assert_eq!(blob.header().blob_size, summary.blob_size);
    assert_eq!(blob.header().entry_count, 3);
    assert_eq!(blob.skipped(), 0);

    let names: Vec<(&str, &str)> = blob.entries().map(|e| (e.part_name.as_str(), e.tnspec.as_str())).collect();
    assert_eq!(names, [("mb1", ""), ("bpmp-fw-dtb", "board-a"), ("bpmp-fw-dtb", "board-b")]);
    assert_eq!(blob.entries().next().unwrap().version, 0x10);

    blob.check_coverage().unwrap();

    let out = tempfile::tempdir().unwrap();
    let extraction = blob.extract("mb1; bpmp-fw-dtb; nvc", out.path()).unwrap();
    assert_eq!(extraction.saved.len(), 3);
    assert_eq!(extraction.missing, ["nvc"]);

    assert_eq!(fs::read(out.path().join("mb1.raw.bin")).unwrap(), b"MB1-IMAGE");
    assert_eq!(fs::read(out.path().join("bpmp-fw-dtb_dev_board-a.raw.bin")).unwrap(), b"DTB-A");
    assert_eq!(fs::read(out.path().join("bpmp-fw-dtb_dev_board-b.raw.bin")).unwrap(), b"DTB-B");
}

#[test]
fn coverage_hole_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_payloads(dir.path(), &[("a.bin", b"A"), ("b.bin", b"B"), ("c.bin", b"C")]);

    let entries =
        parse_entry_list("a.bin P 0 0 S1; b.bin P 0 0 S2; c.bin Q 0 0 S1", BlobType::Update).unwrap();
    let (path, _) = bup::pack(BlobType::Update, &[], entries, &FileResolver::new(dir.path()), dir.path()).unwrap();

    let blob = Blob::read(File::open(path).unwrap(), DEFAULT_MAX_ENTRIES).unwrap();
    let err = blob.check_coverage().unwrap_err();
    let bup::Error::CoverageHole(missing) = &err else { panic!("expected a coverage hole, got {err}") };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].to_string(), "The Q missed SPEC S2.");

    assert_eq!(bupkit::Error::from(err).kind(), ErrorKind::CoverageHole);
}

#[test]
fn accessory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_payloads(dir.path(), &[("a.bin", b"A")]);

    let accessory = 0xdead_beef_u64.to_le_bytes();
    let entries = parse_entry_list("a.bin mb1 0 0 common", BlobType::Update).unwrap();
    let (path, summary) =
        bup::pack(BlobType::Update, &accessory, entries, &FileResolver::new(dir.path()), dir.path()).unwrap();
    assert_eq!(summary.header_size, 48);

    let blob = Blob::read(File::open(path).unwrap(), DEFAULT_MAX_ENTRIES).unwrap();
    assert_eq!(blob.header().accessory, Some(0xdead_beef));
    assert_eq!(blob.entries().count(), 1);
}

#[test]
fn oversized_part_name_is_overflow() {
    let dir = tempfile::tempdir().unwrap();
    write_payloads(dir.path(), &[("a.bin", b"A")]);

    let list = format!("a.bin {} 0 0 common", "p".repeat(37));
    let err = parse_entry_list(&list, BlobType::Update).unwrap_err();
    assert!(err.is_overflow());
    assert_eq!(bupkit::Error::from(err).kind(), ErrorKind::ContentOverflow);
}

#[test]
fn malformed_entry_list_is_invalid_input() {
    let err = parse_entry_list("a.bin mb1 0", BlobType::Update).unwrap_err();
    assert_eq!(bupkit::Error::from(err).kind(), ErrorKind::InvalidInput);

    let err = parse_entry_list(" ; ", BlobType::Update).unwrap_err();
    assert_eq!(bupkit::Error::from(err).kind(), ErrorKind::InvalidInput);
}
