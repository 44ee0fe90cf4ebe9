// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Entry lists: `;`-separated entries of whitespace-separated fields.
//!
//! ```text
//! update: <file> <part_name> <version> <op_mode> <spec_info>
//! bmp:    <file> <bmp_type> <resolution>
//! ```

use log::debug;

use super::{
    layout::{PART_NAME_MAX, SPEC_INFO_SIZE},
    BlobType, Error, Result,
};
use crate::codec::CodecError;

/// Spec that applies to every board, stored as an empty `spec_info`.
pub const COMMON_SPEC: &str = "common";

const BMP_TYPES: &[&str] = &[
    "nvidia",
    "lowbattery",
    "charging",
    "charged",
    "fullycharged",
    "sata_fw_ota",
    "verity_yellow_pause",
    "verity_yellow_continue",
    "verity_orange_pause",
    "verity_orange_continue",
    "verity_red_pause",
    "verity_red_continue",
    "verity_red_stop",
];

const BMP_RESOLUTIONS: &[&str] = &["480", "720", "810", "1080", "4k", "1200_p"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntrySpec {
    /// Payload file, resolved when packing
    pub file: String,
    pub part_name: String,
    pub version: u32,
    /// 0 common, 1 dev, 2 prod
    pub op_mode: u32,
    /// Empty for `common`
    pub spec_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmpEntrySpec {
    pub file: String,
    pub bmp_type: u32,
    pub resolution: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySpec {
    Update(UpdateEntrySpec),
    Bmp(BmpEntrySpec),
}

impl EntrySpec {
    pub fn file(&self) -> &str {
        match self {
            EntrySpec::Update(e) => &e.file,
            EntrySpec::Bmp(e) => &e.file,
        }
    }
}

/// Parses `list` into entries of type `ty`.
///
/// Malformed versions and op modes fall back to 0; names that don't fit
/// their on-disk field are rejected.
pub fn parse_entry_list(list: &str, ty: BlobType) -> Result<Vec<EntrySpec>> {
    let mut entries = Vec::new();

    for raw in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != ty.entry_fields() {
            return Err(Error::InvalidEntry { entry: raw.to_owned(), expected: ty.entry_fields(), found: fields.len() });
        }

        let entry = match ty {
            BlobType::Update => EntrySpec::Update(parse_update(&fields)?),
            BlobType::Bmp => EntrySpec::Bmp(parse_bmp(&fields)?),
        };
        debug!("entry: {entry:?}");
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(Error::EmptyEntryList);
    }

    Ok(entries)
}

fn check_len(field: &'static str, value: &str, limit: usize) -> Result<()> {
    if value.len() > limit {
        return Err(CodecError::StringTooLong { field, value: value.to_owned(), len: value.len(), limit }.into());
    }

    Ok(())
}

fn parse_hex(s: &str) -> u32 {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(digits, 16).unwrap_or(0)
}

fn parse_update(fields: &[&str]) -> Result<UpdateEntrySpec> {
    let &[file, part_name, version, op_mode, spec_info] = fields else {
        return Err(Error::InvalidEntry { entry: fields.join(" "), expected: 5, found: fields.len() });
    };

    check_len("part_name", part_name, PART_NAME_MAX)?;
    check_len("spec_info", spec_info, SPEC_INFO_SIZE)?;

    Ok(UpdateEntrySpec {
        file: file.to_owned(),
        part_name: part_name.to_owned(),
        version: parse_hex(version),
        op_mode: op_mode.parse().unwrap_or(0),
        spec_info: if spec_info == COMMON_SPEC { String::new() } else { spec_info.to_owned() },
    })
}

/// Unknown names map to one past the last known code.
fn code(table: &[&str], name: &str) -> u32 {
    table.iter().position(|&t| t == name).unwrap_or(table.len()) as u32
}

fn parse_bmp(fields: &[&str]) -> Result<BmpEntrySpec> {
    let &[file, bmp_type, resolution] = fields else {
        return Err(Error::InvalidEntry { entry: fields.join(" "), expected: 3, found: fields.len() });
    };

    Ok(BmpEntrySpec {
        file: file.to_owned(),
        bmp_type: code(BMP_TYPES, bmp_type),
        resolution: code(BMP_RESOLUTIONS, resolution),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(list: &str) -> Vec<UpdateEntrySpec> {
        parse_entry_list(list, BlobType::Update)
            .unwrap()
            .into_iter()
            .map(|e| match e {
                EntrySpec::Update(u) => u,
                EntrySpec::Bmp(_) => panic!("expected an update entry"),
            })
            .collect()
    }

    #[test]
    fn parses_update_entries() {
        let entries = update("a.bin mb1 2 0 common; b.bin  mb2 0x10 1 spec-a ;");

        assert_eq!(
            entries,
            [
                UpdateEntrySpec {
                    file: "a.bin".into(),
                    part_name: "mb1".into(),
                    version: 2,
                    op_mode: 0,
                    spec_info: String::new(),
                },
                UpdateEntrySpec {
                    file: "b.bin".into(),
                    part_name: "mb2".into(),
                    version: 0x10,
                    op_mode: 1,
                    spec_info: "spec-a".into(),
                },
            ]
        );
    }

    #[test]
    fn malformed_numbers_become_zero() {
        let entries = update("a.bin mb1 zz two spec");
        assert_eq!(entries[0].version, 0);
        assert_eq!(entries[0].op_mode, 0);

        assert_eq!(update("a.bin mb1 ff 2 spec")[0].version, 0xff);
    }

    #[test]
    fn wrong_arity_is_fatal() {
        let err = parse_entry_list("a.bin mb1 2 0", BlobType::Update).unwrap_err();
        assert!(matches!(err, Error::InvalidEntry { expected: 5, found: 4, .. }));

        let err = parse_entry_list("a.bmp nvidia", BlobType::Bmp).unwrap_err();
        assert!(matches!(err, Error::InvalidEntry { expected: 3, found: 2, .. }));

        assert!(matches!(parse_entry_list(" ; ", BlobType::Update), Err(Error::EmptyEntryList)));
    }

    #[test]
    fn long_names_overflow() {
        let list = format!("a.bin {} 0 0 common", "p".repeat(37));
        let err = parse_entry_list(&list, BlobType::Update).unwrap_err();
        assert!(err.is_overflow());

        let list = format!("a.bin {} 0 0 common", "p".repeat(36));
        assert!(parse_entry_list(&list, BlobType::Update).is_ok());

        let list = format!("a.bin mb1 0 0 {}", "s".repeat(129));
        let err = parse_entry_list(&list, BlobType::Update).unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::StringTooLong { field: "spec_info", .. })));
    }

    #[test]
    fn bmp_names_map_to_codes() {
        let entries = parse_entry_list("n.bmp nvidia 1080; r.bmp verity_red_stop 4k; x.bmp other 999", BlobType::Bmp).unwrap();
        let codes: Vec<(u32, u32)> = entries
            .iter()
            .map(|e| match e {
                EntrySpec::Bmp(b) => (b.bmp_type, b.resolution),
                EntrySpec::Update(_) => panic!("expected a bmp entry"),
            })
            .collect();

        assert_eq!(codes, [(0, 3), (12, 4), (13, 6)]);
    }
}
