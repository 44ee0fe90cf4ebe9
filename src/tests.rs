// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use crate::{
    chip::{Chip, ChipTables},
    schema, *,
};

const FDT_BEGIN_NODE: u32 = 1;
const FDT_END_NODE: u32 = 2;
const FDT_PROP: u32 = 3;
const FDT_END: u32 = 9;

/// Assembles version 17 FDT blobs: header, an empty reservation map, the
/// structure block and a deduplicated strings block.
pub(crate) struct FdtBuilder {
    structs: Vec<u8>,
    strings: Vec<u8>,
}

impl FdtBuilder {
    pub(crate) fn new() -> Self {
        Self { structs: Vec::new(), strings: Vec::new() }
    }

    fn token(&mut self, token: u32) {
        self.structs.extend_from_slice(&token.to_be_bytes());
    }

    fn pad(&mut self) {
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn string_offset(&mut self, name: &str) -> u32 {
        let mut offset = 0;
        for s in self.strings.split(|&b| b == 0) {
            if s == name.as_bytes() && offset < self.strings.len() {
                return offset as u32;
            }
            offset += s.len() + 1;
        }

        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        offset
    }

    pub(crate) fn begin_node(mut self, name: &str) -> Self {
        self.token(FDT_BEGIN_NODE);
        self.structs.extend_from_slice(name.as_bytes());
        self.structs.push(0);
        self.pad();
        self
    }

    pub(crate) fn end_node(mut self) -> Self {
        self.token(FDT_END_NODE);
        self
    }

    pub(crate) fn prop(mut self, name: &str, value: &[u8]) -> Self {
        let nameoff = self.string_offset(name);
        self.token(FDT_PROP);
        self.token(value.len() as u32);
        self.token(nameoff);
        self.structs.extend_from_slice(value);
        self.pad();
        self
    }

    pub(crate) fn prop_u32s(self, name: &str, cells: &[u32]) -> Self {
        let value: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.prop(name, &value)
    }

    pub(crate) fn prop_s32s(self, name: &str, cells: &[i32]) -> Self {
        let value: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.prop(name, &value)
    }

    pub(crate) fn prop_str(self, name: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.prop(name, &bytes)
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        self.token(FDT_END);

        let off_mem_rsvmap = 40u32;
        let off_dt_struct = off_mem_rsvmap + 16;
        let off_dt_strings = off_dt_struct + self.structs.len() as u32;
        let totalsize = off_dt_strings + self.strings.len() as u32;

        let header = [
            0xd00d_feed,
            totalsize,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            17,
            16,
            0,
            self.strings.len() as u32,
            self.structs.len() as u32,
        ];

        let mut blob: Vec<u8> = header.iter().flat_map(|v| v.to_be_bytes()).collect();
        blob.extend_from_slice(&[0; 16]);
        blob.extend_from_slice(&self.structs);
        blob.extend_from_slice(&self.strings);
        blob
    }
}

fn with_sku(builder: FdtBuilder) -> FdtBuilder {
    builder.begin_node("sku").begin_node("node@0").prop_u32s("valid-sku-ids", &[1]).end_node().end_node()
}

fn cpus_fdt() -> Vec<u8> {
    with_sku(FdtBuilder::new().begin_node(""))
        .begin_node("cpus")
        .prop_u32s("#address-cells", &[1])
        .begin_node("cpu@0")
        .prop_str("device_type", "cpu")
        .prop_u32s("reg", &[0])
        .prop_u32s("phandle", &[1])
        .end_node()
        .begin_node("cpu@1")
        .prop_str("device_type", "cpu")
        .prop_u32s("reg", &[1])
        .prop_u32s("phandle", &[2])
        .end_node()
        .end_node()
        .end_node()
        .build()
}

#[test]
fn builder_header() {
    let data = cpus_fdt();
    let tree = DeviceTree::parse(&data).unwrap();

    let header = tree.header();
    assert_eq!(header.magic, 0xd00d_feed);
    assert_eq!(header.version, 17);
    assert_eq!(header.totalsize as usize, data.len());
    assert_eq!(header.off_dt_struct, 56);
}

#[test]
fn navigate_tree() {
    let data = cpus_fdt();
    let tree = DeviceTree::parse(&data).unwrap();

    let root = tree.root();
    assert_eq!(root.name(), "");
    assert_eq!(root.path(), "/");
    assert_eq!(root.depth(), 0);
    assert!(root.parent().is_none());

    let cpu = tree.find_node("/cpus/cpu@1").unwrap();
    assert_eq!(cpu.path(), "/cpus/cpu@1");
    assert_eq!(cpu.depth(), 2);
    assert_eq!(cpu.node_name().name, "cpu");
    assert_eq!(cpu.node_name().unit_address, Some("1"));
    assert_eq!(cpu.node_name().to_string(), "cpu@1");
    assert_eq!(cpu.parent().unwrap().path(), "/cpus");
    assert_eq!(cpu.property("reg").unwrap().as_array::<u32>(), Some(vec![1]));
    assert_eq!(cpu.property("device_type").unwrap().as_str(), Some("cpu"));

    assert!(tree.find_node("/cpus/cpu@2").is_none());
    assert!(tree.find_node("cpus").is_none());
    assert_eq!(tree.find_node("/").unwrap(), root);
}

#[test]
fn phandle_lookup() {
    let data = cpus_fdt();
    let tree = DeviceTree::parse(&data).unwrap();

    assert_eq!(tree.find_phandle(1).unwrap().path(), "/cpus/cpu@0");
    assert_eq!(tree.root().get_by_phandle(2).unwrap().path(), "/cpus/cpu@1");
    assert!(tree.find_phandle(3).is_none());
}

#[test]
fn all_nodes_depth_first() {
    let data = cpus_fdt();
    let tree = DeviceTree::parse(&data).unwrap();

    let paths: Vec<String> = tree.all_nodes().map(|n| n.path()).collect();
    assert_eq!(paths, ["/", "/sku", "/sku/node@0", "/cpus", "/cpus/cpu@0", "/cpus/cpu@1"]);
}

#[test]
fn property_order_is_kept() {
    let data = cpus_fdt();
    let tree = DeviceTree::parse(&data).unwrap();

    let names: Vec<&str> = tree.find_node("/cpus/cpu@0").unwrap().properties().map(|p| p.name).collect();
    assert_eq!(names, ["device_type", "reg", "phandle"]);
}

#[test]
fn rejects_bad_magic() {
    let mut data = cpus_fdt();
    data[0] = 0;

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::BadMagic(0x000d_feed))));
}

#[test]
fn rejects_bad_version() {
    let mut data = cpus_fdt();
    data[23] = 16;

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::UnsupportedVersion { version: 16, .. })));
}

#[test]
fn rejects_truncated_blob() {
    let data = cpus_fdt();

    assert!(matches!(DeviceTree::parse(&data[..data.len() - 4]), Err(FdtError::SizeMismatch { .. })));
    assert!(matches!(DeviceTree::parse(&data[..20]), Err(FdtError::BufferTooSmall(20))));
}

#[test]
fn rejects_unclosed_root() {
    let data = with_sku(FdtBuilder::new().begin_node("")).build();

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::Truncated)));
}

#[test]
fn rejects_duplicate_node() {
    let data = FdtBuilder::new().begin_node("").begin_node("a").end_node().begin_node("a").end_node().end_node().build();

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::DuplicateNode(name)) if name == "a"));
}

#[test]
fn rejects_duplicate_property() {
    let data = FdtBuilder::new().begin_node("").prop_u32s("x", &[1]).prop_u32s("x", &[2]).end_node().build();

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::DuplicateProperty(name)) if name == "x"));
}

#[test]
fn rejects_duplicate_phandle() {
    let data = FdtBuilder::new()
        .begin_node("")
        .begin_node("a")
        .prop_u32s("phandle", &[7])
        .end_node()
        .begin_node("b")
        .prop_u32s("phandle", &[7])
        .end_node()
        .end_node()
        .build();

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::DuplicatePhandle(7))));
}

#[test]
fn rejects_wide_phandle() {
    let data = FdtBuilder::new().begin_node("").begin_node("a").prop_u32s("phandle", &[1, 2]).end_node().end_node().build();

    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::InvalidPhandle(path)) if path == "/a"));
}

#[test]
fn rejects_invalid_names() {
    let data = FdtBuilder::new().begin_node("").begin_node("bad name").end_node().end_node().build();
    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::InvalidNodeName(name)) if name == "bad name"));

    let data = FdtBuilder::new().begin_node("").begin_node("clock@").end_node().end_node().build();
    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::InvalidNodeName(_))));

    let data = FdtBuilder::new().begin_node("").prop_u32s("a=b", &[1]).end_node().build();
    assert!(matches!(DeviceTree::parse(&data), Err(FdtError::InvalidPropertyName(name)) if name == "a=b"));
}

fn regulator_fdt(compatible: &str) -> Vec<u8> {
    with_sku(FdtBuilder::new().begin_node(""))
        .begin_node("regulators")
        .begin_node("reg0")
        .prop_u32s("rail-id", &[1])
        .prop_u32s("dev", &[1])
        .end_node()
        .end_node()
        .begin_node("pmic")
        .prop_str("compatible", compatible)
        .prop_u32s("phandle", &[1])
        .end_node()
        .end_node()
        .build()
}

#[test]
fn unknown_regulator_device() {
    let data = regulator_fdt("unknown");

    let err = dtbcheck(&data, Chip::T234, &Chip::T234.tables()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);

    let Error::Schema(violation) = err else { panic!("expected a schema violation") };
    assert_eq!(violation.path, "/pmic");
    assert_eq!(violation.property.as_deref(), Some("compatible"));
    assert_eq!(violation.message, "Unknown regulator device '/pmic'");
}

#[test]
fn unresolved_regulator_phandle() {
    let data = with_sku(FdtBuilder::new().begin_node(""))
        .begin_node("regulators")
        .begin_node("reg0")
        .prop_u32s("rail-id", &[1])
        .prop_u32s("dev", &[9])
        .end_node()
        .end_node()
        .end_node()
        .build();

    let tree = DeviceTree::parse(&data).unwrap();
    let violation = schema::validate(&tree, Chip::T234, &Chip::T234.tables()).unwrap_err();
    assert_eq!(violation.path, "/regulators/reg0");
    assert_eq!(violation.message, "Invalid phandle '9' at '/regulators/reg0'");
}

const OVERLAPPING_TRANGES: [i32; 10] = [10, 20, 30, 40, 20, 50, 60, 70, 10, 70];
const VALID_TRANGES: [i32; 10] = [10, 20, 15, 30, 25, 40, 35, 50, 10, 50];

fn dvs_fdt(tranges: &[i32]) -> Vec<u8> {
    with_sku(FdtBuilder::new().begin_node(""))
        .begin_node("dvs")
        .begin_node("rail@0")
        .prop_u32s("rail-id", &[0])
        .prop_u32s("temp-ranges", &[1])
        .end_node()
        .end_node()
        .begin_node("tr")
        .prop_u32s("thermzone-id", &[0])
        .prop_s32s("tranges", tranges)
        .prop_u32s("phandle", &[1])
        .end_node()
        .end_node()
        .build()
}

#[test]
fn overlapping_temperature_ranges() {
    let data = dvs_fdt(&OVERLAPPING_TRANGES);
    let tree = DeviceTree::parse(&data).unwrap();
    let node = tree.find_node("/tr").unwrap();

    let violation = schema::check_temp_ranges(&ChipTables::default(), node).unwrap_err();
    assert_eq!(violation.property.as_deref(), Some("tranges"));
    assert!(violation.message.contains("property 'tranges' is invalid"));

    let violation = schema::validate(&tree, Chip::T194, &Chip::T194.tables()).unwrap_err();
    assert_eq!(violation.path, "/tr");
    assert_eq!(violation.property.as_deref(), Some("tranges"));
}

#[test]
fn dvs_rail_with_temperature_ranges() {
    let data = dvs_fdt(&VALID_TRANGES);

    let signed = dtbcheck(&data, Chip::T194, &Chip::T194.tables()).unwrap();
    assert_eq!(signed.len() % 64, 0);
    assert_eq!(&signed[8..data.len()], &data[8..]);
}

#[test]
fn root_requires_sku() {
    let data = FdtBuilder::new().begin_node("").begin_node("other").end_node().end_node().build();

    for chip in Chip::ALL {
        let err = dtbcheck(&data, chip, &chip.tables()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }
}

#[test]
fn sku_only_tree_passes_every_chip() {
    let data = with_sku(FdtBuilder::new().begin_node("")).end_node().build();

    for chip in Chip::ALL {
        let signed = dtbcheck(&data, chip, &chip.tables()).unwrap();
        signer::verify(&signed, &data, chip.info()).unwrap();
    }
}

#[test]
fn empty_sku_ids_rejected() {
    let data = FdtBuilder::new()
        .begin_node("")
        .begin_node("sku")
        .begin_node("node@0")
        .prop("valid-sku-ids", &[])
        .end_node()
        .end_node()
        .end_node()
        .build();

    let tree = DeviceTree::parse(&data).unwrap();
    let violation = schema::validate(&tree, Chip::T239, &ChipTables::default()).unwrap_err();
    assert_eq!(violation.path, "/sku/node@0");
    assert_eq!(violation.property.as_deref(), Some("valid-sku-ids"));
}

#[test]
fn corrupt_input_kind() {
    let mut data = cpus_fdt();
    data[0] = 0;

    let err = dtbcheck(&data, Chip::T234, &Chip::T234.tables()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FdtCorrupt);
}

#[cfg(feature = "pretty-printing")]
#[test]
fn pretty_print_dump() {
    let data = FdtBuilder::new()
        .begin_node("")
        .begin_node("sku")
        .begin_node("node@0")
        .prop_u32s("valid-sku-ids", &[1, 0x10])
        .prop_str("label", "board")
        .prop("compatible", b"nvidia,a\0nvidia,b\0")
        .prop("flag", &[])
        .end_node()
        .end_node()
        .end_node()
        .build();
    let tree = DeviceTree::parse(&data).unwrap();

    let expected = "/ {\n    sku {\n        node@0 {\n            valid-sku-ids = <0x1 0x10>;\n            label = \"board\";\n            compatible = \"nvidia,a\", \"nvidia,b\";\n            flag;\n        };\n    };\n};\n";
    assert_eq!(tree.to_string(), expected);
}
