// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! External memory controller tables and the strap selection that picks one.

use super::{
    check_props, ensure, no_children, resolve_phandle, u32s, u8s, CheckResult, SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

const T18_EMC: &str = "nvidia,tegra18-emc";
const T210B01_EMC: &str = "nvidia,tegra210b01-emc";
const T19X_EMC_TABLE: &str = "nvidia,t19x-emc-table";

/// Blob property name of a T210B01 per-frequency table
const T210B01_BLOB: &str = "nvidia,t210b01-emc-table";
/// `compatible` base of a T19x per-frequency table
const T19X_TABLE_BASE: &str = "nvidia,tegra19-emc";
/// Smallest valid T19x per-frequency blob, in bytes
const T19X_BLOB_MIN_LEN: usize = 13404;

/// Number of strap codes the hardware can encode
const STRAP_CODES: u32 = 16;

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

/// Checks one per-frequency table under an EMC node whose top-level
/// `compatible` is `top`.
fn check_blob(top: &str, node: Node<'_>) -> CheckResult {
    let (cbase, bname) = match top {
        T210B01_EMC => (top, T210B01_BLOB),
        T19X_EMC_TABLE => (T19X_TABLE_BASE, top),
        _ => (top, top),
    };

    check_props(node, &["compatible", bname], &[])?;

    let regular = nul_terminated(&format!("{cbase}-table"));
    let derated = nul_terminated(&format!("{cbase}-table-derated"));
    let compatible = u8s(node, "compatible").with(|x| !x.is_empty())?;
    ensure(compatible == regular || compatible == derated, || {
        SchemaViolation::property(node, "compatible", format!("Invalid 'compatible' at {}", node.path()))
    })?;

    if bname == T19X_EMC_TABLE {
        u8s(node, bname).with(|x| x.len() >= T19X_BLOB_MIN_LEN)?;
    }

    Ok(())
}

/// An EMC table node, either referenced from a strap or at
/// `/external-memory`.
fn check_emc(node: Node<'_>) -> CheckResult {
    check_props(node, &["compatible"], &[".+"])?;

    let raw = u8s(node, "compatible").with(|x| !x.is_empty())?;
    let known = [T18_EMC, T210B01_EMC, T19X_EMC_TABLE].into_iter().find(|c| nul_terminated(c) == raw);
    let Some(compatible) = known else {
        return Err(SchemaViolation::property(
            node,
            "compatible",
            format!("Invalid compatible {} at {}", String::from_utf8_lossy(&raw), node.path()),
        ));
    };

    if compatible == T210B01_EMC || compatible == T19X_EMC_TABLE {
        ensure(node.has_children(), || SchemaViolation::node(node, format!("Subnodes missing at {}", node.path())))?;
        for child in node.children() {
            check_blob(compatible, child)?;
        }
    }

    u8s(node, "basic-configuration").optional().with(|x| x.len() == 4 || x.len() == 8)?;
    u32s(node, "mr4_poll_temp").optional().count(2)?;
    u32s(node, "mr4_policy").optional().with(|x| x.len() == 8 && x.iter().all(|v| [1, 2, 4, 5, 6].contains(v)))?;

    Ok(())
}

pub(super) fn check_emc_strap(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["select-first-compatible", "select"])?;
    no_children(node)?;

    let first = u32s(node, "select-first-compatible")
        .optional()
        .with(|x| !x.is_empty() && x.len() % 2 == 0 && x.chunks_exact(2).all(|pair| pair[0] < STRAP_CODES))?;
    for pair in first.chunks_exact(2) {
        check_emc(resolve_phandle(node, "select-first-compatible", pair[1])?)?;
    }

    let select = u32s(node, "select").optional().with(|x| x.len() == 4 || x.len() == 16)?;
    // Unused strap slots hold a null phandle
    for &phandle in select.iter().filter(|&&p| p != 0) {
        check_emc(resolve_phandle(node, "select", phandle)?)?;
    }

    ensure(first.is_empty() != select.is_empty(), || {
        SchemaViolation::node(node, "Either 'select-first-compatible or 'select' must be specified")
    })
}

pub(super) fn check_external_memory(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_emc(node)
}
