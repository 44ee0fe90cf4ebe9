// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Dynamic voltage scaling: per-clock rail tables and per-rail floors.

use super::{
    check_children, check_props, ensure, floats, is_frequency, is_voltage, no_children, no_props,
    thermal::follow_temp_ranges, u32s, u64s, CheckResult, SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

/// CVB coefficient count for a rail with and without temperature ranges
const CVB_COEFFS_THERMAL: usize = 15;
const CVB_COEFFS_PLAIN: usize = 3;
/// `vmin` cell count for a rail with and without temperature ranges
const VMIN_THERMAL: usize = 5;
const VMIN_PLAIN: usize = 1;

/// Whether `rail` carries a (well-formed) `temp-ranges` reference. The
/// reference itself is followed when the rail is checked.
fn has_temp_ranges(rail: Node<'_>) -> CheckResult<bool> {
    Ok(!u32s(rail, "temp-ranges").optional().single()?.is_empty())
}

fn has_child_with_prefix(node: Node<'_>, prefix: &str) -> bool {
    node.children().any(|c| c.name().starts_with(prefix))
}

pub(super) fn check_dvfs_revision(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_children(node)?;
    for prop in node.properties() {
        u32s(node, prop.name).single()?;
    }

    Ok(())
}

pub(super) fn check_dvs(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)?;
    check_children(node, &[], &["clock@.+", "rail@.+"])
}

pub(super) fn check_clock(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["clk-id"], &[])?;
    check_children(node, &[], &["rail@.+"])?;

    u32s(node, "clk-id").one(|c| tables.is_clock(c))?;

    Ok(())
}

pub(super) fn check_clock_rail(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["rail-id"], &["temp-ranges", "vmin"])?;
    check_children(node, &[], &["opp@.+", "bin@.+"])?;

    u32s(node, "rail-id").one(|r| tables.is_rail(r))?;
    follow_temp_ranges(tables, node, false)?;
    u32s(node, "vmin").optional().one(is_voltage)?;

    let has_opp = has_child_with_prefix(node, "opp@");
    let has_bin = has_child_with_prefix(node, "bin@");
    ensure(has_opp != has_bin, || {
        SchemaViolation::node(node, format!("Node '{}' must have either opp or bin child node", node.path()))
    })
}

/// Operating point under a clock rail, directly or through a bin.
fn check_opp(node: Node<'_>, rail: Node<'_>) -> CheckResult {
    check_props(node, &["freq", "cvb-coeffs"], &[])?;
    no_children(node)?;

    let coeffs = if has_temp_ranges(rail)? { CVB_COEFFS_THERMAL } else { CVB_COEFFS_PLAIN };

    u64s(node, "freq").one(is_frequency)?;
    floats(node, "cvb-coeffs").count(coeffs)?;

    Ok(())
}

pub(super) fn check_clock_rail_opp(_: &ChipTables, node: Node<'_>) -> CheckResult {
    match node.parent() {
        Some(rail) => check_opp(node, rail),
        None => Ok(()),
    }
}

pub(super) fn check_clock_rail_bin_opp(_: &ChipTables, node: Node<'_>) -> CheckResult {
    match node.parent().and_then(|bin| bin.parent()) {
        Some(rail) => check_opp(node, rail),
        None => Ok(()),
    }
}

pub(super) fn check_clock_rail_bin(_: &ChipTables, node: Node<'_>) -> CheckResult {
    let path = node.path();

    check_props(node, &["bin-bottom"], &["coeffs", "max-frequency", "vmin"])?;
    check_children(node, &[], &["opp@.+"])?;

    u32s(node, "bin-bottom").single()?;
    floats(node, "coeffs").optional().with(|x| x.len() == 3 || x.len() == 10)?;

    let has_opp = has_child_with_prefix(node, "opp@");
    let has_coeffs = node.has_property("coeffs");
    ensure(has_opp != has_coeffs, || {
        SchemaViolation::node(node, format!("Node '{path}' must have either opp child node or coeffs property"))
    })?;

    if has_coeffs {
        u64s(node, "max-frequency").optional().one(is_frequency)?;
        u32s(node, "vmin").optional().one(is_voltage)?;
        Ok(())
    } else {
        ensure(!node.has_property("max-frequency") && !node.has_property("vmin"), || {
            SchemaViolation::node(
                node,
                format!("Node '{path}' must have coeffs property with max-frequency and vmin properties"),
            )
        })
    }
}

fn check_vmin(node: Node<'_>, thermal: bool) -> CheckResult {
    let len = if thermal { VMIN_THERMAL } else { VMIN_PLAIN };
    u32s(node, "vmin").optional().with(|x| x.len() == len && x.iter().all(|&v| is_voltage(v)))?;

    Ok(())
}

pub(super) fn check_rail(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["rail-id"], &["vmin", "temp-ranges"])?;
    check_children(node, &[], &["bin@.+"])?;

    u32s(node, "rail-id").one(|r| tables.is_rail(r))?;
    let thermal = follow_temp_ranges(tables, node, false)?;

    check_vmin(node, thermal)
}

pub(super) fn check_rail_bin(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["bin-bottom"], &["vmin"])?;
    no_children(node)?;

    let thermal = match node.parent() {
        Some(rail) => has_temp_ranges(rail)?,
        None => false,
    };

    u32s(node, "bin-bottom").single()?;
    check_vmin(node, thermal)
}
