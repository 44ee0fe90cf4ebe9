// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{
    check_children, check_props, ensure, is_flag, is_frequency, no_children, u32s, u64s, CheckResult,
    SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

/// Prefix shared by all per-clock rate cap properties
const MAX_RATE_PREFIX: &str = "max-rate";

pub(super) fn check_clocks_t194(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["disable-unreferenced", "default-masters"])?;
    check_children(node, &[], &["clock@.+", "init", "lateinit"])?;

    u32s(node, "disable-unreferenced").optional().one(is_flag)?;
    u32s(node, "default-masters").optional().one(|m| tables.within_doorbells(m))?;

    Ok(())
}

pub(super) fn check_clocks(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["jtag-oist-control", "default-acl", "keep-unreferenced"])?;
    check_children(node, &[], &["clock@.+", "init", "lateinit"])?;

    u32s(node, "jtag-oist-control").optional().one(is_flag)?;
    u32s(node, "default-acl").optional().one(|m| tables.within_doorbells(m))?;
    u32s(node, "keep-unreferenced").optional().one(is_flag)?;

    Ok(())
}

/// `init` and `lateinit`: every property is a `<clk parent rate enable>`
/// tuple applied at boot.
pub(super) fn check_init(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    no_children(node)?;

    for prop in node.properties() {
        let tuple = u32s(node, prop.name).count(4)?;
        let Ok([clk, parent, rate, enable]) = <[u32; 4]>::try_from(tuple.as_slice()) else {
            continue;
        };

        ensure(tables.is_clock(clk), || invalid_field(node, prop.name, "clk"))?;
        ensure(parent == 0 || tables.is_parent_of(clk, parent), || invalid_field(node, prop.name, "parent"))?;
        ensure(is_frequency(u64::from(rate)), || invalid_field(node, prop.name, "rate"))?;
        ensure(tables.within_enablers(enable), || invalid_field(node, prop.name, "enable"))?;
    }

    Ok(())
}

fn invalid_field(node: Node<'_>, prop: &str, what: &str) -> SchemaViolation {
    SchemaViolation::property(node, prop, format!("Node '{}' property '{prop}' has invalid {what}", node.path()))
}

fn check_max_rates(node: Node<'_>) -> CheckResult {
    for prop in node.properties().filter(|p| p.name.starts_with(MAX_RATE_PREFIX)) {
        u64s(node, prop.name).one(is_frequency)?;
    }

    Ok(())
}

pub(super) fn check_clock_t194(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &["clk-id"],
        &[
            "allowed-parents",
            "masters",
            "mrq_rate_locked",
            "mrq_hide",
            "pll_freq_table",
            "allow_fractional_divider",
            "max-rate.*",
        ],
    )?;
    no_children(node)?;

    let clk = u32s(node, "clk-id").value(|c| tables.is_clock(c))?;

    u32s(node, "allowed-parents").optional().each(|p| tables.is_parent_of(clk, p))?;
    u32s(node, "masters").optional().one(|m| tables.within_doorbells(m))?;
    u32s(node, "mrq_rate_locked").optional().one(is_flag)?;
    u32s(node, "mrq_hide").optional().one(is_flag)?;
    u32s(node, "pll_freq_table").optional().with(|x| !x.is_empty() && x.len() % 9 == 0 && tables.is_pll(clk))?;
    u32s(node, "allow_fractional_divider").optional().one(|v| is_flag(v) && tables.is_frac_clock(clk))?;

    check_max_rates(node)
}

pub(super) fn check_clock(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["clk-id"], &["acl", "disable-spread", "max-rate.*"])?;
    no_children(node)?;

    let clk = u32s(node, "clk-id").value(|c| tables.is_clock(c))?;

    u32s(node, "acl").optional().one(|m| tables.within_doorbells(m))?;
    u32s(node, "disable-spread").optional().one(|v| is_flag(v) && tables.is_pll(clk))?;

    check_max_rates(node)
}
