// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{
    check_children, check_props, ensure, floats, no_children, no_props, u32s, u64s, u8s, CheckResult,
    SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

/// Length of the `sm-ecid` string: 25 hex digits and a NUL
const ECID_LEN: usize = 26;

/// Checks that every name in `names` is absent or a single `u32`.
fn optional_u32s(node: Node<'_>, names: &[&str]) -> CheckResult {
    for name in names {
        u32s(node, name).optional().single()?;
    }

    Ok(())
}

/// Checks that every name in `names` is absent or present with no value.
fn optional_flags(node: Node<'_>, names: &[&str]) -> CheckResult {
    for name in names {
        u32s(node, name).optional().with(|x| x.is_empty())?;
    }

    Ok(())
}

pub(super) fn check_root(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)?;
    check_children(node, &["sku"], &[".+"])?;

    let has_external_memory = node.child("external-memory").is_some();
    let has_emc_strap = node.child("emc-strap").is_some();
    ensure(!(has_external_memory && has_emc_strap), || {
        SchemaViolation::node(node, "Root node must not have both 'emc-strap' and 'external-memory' child nodes")
    })
}

pub(super) fn check_sku(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)?;
    ensure(node.has_children(), || SchemaViolation::node(node, format!("Node '{}' is empty", node.path())))
}

pub(super) fn check_sku_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["valid-sku-ids"], &[])?;
    no_children(node)?;

    u32s(node, "valid-sku-ids").with(|x| !x.is_empty())?;

    Ok(())
}

pub(super) fn check_diagnostics(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["level"])?;
    no_children(node)?;

    optional_u32s(node, &["level"])
}

/// Error collator. Its children are only checked by their own rule.
pub(super) fn check_ec(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["ftti-budget", "nsr-car-applied", "default-masters"])?;

    optional_u32s(node, &["ftti-budget", "default-masters"])?;
    optional_flags(node, &["nsr-car-applied"])
}

pub(super) fn check_ec_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["hsm-id"], &["threshold", "policy"])?;
    no_children(node)?;

    u32s(node, "hsm-id").single()?;
    u32s(node, "threshold").optional().single()?;
    u32s(node, "policy").optional().with(|x| !x.is_empty() && x.len() % 3 == 0)?;

    Ok(())
}

pub(super) fn check_fmon(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["default-masters"])?;
    check_children(node, &[], &["fmon@.+", "vrefro"])?;

    optional_u32s(node, &["default-masters"])
}

pub(super) fn check_fmon_fmon(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &["clk-id"],
        &["ht-coeffs", "lt-coeffs", "rw-coeffs", "fault-reports", "fault-actions", "min-rate", "max-rate"],
    )?;
    no_children(node)?;

    u32s(node, "clk-id").single()?;
    for name in ["ht-coeffs", "lt-coeffs", "rw-coeffs"] {
        floats(node, name).optional().count(3)?;
    }
    optional_u32s(node, &["fault-reports", "fault-actions"])?;
    u64s(node, "min-rate").optional().single()?;
    u64s(node, "max-rate").optional().single()?;

    Ok(())
}

pub(super) fn check_fmon_vrefro(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["freq-adjust", "rev-limit"])?;
    no_children(node)?;

    optional_u32s(node, &["freq-adjust", "rev-limit"])
}

pub(super) fn check_ftrace(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["enable"])?;
    no_children(node)?;

    optional_u32s(node, &["enable"])
}

pub(super) fn check_fuse(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["sm-ecid", "tsensor_coeff_sel"])?;
    no_children(node)?;

    u8s(node, "sm-ecid").optional().count(ECID_LEN)?;
    optional_u32s(node, &["tsensor_coeff_sel"])
}

pub(super) fn check_mail(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["edition"], &["dbs"])?;
    check_children(node, &[], &["acl"])?;

    u32s(node, "edition").single()?;
    optional_u32s(node, &["dbs"])
}

/// Access lists are free-form.
pub(super) fn check_mail_acl(_: &ChipTables, _: Node<'_>) -> CheckResult {
    Ok(())
}

pub(super) fn check_reset(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["default-masters"])?;
    check_children(node, &[], &["reset@.+"])?;

    optional_u32s(node, &["default-masters"])
}

pub(super) fn check_reset_reset(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["reset-id"], &["masters"])?;
    no_children(node)?;

    u32s(node, "reset-id").single()?;
    optional_u32s(node, &["masters"])
}

pub(super) fn check_serial(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["port", "log-level", "has_input"])?;
    check_children(node, &[], &["combined-uart"])?;

    optional_u32s(node, &["port", "log-level"])?;
    optional_flags(node, &["has_input"])
}

pub(super) fn check_serial_combined_uart(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["enabled"])?;
    no_children(node)?;

    optional_flags(node, &["enabled"])
}

pub(super) fn check_system_cfg(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["spe-enabled", "osc-on-during-sc7", "sec-faults-rst-en"])?;
    check_children(node, &[], &["sc7"])?;

    optional_u32s(node, &["spe-enabled", "osc-on-during-sc7"])
}

pub(super) fn check_system_cfg_sc7(_: &ChipTables, node: Node<'_>) -> CheckResult {
    const TIMERS: &[&str] = &["wake-delay", "pwrgood-timer", "osc-prepwr-timer", "osc-postpwr-timer"];

    check_props(node, &[], TIMERS)?;
    no_children(node)?;

    optional_u32s(node, TIMERS)
}

pub(super) fn check_uphy(_: &ChipTables, node: Node<'_>) -> CheckResult {
    const STRINGS: &[&str] = &["status", "ufs-config", "nvhs-owner"];
    const FLAGS: &[&str] = &[
        "pcie-c0-endpoint-enable",
        "pcie-c0-endpoint-use-int-refclk",
        "pcie-c4-endpoint-enable",
        "pcie-c4-endpoint-use-int-refclk",
        "pcie-c5-endpoint-enable",
        "pcie-c5-endpoint-use-int-refclk",
        "sata-enable",
        "force-ufs-init",
    ];

    let optional: Vec<&'static str> = STRINGS.iter().chain(FLAGS).copied().collect();
    check_props(node, &["pcie-xbar-config"], &optional)?;
    check_children(node, &[], &["sata-fuse-override"])?;

    u8s(node, "pcie-xbar-config").with(|x| !x.is_empty())?;
    for name in STRINGS {
        u8s(node, name).optional().with(|x| !x.is_empty())?;
    }

    optional_flags(node, FLAGS)
}

pub(super) fn check_uphy_sata_fuse_override(_: &ChipTables, node: Node<'_>) -> CheckResult {
    const SELECTS: &[&str] = &["tx-drv-amp-sel0", "tx-drv-amp-sel1", "tx-drv-post-sel0", "tx-drv-post-sel1"];

    check_props(node, &[], SELECTS)?;
    no_children(node)?;

    optional_u32s(node, SELECTS)
}
