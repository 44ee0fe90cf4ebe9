// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{check_children, check_props, ensure, no_children, no_props, u32s, Check, CheckResult, Rule, SchemaViolation};
use crate::{chip::ChipTables, node::Node};

/// The bus the boot firmware talks to the PMIC over
const PMIC_BUS_ID: u32 = 5;
/// Slowest controller clock that still supports fast-mode plus, in Hz
const MIN_CONTROLLER_CLOCK: u32 = 38_400_000;

/// `i2c-busses` rule tree with the chip-specific firewall rule check.
pub(super) fn rules(fw_rule: Check) -> Rule {
    Rule::new("i2c-busses", check_busses).subrules(vec![Rule::new(".+", check_bus)
        .subrules(vec![Rule::new("i2c_firewall_rules", check_fw_rules).subrules(vec![Rule::new(".+", fw_rule)])])])
}

fn check_busses(_: &ChipTables, node: Node<'_>) -> CheckResult {
    let path = node.path();

    no_props(node)?;
    ensure(node.has_children(), || SchemaViolation::node(node, format!("Node '{path}' is empty")))?;

    let mut has_pmic_bus = false;
    for bus in node.children() {
        if u32s(bus, "i2c-id").single()?.first() == Some(&PMIC_BUS_ID) {
            has_pmic_bus = true;
            break;
        }
    }

    ensure(has_pmic_bus, || SchemaViolation::node(node, format!("Node '{path}' is missing required I2C5 child node")))
}

fn check_bus(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["i2c-id", "controller-clock", "bus-clock"], &["tlow", "thigh"])?;
    check_children(node, &[], &["i2c_firewall_rules"])?;

    u32s(node, "i2c-id").one(|id| (1..=10).contains(&id))?;
    u32s(node, "controller-clock").one(|hz| hz >= MIN_CONTROLLER_CLOCK)?;
    u32s(node, "bus-clock").one(|hz| (100_000..=1_000_000).contains(&hz))?;
    u32s(node, "tlow").optional().one(|t| (1..=16).contains(&t))?;
    u32s(node, "thigh").optional().one(|t| (1..=16).contains(&t))?;

    Ok(())
}

fn check_fw_rules(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

fn check_fw_rule(node: Node<'_>, optional: &[&'static str]) -> CheckResult {
    check_props(node, &["addr_range_low", "addr_range_high"], optional)?;
    no_children(node)?;

    u32s(node, "addr_range_low").single()?;
    u32s(node, "addr_range_high").single()?;
    for name in optional {
        u32s(node, name).optional().single()?;
    }

    Ok(())
}

pub(super) fn check_fw_rule_t194(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_fw_rule(node, &["action", "addr_range_type"])
}

pub(super) fn check_fw_rule_t23x(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_fw_rule(node, &["action", "addr_range_type", "allow_reads"])
}
