// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Rule-driven validation of a parsed devicetree.
//!
//! A [`Rule`] pairs a node-name [`Pattern`] with a check function and a list
//! of sub-rules. Applying a rule to a node whose name matches runs the check,
//! then applies every sub-rule to every child. The first violation aborts the
//! walk.
//!
//! Check functions are built from a handful of helpers: [`check_props`] and
//! [`check_children`] constrain which names may appear, and the typed array
//! views ([`u32s`], [`s32s`], ...) decode a property as big-endian cells and
//! test the decoded array.

mod avfs;
mod clocks;
mod dvs;
mod emc;
mod i2c;
mod platform;
mod power;
mod thermal;

use core::marker::PhantomData;

use log::debug;
use thiserror::Error;

use crate::{
    chip::{Chip, ChipTables},
    node::{DeviceTree, Node},
    properties::{decode_array, Cell},
};

pub use thermal::{check_temp_ranges, temp_ranges_valid};

pub const CLK_MIN_RATE: u64 = 0;
pub const CLK_MAX_RATE: u64 = 6_000_000_000;
pub const VOLTAGE_MIN_UV: u32 = 450_000;
pub const VOLTAGE_MAX_UV: u32 = 1_300_000;
pub const TEMP_MIN_MC: i32 = -60_000;
pub const TEMP_MAX_MC: i32 = 127_000;

/// The first schema rule a node failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaViolation {
    /// Path of the offending node
    pub path: String,
    /// Property the violation is about, if any
    pub property: Option<String>,
    pub message: String,
}

impl SchemaViolation {
    pub fn node(node: Node<'_>, message: impl Into<String>) -> Self {
        Self { path: node.path(), property: None, message: message.into() }
    }

    pub fn property(node: Node<'_>, prop: &str, message: impl Into<String>) -> Self {
        Self { path: node.path(), property: Some(prop.to_owned()), message: message.into() }
    }
}

pub type CheckResult<T = ()> = Result<T, SchemaViolation>;

/// Check run on every node a rule matches
pub type Check = fn(&ChipTables, Node<'_>) -> CheckResult;

/// Returns `Ok(())` if `cond` holds, otherwise the violation built by `err`.
#[inline]
pub fn ensure(cond: bool, err: impl FnOnce() -> SchemaViolation) -> CheckResult {
    if cond {
        Ok(())
    } else {
        Err(err())
    }
}

/// Full-match name pattern.
///
/// Written the way the rule tables spell them: a literal (`sku`), a literal
/// followed by `.+` (at least one more character) or `.*` (anything), or a
/// bare `.+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Exact(&'static str),
    Prefix { prefix: &'static str, non_empty_rest: bool },
}

impl Pattern {
    pub fn new(pattern: &'static str) -> Self {
        if let Some(prefix) = pattern.strip_suffix(".+") {
            Pattern::Prefix { prefix, non_empty_rest: true }
        } else if let Some(prefix) = pattern.strip_suffix(".*") {
            Pattern::Prefix { prefix, non_empty_rest: false }
        } else {
            Pattern::Exact(pattern)
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match *self {
            Pattern::Exact(exact) => name == exact,
            Pattern::Prefix { prefix, non_empty_rest } => {
                name.strip_prefix(prefix).is_some_and(|rest| !non_empty_rest || !rest.is_empty())
            }
        }
    }
}

impl core::fmt::Display for Pattern {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Pattern::Exact(exact) => f.write_str(exact),
            Pattern::Prefix { prefix, non_empty_rest: true } => write!(f, "{prefix}.+"),
            Pattern::Prefix { prefix, non_empty_rest: false } => write!(f, "{prefix}.*"),
        }
    }
}

pub struct Rule {
    pattern: Pattern,
    check: Check,
    subrules: Vec<Rule>,
}

impl Rule {
    pub fn new(pattern: &'static str, check: Check) -> Self {
        Self { pattern: Pattern::new(pattern), check, subrules: Vec::new() }
    }

    pub fn subrules(mut self, subrules: Vec<Rule>) -> Self {
        self.subrules = subrules;
        self
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Applies the rule to `node` and, if it matches, recursively to its
    /// children.
    pub fn apply(&self, tables: &ChipTables, node: Node<'_>) -> CheckResult {
        if !self.pattern.matches(node.name()) {
            return Ok(());
        }

        debug!("checking {} against '{}'", node.path(), self.pattern);
        (self.check)(tables, node)?;

        for child in node.children() {
            for rule in &self.subrules {
                rule.apply(tables, child)?;
            }
        }

        Ok(())
    }
}

/// Validates the whole tree against the rule set of `chip`.
pub fn validate(tree: &DeviceTree, chip: Chip, tables: &ChipTables) -> CheckResult {
    rules_for(chip).apply(tables, tree.root())
}

fn matches_any(patterns: &[&'static str], name: &str) -> bool {
    patterns.iter().any(|p| Pattern::new(p).matches(name))
}

/// Every `required` property is present and every present property is either
/// required or matches one of the `optional` patterns.
pub fn check_props(node: Node<'_>, required: &[&str], optional: &[&'static str]) -> CheckResult {
    let path = node.path();

    for name in required {
        if !node.has_property(name) {
            return Err(SchemaViolation::property(
                node,
                name,
                format!("Node '{path}' is missing required property '{name}'"),
            ));
        }
    }

    for prop in node.properties() {
        if !required.contains(&prop.name) && !matches_any(optional, prop.name) {
            return Err(SchemaViolation::property(
                node,
                prop.name,
                format!("Node '{path}' has unknown property '{}'", prop.name),
            ));
        }
    }

    Ok(())
}

/// [`check_props`] over child node names.
pub fn check_children(node: Node<'_>, required: &[&str], optional: &[&'static str]) -> CheckResult {
    let path = node.path();

    for name in required {
        if node.child(name).is_none() {
            return Err(SchemaViolation::node(node, format!("Node '{path}' is missing required child node '{name}'")));
        }
    }

    for child in node.children() {
        if !required.contains(&child.name()) && !matches_any(optional, child.name()) {
            return Err(SchemaViolation::node(
                node,
                format!("Node '{path}' has unknown child node '{}'", child.name()),
            ));
        }
    }

    Ok(())
}

/// No properties at all
pub fn no_props(node: Node<'_>) -> CheckResult {
    check_props(node, &[], &[])
}

/// No child nodes at all
pub fn no_children(node: Node<'_>) -> CheckResult {
    check_children(node, &[], &[])
}

/// Typed view of one property, decoded as an array of `T` cells.
///
/// The property is required unless [`TypedArray::optional`] is called; an
/// absent optional property passes every check and decodes to an empty
/// array.
#[must_use]
pub struct TypedArray<'a, T> {
    node: Node<'a>,
    prop: &'a str,
    required: bool,
    _cell: PhantomData<T>,
}

pub fn u8s<'a>(node: Node<'a>, prop: &'a str) -> TypedArray<'a, u8> {
    TypedArray::new(node, prop)
}

pub fn u32s<'a>(node: Node<'a>, prop: &'a str) -> TypedArray<'a, u32> {
    TypedArray::new(node, prop)
}

pub fn s32s<'a>(node: Node<'a>, prop: &'a str) -> TypedArray<'a, i32> {
    TypedArray::new(node, prop)
}

pub fn u64s<'a>(node: Node<'a>, prop: &'a str) -> TypedArray<'a, u64> {
    TypedArray::new(node, prop)
}

pub fn floats<'a>(node: Node<'a>, prop: &'a str) -> TypedArray<'a, f32> {
    TypedArray::new(node, prop)
}

impl<'a, T: Cell> TypedArray<'a, T> {
    fn new(node: Node<'a>, prop: &'a str) -> Self {
        Self { node, prop, required: true, _cell: PhantomData }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn decode(&self) -> CheckResult<Option<Vec<T>>> {
        let path = self.node.path();

        let Some(prop) = self.node.property(self.prop) else {
            return match self.required {
                true => Err(SchemaViolation::property(
                    self.node,
                    self.prop,
                    format!("Node '{path}' is missing required property '{}'", self.prop),
                )),
                false => Ok(None),
            };
        };

        match decode_array::<T>(prop.value) {
            Some(values) => Ok(Some(values)),
            None => Err(SchemaViolation::property(
                self.node,
                self.prop,
                format!("Node '{path}' property '{}' has incorrect size for {} cells", self.prop, T::NAME),
            )),
        }
    }

    fn invalid(&self) -> SchemaViolation {
        SchemaViolation::property(
            self.node,
            self.prop,
            format!("Node '{}' property '{}' is invalid", self.node.path(), self.prop),
        )
    }

    /// Decodes the property and requires `pred` to hold for the whole array.
    pub fn with(self, pred: impl FnOnce(&[T]) -> bool) -> CheckResult<Vec<T>> {
        match self.decode()? {
            Some(values) if pred(&values) => Ok(values),
            Some(_) => Err(self.invalid()),
            None => Ok(Vec::new()),
        }
    }

    /// Exactly one cell
    pub fn single(self) -> CheckResult<Vec<T>> {
        self.with(|x| x.len() == 1)
    }

    /// Exactly one cell satisfying `pred`
    pub fn one(self, pred: impl FnOnce(T) -> bool) -> CheckResult<Vec<T>> {
        self.with(|x| matches!(x, [v] if pred(*v)))
    }

    /// Exactly `n` cells
    pub fn count(self, n: usize) -> CheckResult<Vec<T>> {
        self.with(|x| x.len() == n)
    }

    /// Any number of cells, including none
    pub fn any(self) -> CheckResult<Vec<T>> {
        self.with(|_| true)
    }

    /// At least one cell, every cell satisfying `pred`
    pub fn each(self, pred: impl Fn(T) -> bool) -> CheckResult<Vec<T>> {
        self.with(|x| !x.is_empty() && x.iter().all(|v| pred(*v)))
    }

    /// Required single cell satisfying `pred`, returned by value.
    pub fn value(self, pred: impl FnOnce(T) -> bool) -> CheckResult<T> {
        let invalid = self.invalid();
        self.one(pred)?.first().copied().ok_or(invalid)
    }
}

/// Resolves a phandle found in `prop` of `node`.
pub fn resolve_phandle<'a>(node: Node<'a>, prop: &str, phandle: u32) -> CheckResult<Node<'a>> {
    node.get_by_phandle(phandle).ok_or_else(|| {
        SchemaViolation::property(node, prop, format!("Invalid phandle '{phandle}' at '{}'", node.path()))
    })
}

pub fn is_frequency(hz: u64) -> bool {
    (CLK_MIN_RATE..=CLK_MAX_RATE).contains(&hz)
}

pub fn is_voltage(uv: u32) -> bool {
    (VOLTAGE_MIN_UV..=VOLTAGE_MAX_UV).contains(&uv)
}

pub fn is_temperature(mc: i32) -> bool {
    (TEMP_MIN_MC..=TEMP_MAX_MC).contains(&mc)
}

/// `0` or `1`
pub fn is_flag(v: u32) -> bool {
    v <= 1
}

/// Rule tree for `chip`.
pub fn rules_for(chip: Chip) -> Rule {
    let sku = || Rule::new("sku", platform::check_sku).subrules(vec![Rule::new(".+", platform::check_sku_node)]);

    match chip {
        Chip::T194 => Rule::new("", platform::check_root).subrules(vec![
            Rule::new("adc", power::check_adc).subrules(vec![Rule::new(".+", power::check_adc_node)]),
            Rule::new("aotag", thermal::check_aotag),
            Rule::new("avfs", avfs::check_avfs).subrules(vec![
                Rule::new("clock@.+", avfs::check_clock).subrules(vec![
                    Rule::new("bin@.+", avfs::check_clock_bin),
                    Rule::new("clvc", avfs::check_clock_clvc),
                    Rule::new("tuning", avfs::check_clock_tuning),
                ]),
                Rule::new("tuning", avfs::check_tuning),
            ]),
            Rule::new("clocks", clocks::check_clocks_t194).subrules(vec![
                Rule::new("init", clocks::check_init),
                Rule::new("lateinit", clocks::check_init),
                Rule::new("clock@.+", clocks::check_clock_t194),
            ]),
            Rule::new("diagnostics", platform::check_diagnostics),
            Rule::new("dvfs-revision", dvs::check_dvfs_revision),
            Rule::new("dvs", dvs::check_dvs).subrules(vec![
                Rule::new("clock@.+", dvs::check_clock).subrules(vec![Rule::new("rail@.+", dvs::check_clock_rail)
                    .subrules(vec![
                        Rule::new("opp@.+", dvs::check_clock_rail_opp),
                        Rule::new("bin@.+", dvs::check_clock_rail_bin)
                            .subrules(vec![Rule::new("opp@.+", dvs::check_clock_rail_bin_opp)]),
                    ])]),
                Rule::new("rail@.+", dvs::check_rail).subrules(vec![Rule::new("bin@.+", dvs::check_rail_bin)]),
            ]),
            Rule::new("ec", platform::check_ec).subrules(vec![Rule::new(".+", platform::check_ec_node)]),
            Rule::new("emc-strap", emc::check_emc_strap),
            Rule::new("external-memory", emc::check_external_memory),
            Rule::new("fmon", platform::check_fmon).subrules(vec![
                Rule::new("fmon@.+", platform::check_fmon_fmon),
                Rule::new("vrefro", platform::check_fmon_vrefro),
            ]),
            Rule::new("fps", power::check_fps),
            Rule::new("ftrace", platform::check_ftrace),
            Rule::new("fuse", platform::check_fuse),
            i2c::rules(i2c::check_fw_rule_t194),
            Rule::new("mail", platform::check_mail).subrules(vec![Rule::new("acl", platform::check_mail_acl)]),
            Rule::new("pdomains", power::check_pdomains).subrules(vec![Rule::new("domain@.+", power::check_domain)]),
            Rule::new("regulators", power::check_regulators)
                .subrules(vec![Rule::new(".+", power::check_regulators_node)]),
            Rule::new("reliability-management", power::check_rm).subrules(vec![Rule::new(".+", power::check_rm_node)]),
            Rule::new("reset", platform::check_reset).subrules(vec![Rule::new("reset@.+", platform::check_reset_reset)]),
            Rule::new("serial", platform::check_serial)
                .subrules(vec![Rule::new("combined-uart", platform::check_serial_combined_uart)]),
            sku(),
            Rule::new("soctherm", thermal::check_soctherm).subrules(vec![
                Rule::new("thermtrip", thermal::check_soctherm_trip),
                Rule::new("hsmtrip", thermal::check_soctherm_trip),
                Rule::new("throttle", thermal::check_soctherm_throttle),
                Rule::new("edp_oc", thermal::check_soctherm_edp_oc),
                Rule::new("throttlectl", thermal::check_soctherm_throttlectl),
            ]),
            Rule::new("speedo", power::check_speedo).subrules(vec![Rule::new(".+", power::check_speedo_node)]),
            Rule::new("system-cfg", platform::check_system_cfg)
                .subrules(vec![Rule::new("sc7", platform::check_system_cfg_sc7)]),
            Rule::new("tj_max", thermal::check_tj_max).subrules(vec![Rule::new("tz_list", thermal::check_tz_list)]),
            Rule::new("uphy", platform::check_uphy)
                .subrules(vec![Rule::new("sata-fuse-override", platform::check_uphy_sata_fuse_override)]),
            Rule::new("vrmon", power::check_vrmon).subrules(vec![Rule::new(".+", power::check_vrmon_node)]),
        ]),
        Chip::T234 => Rule::new("", platform::check_root).subrules(vec![
            Rule::new("clocks", clocks::check_clocks).subrules(vec![
                Rule::new("init", clocks::check_init),
                Rule::new("lateinit", clocks::check_init),
                Rule::new("clock@.+", clocks::check_clock),
            ]),
            Rule::new("diagnostics", platform::check_diagnostics),
            Rule::new("ec", platform::check_ec).subrules(vec![Rule::new(".+", platform::check_ec_node)]),
            Rule::new("fps", power::check_fps),
            Rule::new("ftrace", platform::check_ftrace),
            i2c::rules(i2c::check_fw_rule_t23x),
            Rule::new("mail", platform::check_mail).subrules(vec![Rule::new("acl", platform::check_mail_acl)]),
            Rule::new("pdomains", power::check_pdomains).subrules(vec![Rule::new("domain@.+", power::check_domain)]),
            Rule::new("regulators", power::check_regulators)
                .subrules(vec![Rule::new(".+", power::check_regulators_node)]),
            Rule::new("reset", platform::check_reset).subrules(vec![Rule::new("reset@.+", platform::check_reset_reset)]),
            Rule::new("serial", platform::check_serial)
                .subrules(vec![Rule::new("combined-uart", platform::check_serial_combined_uart)]),
            sku(),
            Rule::new("system-cfg", platform::check_system_cfg)
                .subrules(vec![Rule::new("sc7", platform::check_system_cfg_sc7)]),
        ]),
        Chip::T239 | Chip::Th500 => Rule::new("", platform::check_root).subrules(vec![sku()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns() {
        assert!(Pattern::new("").matches(""));
        assert!(!Pattern::new("").matches("sku"));
        assert!(Pattern::new("sku").matches("sku"));
        assert!(!Pattern::new("sku").matches("skus"));
        assert!(Pattern::new(".+").matches("node@0"));
        assert!(!Pattern::new(".+").matches(""));
        assert!(Pattern::new("clock@.+").matches("clock@12"));
        assert!(!Pattern::new("clock@.+").matches("clock@"));
        assert!(!Pattern::new("clock@.+").matches("clocks"));
        assert!(Pattern::new("max-rate.*").matches("max-rate"));
        assert!(Pattern::new("max-rate.*").matches("max-rate-dvfs"));
        assert_eq!(Pattern::new("bin@.+").to_string(), "bin@.+");
    }

    #[test]
    fn domain_ranges() {
        assert!(is_frequency(0));
        assert!(is_frequency(6_000_000_000));
        assert!(!is_frequency(6_000_000_001));
        assert!(is_voltage(450_000));
        assert!(!is_voltage(449_999));
        assert!(!is_voltage(1_300_001));
        assert!(is_temperature(-60_000));
        assert!(is_temperature(127_000));
        assert!(!is_temperature(127_001));
    }

    #[test]
    fn rule_sets_cover_sku() {
        for chip in Chip::ALL {
            let root = rules_for(chip);
            assert_eq!(root.pattern(), Pattern::Exact(""));
            assert!(root.subrules.iter().any(|r| r.pattern() == Pattern::Exact("sku")), "{chip}");
        }

        assert_eq!(rules_for(Chip::T239).subrules.len(), 1);
        assert!(rules_for(Chip::T194).subrules.len() > rules_for(Chip::T234).subrules.len());
    }
}
