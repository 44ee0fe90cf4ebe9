// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Adaptive voltage and frequency scaling tables.

use super::{
    check_children, check_props, ensure, floats, is_flag, no_children, s32s, thermal::follow_temp_ranges, u32s,
    u64s, CheckResult, SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

/// Upper bound on any frequency an AVFS table may name, in Hz
const AVFS_MAX_FREQUENCY: u64 = 10_000_000_000;
/// Upper bound on a vfgain voltage limit, in µV
const VFGAIN_MAX_VLIM: u32 = 10_000_000;
const VFGAIN_GROUP: usize = 6;

pub(super) fn check_avfs(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["clvc-period"])?;
    check_children(node, &[], &["clock@.+", "tuning"])?;

    u32s(node, "clvc-period").optional().single()?;

    Ok(())
}

/// Five gain fields in `0..=15` then a strictly increasing voltage limit, per
/// group of six cells.
fn vfgain_valid(x: &[u32]) -> bool {
    if x.is_empty() || x.len() % VFGAIN_GROUP != 0 {
        return false;
    }

    let mut vprev = None;
    for group in x.chunks_exact(VFGAIN_GROUP) {
        let (gains, vlim) = (&group[..5], group[5]);
        if !gains.iter().all(|&g| g <= 15) {
            return false;
        }

        if vlim > VFGAIN_MAX_VLIM || vprev.is_some_and(|p| vlim <= p) {
            return false;
        }

        vprev = Some(vlim);
    }

    true
}

/// Strictly increasing, bounded, and containing the clock's limits if set.
fn freq_list_valid(x: &[u64], fmin: Option<u64>, fmax: Option<u64>) -> bool {
    if x.is_empty() {
        return false;
    }

    let increasing = x.windows(2).all(|w| w[0] < w[1]);
    let bounded = x.iter().all(|&f| f <= AVFS_MAX_FREQUENCY);

    increasing
        && bounded
        && fmin.map_or(true, |f| x.contains(&f))
        && fmax.map_or(true, |f| x.contains(&f))
}

pub(super) fn check_clock(tables: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &["clk-id", "pdiv", "mdiv", "temp-ranges", "vfgain"],
        &[
            "vmin",
            "coeffs",
            "use-auto-skipper",
            "max-frequency",
            "min-frequency",
            "vcap-at-fmax",
            "static-vfgain",
            "allow-auto-cc3",
            "freq-list",
            "vrev-off",
            "vmin-off",
        ],
    )?;
    check_children(node, &[], &["bin@.+", "clvc", "tuning"])?;

    u32s(node, "clk-id").single()?;
    u32s(node, "pdiv").one(|v| (1..32).contains(&v))?;
    u32s(node, "mdiv").one(|v| (1..32).contains(&v))?;

    follow_temp_ranges(tables, node, true)?;

    u32s(node, "vfgain").with(vfgain_valid)?;
    floats(node, "vmin").optional().count(15)?;
    floats(node, "coeffs").optional().count(10)?;
    u32s(node, "use-auto-skipper").optional().one(is_flag)?;

    let fmax = u64s(node, "max-frequency").optional().one(|v| v <= AVFS_MAX_FREQUENCY)?.first().copied();
    let fmin = u64s(node, "min-frequency").optional().one(|v| v <= AVFS_MAX_FREQUENCY)?.first().copied();
    if let (Some(fmin), Some(fmax)) = (fmin, fmax) {
        ensure(fmax > fmin, || {
            SchemaViolation::node(node, format!("Invalid frequency limits {fmin}-{fmax} at {}", node.path()))
        })?;
    }

    u32s(node, "vcap-at-fmax").optional().single()?;
    u32s(node, "static-vfgain").optional().with(|x| x.len() == 3 && x.iter().all(|&v| v <= 15))?;
    u32s(node, "allow-auto-cc3").optional().one(is_flag)?;
    u64s(node, "freq-list").optional().with(|x| freq_list_valid(x, fmin, fmax))?;
    s32s(node, "vrev-off").optional().one(|v| (-1_000_000..=1_000_000).contains(&v))?;
    s32s(node, "vmin-off").optional().one(|v| (-1_000_000..=1_000_000).contains(&v))?;

    Ok(())
}

pub(super) fn check_clock_bin(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["bin-bottom", "coeffs"], &["max-frequency", "min-frequency", "vmin"])?;
    no_children(node)?;

    u32s(node, "bin-bottom").single()?;
    floats(node, "coeffs").count(10)?;
    u64s(node, "max-frequency").optional().single()?;
    u64s(node, "min-frequency").optional().single()?;
    floats(node, "vmin").optional().count(15)?;

    Ok(())
}

pub(super) fn check_clock_clvc(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &["max-uvreq-offset", "min-error-threshold"],
        &[
            "use-freq-clvc",
            "use-uv-clvc",
            "pgain",
            "igain",
            "dgain",
            "max-adj-step-uv",
            "floor-uvreq",
            "req-offset",
            "max-integral-error",
        ],
    )?;
    no_children(node)?;

    u32s(node, "max-uvreq-offset").one(|v| v <= 1_000_000)?;
    u32s(node, "min-error-threshold").one(|v| v <= 1_000_000_000)?;

    // Exactly one controller mode, and it has to be switched on
    let freq = u32s(node, "use-freq-clvc").optional().single()?;
    let uv = u32s(node, "use-uv-clvc").optional().single()?;
    let mode_ok = match (freq.first(), uv.first()) {
        (Some(&f), None) => f > 0,
        (None, Some(&u)) => u > 0,
        _ => false,
    };
    ensure(mode_ok, || {
        SchemaViolation::node(node, format!("Invalid use-freq-clvc/use-uv-clvc at {}", node.path()))
    })?;

    for gain in ["pgain", "igain", "dgain"] {
        floats(node, gain).optional().one(|v| v <= 1000.0)?;
    }

    u32s(node, "max-adj-step-uv").optional().one(|v| v <= 1_000_000)?;
    u32s(node, "floor-uvreq").optional().single()?;
    s32s(node, "req-offset").optional().one(|v| (0..=3).contains(&v))?;
    u64s(node, "max-integral-error").optional().one(|v| v <= i32::MAX as u64)?;

    Ok(())
}

/// Tuning properties and the largest value each accepts
const CLOCK_TUNING: &[(&str, Option<u32>)] = &[
    ("fll-init", Some(255)),
    ("fll-ldmem", Some(255)),
    ("fll-switch-ldmem", Some(31)),
    ("fll-ctrl", None),
    ("pd-tune-logic", Some(7)),
    ("pd-tune-sram", Some(7)),
    ("frug-fast", Some(15)),
    ("frug-main", Some(15)),
    ("sram-init", Some(15)),
    ("sram-threshold", Some(15)),
    ("sram-accu-num", Some(15)),
    ("skp-ramp-rate", Some(31)),
    ("low-gain-accu-num", Some(15)),
    ("low-gain-threshold", Some(15)),
    ("low-gain-init", Some(15)),
    ("pd-tune-lw", Some(63)),
];

pub(super) fn check_clock_tuning(_: &ChipTables, node: Node<'_>) -> CheckResult {
    let names: Vec<&'static str> = CLOCK_TUNING.iter().map(|(name, _)| *name).collect();
    check_props(node, &[], &names)?;
    no_children(node)?;

    for &(name, max) in CLOCK_TUNING {
        u32s(node, name).optional().one(|v| max.map_or(true, |max| v <= max))?;
    }

    Ok(())
}

pub(super) fn check_tuning(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["ndiv-req-off"])?;
    no_children(node)?;

    u32s(node, "ndiv-req-off").optional().one(|v| v <= 3)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vfgain() {
        assert!(vfgain_valid(&[1, 2, 3, 4, 5, 800_000, 0, 0, 0, 0, 15, 900_000]));
        assert!(!vfgain_valid(&[]));
        assert!(!vfgain_valid(&[1, 2, 3, 4, 5]));
        // gain out of range
        assert!(!vfgain_valid(&[16, 2, 3, 4, 5, 800_000]));
        // voltage limits must increase
        assert!(!vfgain_valid(&[1, 2, 3, 4, 5, 900_000, 1, 2, 3, 4, 5, 900_000]));
        assert!(!vfgain_valid(&[1, 2, 3, 4, 5, 10_000_001]));
    }

    #[test]
    fn freq_list() {
        assert!(freq_list_valid(&[100, 200, 300], Some(100), Some(300)));
        assert!(freq_list_valid(&[100, 200, 300], None, None));
        assert!(!freq_list_valid(&[100, 200, 300], Some(150), None));
        assert!(!freq_list_valid(&[200, 100], None, None));
        assert!(!freq_list_valid(&[100, 100], None, None));
        assert!(!freq_list_valid(&[AVFS_MAX_FREQUENCY + 1], None, None));
        assert!(!freq_list_valid(&[], None, None));
    }
}
