// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{
    check_children, check_props, is_temperature, no_children, resolve_phandle, s32s, u32s, CheckResult,
};
use crate::{chip::ChipTables, node::Node};

/// Number of (low, high) pairs in a `tranges` table, excluding the trailing
/// safe range.
const TRANGE_PAIRS: usize = 4;

/// Validates a `tranges` table: four strictly increasing, overlapping
/// `(low, high)` windows followed by a safe window spanning the lowest low to
/// the highest high.
pub fn temp_ranges_valid(x: &[i32]) -> bool {
    if x.len() != 2 * TRANGE_PAIRS + 2 || !x.iter().all(|&t| is_temperature(t)) {
        return false;
    }

    let mut prev: Option<(i32, i32)> = None;
    for pair in x[..2 * TRANGE_PAIRS].chunks_exact(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if lo >= hi {
            return false;
        }

        if let Some((lo_prev, hi_prev)) = prev {
            if lo <= lo_prev || hi <= hi_prev || lo >= hi_prev {
                return false;
            }
        }

        prev = Some((lo, hi));
    }

    x[2 * TRANGE_PAIRS] == x[0] && x[2 * TRANGE_PAIRS + 1] == x[2 * TRANGE_PAIRS - 1]
}

/// Checks a temperature-range node referenced by phandle.
pub fn check_temp_ranges(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["thermzone-id", "tranges"], &["linux,phandle", "phandle"])?;
    no_children(node)?;

    u32s(node, "thermzone-id").single()?;
    s32s(node, "tranges").with(temp_ranges_valid)?;
    u32s(node, "linux,phandle").optional().single()?;
    u32s(node, "phandle").optional().single()?;

    Ok(())
}

/// Follows the `temp-ranges` phandle of `node`, if present, and checks the
/// target. Returns whether the property was present.
pub(super) fn follow_temp_ranges(tables: &ChipTables, node: Node<'_>, required: bool) -> CheckResult<bool> {
    let view = u32s(node, "temp-ranges");
    let view = if required { view } else { view.optional() };

    match view.single()?.first() {
        Some(&phandle) => {
            check_temp_ranges(tables, resolve_phandle(node, "temp-ranges", phandle)?)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub(super) fn check_aotag(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["thermtrip", "hsm_trip", "enable_quad_bias"])?;
    no_children(node)?;

    s32s(node, "thermtrip").optional().single()?;
    s32s(node, "hsm_trip").optional().single()?;
    u32s(node, "enable_quad_bias").optional().single()?;

    Ok(())
}

pub(super) fn check_soctherm(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["force_fallback", "fallback_offsets", "enable_quad_bias"])?;
    check_children(node, &[], &["thermtrip", "hsmtrip", "throttle", "edp_oc", "throttlectl"])?;

    u32s(node, "force_fallback").optional().with(|x| !x.is_empty())?;
    u32s(node, "fallback_offsets").optional().with(|x| !x.is_empty() && x.len() % 3 == 0)?;
    u32s(node, "enable_quad_bias").optional().single()?;

    Ok(())
}

/// Every property of `node` is an `s32` array with one of `lens` elements.
fn all_s32_props(node: Node<'_>, lens: &[usize]) -> CheckResult {
    no_children(node)?;
    for prop in node.properties() {
        s32s(node, prop.name).with(|x| lens.contains(&x.len()))?;
    }

    Ok(())
}

/// `thermtrip` and `hsmtrip`
pub(super) fn check_soctherm_trip(_: &ChipTables, node: Node<'_>) -> CheckResult {
    all_s32_props(node, &[2])
}

pub(super) fn check_soctherm_throttle(_: &ChipTables, node: Node<'_>) -> CheckResult {
    all_s32_props(node, &[4, 7])
}

pub(super) fn check_soctherm_edp_oc(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_children(node)?;
    for prop in node.properties() {
        u32s(node, prop.name).count(7)?;
    }

    Ok(())
}

pub(super) fn check_soctherm_throttlectl(_: &ChipTables, node: Node<'_>) -> CheckResult {
    all_s32_props(node, &[4])
}

pub(super) fn check_tj_max(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["poll_period"])?;
    check_children(node, &["tz_list"], &[])?;

    u32s(node, "poll_period").optional().single()?;

    Ok(())
}

pub(super) fn check_tz_list(_: &ChipTables, node: Node<'_>) -> CheckResult {
    all_s32_props(node, &[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: [i32; 10] = [-40000, 10000, 0, 50000, 40000, 90000, 80000, 125000, -40000, 125000];

    #[test]
    fn valid_ranges() {
        assert!(temp_ranges_valid(&GOOD));
    }

    #[test]
    fn ranges_must_overlap() {
        let mut x = GOOD;
        // second window starts above the first one's high end
        x[2] = 20000;
        assert!(!temp_ranges_valid(&x));
    }

    #[test]
    fn ranges_must_increase() {
        let mut x = GOOD;
        x[4] = -10000;
        assert!(!temp_ranges_valid(&x));

        let mut x = GOOD;
        x[3] = 5000;
        assert!(!temp_ranges_valid(&x));
    }

    #[test]
    fn safe_range_spans_all() {
        let mut x = GOOD;
        x[9] = 120000;
        assert!(!temp_ranges_valid(&x));

        let mut x = GOOD;
        x[8] = -39000;
        assert!(!temp_ranges_valid(&x));
    }

    #[test]
    fn out_of_range_temperature() {
        let mut x = GOOD;
        x[0] = -61000;
        x[8] = -61000;
        assert!(!temp_ranges_valid(&x));
        assert!(!temp_ranges_valid(&GOOD[..8]));
    }
}
