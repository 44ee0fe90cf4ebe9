// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Rails, regulators and the monitors watching them.

use super::{
    check_children, check_props, ensure, no_children, no_props, resolve_phandle, s32s, u32s, u8s, CheckResult,
    SchemaViolation,
};
use crate::{chip::ChipTables, node::Node};

/// Boot budget for settling a rail, in µs
const RAMP_DELAY_BUDGET_US: u32 = 10_000;
/// Voltage swing the linear ramp delay is scaled over, in µV
const RAMP_SWING_UV: u32 = 300_000;

pub(super) fn check_adc(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

pub(super) fn check_adc_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["adc-id"], &["vmon", "cal"])?;
    no_children(node)?;

    u32s(node, "adc-id").single()?;
    u32s(node, "vmon").optional().count(4)?;
    u32s(node, "cal").optional().count(3)?;

    Ok(())
}

pub(super) fn check_fps(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &[],
        &[
            "sc7-sequence",
            "sc8-sequence",
            "hibernate-late-sequence",
            "resume-early-sequence",
            "sc7-exit-sequence",
            "reboot-sequence",
            "shutdown-sequence",
        ],
    )?;
    no_children(node)?;

    for prop in node.properties() {
        u8s(node, prop.name).with(|x| !x.is_empty())?;
    }

    Ok(())
}

pub(super) fn check_pdomains(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &[], &["no-powergate-on-boot"])?;
    check_children(node, &[], &["domain@.+"])?;

    u32s(node, "no-powergate-on-boot").optional().single()?;

    Ok(())
}

pub(super) fn check_domain(_: &ChipTables, node: Node<'_>) -> CheckResult {
    const OPTIONAL: &[&str] = &["always-off", "always-on", "initial", "target"];

    check_props(node, &["id"], OPTIONAL)?;
    no_children(node)?;

    u32s(node, "id").single()?;
    for name in OPTIONAL {
        u32s(node, name).optional().single()?;
    }

    Ok(())
}

/// A device a rail or monitor points at, selected by its `compatible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Device {
    Dummy,
    Fixed,
    OpenVreg,
    Vrs11,
    Max20480,
    Vrs12,
}

impl Device {
    const REGULATORS: &'static [(&'static [u8], Device)] = &[
        (b"dummy\0", Device::Dummy),
        (b"fixed\0", Device::Fixed),
        (b"openvreg\0", Device::OpenVreg),
        (b"vrs-11\0", Device::Vrs11),
        (b"vrs-11-quirks\0", Device::Vrs11),
    ];

    const MONITORS: &'static [(&'static [u8], Device)] =
        &[(b"max20480\0", Device::Max20480), (b"vrs12\0", Device::Vrs12)];

    /// Looks the device up in `table`. `kind` names the device family in
    /// diagnostics.
    fn lookup(table: &[(&[u8], Device)], kind: &str, node: Node<'_>) -> CheckResult<Device> {
        let Some(compatible) = node.property("compatible") else {
            return Err(SchemaViolation::property(
                node,
                "compatible",
                format!("Invalid {kind} device '{}'", node.path()),
            ));
        };

        table.iter().find(|(c, _)| *c == compatible.value).map(|&(_, dev)| dev).ok_or_else(|| {
            SchemaViolation::property(node, "compatible", format!("Unknown {kind} device '{}'", node.path()))
        })
    }

    /// `(required, optional)` properties besides `compatible`
    fn props(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Device::Dummy => (&[], &["enable-gpio", "linux,phandle", "phandle"]),
            Device::Fixed => (&[], &["step-uv", "enable-gpio", "linux,phandle", "phandle"]),
            Device::OpenVreg => {
                (&["pwm-id", "pwm-off-uv", "pwm-on-uv"], &["pwm-rate", "enable-gpio", "linux,phandle", "phandle"])
            }
            Device::Vrs11 => {
                (&["pwm-id", "slave-address", "channel"], &["pwm-rate", "enable-gpio", "linux,phandle", "phandle"])
            }
            Device::Max20480 | Device::Vrs12 => (&["i2c-addr"], &["boot-config", "linux,phandle", "phandle"]),
        }
    }

    fn check(self, node: Node<'_>) -> CheckResult {
        let (required, optional) = self.props();
        let mut all_required = vec!["compatible"];
        all_required.extend_from_slice(required);

        check_props(node, &all_required, optional)?;
        no_children(node)?;

        for name in required {
            u32s(node, name).single()?;
        }
        for name in optional {
            u32s(node, name).optional().single()?;
        }

        Ok(())
    }
}

pub(super) fn check_regulators(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

pub(super) fn check_regulators_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &["rail-id", "dev"],
        &[
            "regulator-init-microvolt",
            "regulator-min-microvolt",
            "regulator-max-microvolt",
            "regulator-ramp-delay-const",
            "regulator-ramp-delay-linear",
            "regulator-enable-ramp-delay",
            "regulator-disable-ramp-delay",
            "regulator-pre-disable-ramp-delay",
        ],
    )?;
    no_children(node)?;

    u32s(node, "rail-id").with(|x| !x.is_empty())?;

    let phandle = u32s(node, "dev").value(|_| true)?;
    let dev = resolve_phandle(node, "dev", phandle)?;
    Device::lookup(Device::REGULATORS, "regulator", dev)?.check(dev)?;

    for name in ["regulator-init-microvolt", "regulator-min-microvolt", "regulator-max-microvolt"] {
        u32s(node, name).optional().single()?;
    }

    let ramp_const = u32s(node, "regulator-ramp-delay-const").optional().single()?;
    let ramp_linear = u32s(node, "regulator-ramp-delay-linear").optional().single()?;

    for name in ["regulator-enable-ramp-delay", "regulator-disable-ramp-delay", "regulator-pre-disable-ramp-delay"] {
        u32s(node, name).optional().single()?;
    }

    let mut total = u64::from(ramp_const.first().copied().unwrap_or(0));
    if let Some(&linear) = ramp_linear.first() {
        ensure(linear > 0, || {
            SchemaViolation::property(
                node,
                "regulator-ramp-delay-linear",
                format!("Node '{}' property 'regulator-ramp-delay-linear' is invalid", node.path()),
            )
        })?;
        total += u64::from(RAMP_SWING_UV / linear);
    }

    ensure(total <= u64::from(RAMP_DELAY_BUDGET_US), || {
        SchemaViolation::node(
            node,
            format!("Total voltage ramp delay exceeds 10ms budget ({total}us > {RAMP_DELAY_BUDGET_US}us)"),
        )
    })
}

pub(super) fn check_rm(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

pub(super) fn check_rm_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(
        node,
        &[],
        &["rail-id", "unicap", "voltage-caps", "thermzone-id", "temp-offset", "temp-offset-milli"],
    )?;
    no_children(node)?;

    for name in ["rail-id", "unicap", "thermzone-id", "temp-offset", "temp-offset-milli"] {
        u32s(node, name).optional().single()?;
    }
    u32s(node, "voltage-caps").optional().with(|x| !x.is_empty() && x.len() % 3 == 0)?;

    Ok(())
}

pub(super) fn check_speedo(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

pub(super) fn check_speedo_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    check_props(node, &["rail-id", "offset"], &[])?;
    no_children(node)?;

    u32s(node, "rail-id").single()?;
    s32s(node, "offset").single()?;

    Ok(())
}

pub(super) fn check_vrmon(_: &ChipTables, node: Node<'_>) -> CheckResult {
    no_props(node)
}

pub(super) fn check_vrmon_node(_: &ChipTables, node: Node<'_>) -> CheckResult {
    const LIMITS: &[&str] = &["channel", "underv-uv-min", "underv-uv-per-v", "overv-uv-max", "overv-uv-per-v"];
    const OFFSETS: &[&str] = &["underv-uv-offs", "overv-uv-offs", "ovshoot-uv-per-v"];

    let mut required = vec!["rail-id", "mon-dev"];
    required.extend_from_slice(LIMITS);
    check_props(node, &required, OFFSETS)?;
    no_children(node)?;

    u32s(node, "rail-id").single()?;

    let phandle = u32s(node, "mon-dev").value(|_| true)?;
    let dev = resolve_phandle(node, "mon-dev", phandle)?;
    Device::lookup(Device::MONITORS, "vrmon", dev)?.check(dev)?;

    for name in LIMITS {
        u32s(node, name).single()?;
    }
    for name in OFFSETS {
        u32s(node, name).optional().single()?;
    }

    Ok(())
}
