// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Per-chip parameters: the identity written into the DTBCHECK trailer and
//! the tables of clock, rail and PLL identifiers the schema checks against.

mod t194;
mod t234;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, io,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Target system-on-chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Chip {
    T194,
    T234,
    T239,
    Th500,
}

/// Identity stamped into the metadata trailer of a signed DTB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub tool_version: u32,
    pub chip_id: u32,
    pub major_rev: u32,
}

impl Chip {
    pub const ALL: [Chip; 4] = [Chip::T194, Chip::T234, Chip::T239, Chip::Th500];

    pub fn name(self) -> &'static str {
        match self {
            Chip::T194 => "t194",
            Chip::T234 => "t234",
            Chip::T239 => "t239",
            Chip::Th500 => "th500",
        }
    }

    pub fn info(self) -> ChipInfo {
        let (tool_version, chip_id, major_rev) = match self {
            Chip::T194 => (1, 0x19, 0x1),
            Chip::T234 => (1, 0x23, 0x4),
            Chip::T239 => (1, 0x23, 0x9),
            Chip::Th500 => (1, 0x24, 0x1),
        };

        ChipInfo { tool_version, chip_id, major_rev }
    }

    /// Built-in tables. Chips whose rule set never consults the tables get an
    /// empty set.
    pub fn tables(self) -> ChipTables {
        match self {
            Chip::T194 => t194::tables(),
            Chip::T234 => t234::tables(),
            Chip::T239 | Chip::Th500 => ChipTables::default(),
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chip {0:?}")]
pub struct UnknownChip(pub String);

impl FromStr for Chip {
    type Err = UnknownChip;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chip::ALL.into_iter().find(|c| c.name() == s).ok_or_else(|| UnknownChip(s.to_owned()))
    }
}

/// Identifier tables for one chip.
///
/// Loaded from the built-in definitions or from a JSON document with the
/// same field names, e.g.
///
/// ```json
/// { "clocks": [1, 2], "rails": [0], "parent-clocks": { "2": [1] },
///   "doorbells": 255, "enablers": 3 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChipTables {
    /// Valid clock identifiers
    pub clocks: BTreeSet<u32>,
    /// Valid voltage rail identifiers
    pub rails: BTreeSet<u32>,
    /// Clocks that are PLLs
    pub plls: BTreeSet<u32>,
    /// Clocks that support a fractional divider
    pub frac_clocks: BTreeSet<u32>,
    /// Parents each clock may be switched to
    pub parent_clocks: BTreeMap<u32, BTreeSet<u32>>,
    /// Mask of mailbox doorbells a master list may name
    pub doorbells: u32,
    /// Mask of bits valid in the enable field of clock init tuples
    pub enablers: u32,
}

impl ChipTables {
    pub fn from_json<R: io::Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    pub fn is_clock(&self, id: u32) -> bool {
        self.clocks.contains(&id)
    }

    pub fn is_rail(&self, id: u32) -> bool {
        self.rails.contains(&id)
    }

    pub fn is_pll(&self, id: u32) -> bool {
        self.plls.contains(&id)
    }

    pub fn is_frac_clock(&self, id: u32) -> bool {
        self.frac_clocks.contains(&id)
    }

    /// A clock missing from the parent table has no selectable parents.
    pub fn is_parent_of(&self, clk: u32, parent: u32) -> bool {
        self.parent_clocks.get(&clk).is_some_and(|parents| parents.contains(&parent))
    }

    pub fn within_doorbells(&self, mask: u32) -> bool {
        mask & self.doorbells == mask
    }

    pub fn within_enablers(&self, mask: u32) -> bool {
        mask & self.enablers == mask
    }
}

/// Builds a [`ChipTables`] from the const slices the per-chip modules keep.
pub(crate) struct TableDef {
    pub clocks: &'static [(u32, u32)],
    pub rails: &'static [u32],
    pub plls: &'static [u32],
    pub frac_clocks: &'static [u32],
    pub parent_clocks: &'static [(u32, &'static [u32])],
    pub doorbells: u32,
    pub enablers: u32,
}

impl TableDef {
    pub(crate) fn build(&self) -> ChipTables {
        ChipTables {
            clocks: self.clocks.iter().flat_map(|&(first, last)| first..=last).collect(),
            rails: self.rails.iter().copied().collect(),
            plls: self.plls.iter().copied().collect(),
            frac_clocks: self.frac_clocks.iter().copied().collect(),
            parent_clocks: self
                .parent_clocks
                .iter()
                .map(|&(clk, parents)| (clk, parents.iter().copied().collect()))
                .collect(),
            doorbells: self.doorbells,
            enablers: self.enablers,
        }
    }
}
