// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{ChipTables, TableDef};

const CLK_CAN1_CORE: u32 = 12;
const CLK_DCE_CPU: u32 = 20;
const CLK_I2C1: u32 = 48;
const CLK_I2C2: u32 = 49;
const CLK_SDMMC4: u32 = 123;
const CLK_UARTA: u32 = 155;
const CLK_NVDISPLAY_DISP: u32 = 246;

const CLK_PLLA: u32 = 93;
const CLK_PLLC: u32 = 94;
const CLK_PLLD: u32 = 95;
const CLK_PLLE: u32 = 96;
const CLK_PLLP_OUT0: u32 = 102;
const CLK_PLLREFE_VCOOUT: u32 = 104;
const CLK_OSC: u32 = 111;
const CLK_CLK_M: u32 = 112;
const CLK_PLLC4_MUXED: u32 = 134;
const CLK_PLLNVCSI: u32 = 231;
const CLK_PLLREFUFS: u32 = 335;
const CLK_PLLNVHS: u32 = 360;

const TABLE: TableDef = TableDef {
    clocks: &[(1, 488)],
    rails: &[0, 1, 2, 3, 4, 5, 6, 7],
    plls: &[CLK_PLLA, CLK_PLLC, CLK_PLLD, CLK_PLLE, CLK_PLLREFE_VCOOUT, CLK_PLLNVCSI, CLK_PLLREFUFS, CLK_PLLNVHS],
    frac_clocks: &[CLK_I2C1, CLK_I2C2, CLK_UARTA, CLK_SDMMC4],
    parent_clocks: &[
        (CLK_CAN1_CORE, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_DCE_CPU, &[CLK_PLLP_OUT0, CLK_PLLNVHS]),
        (CLK_I2C1, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_I2C2, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_SDMMC4, &[CLK_PLLP_OUT0, CLK_PLLC4_MUXED, CLK_CLK_M]),
        (CLK_UARTA, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_NVDISPLAY_DISP, &[CLK_PLLD, CLK_PLLP_OUT0]),
    ],
    // CCPLEX through FSI, one bit per mailbox master
    doorbells: 0x0000_ffff,
    enablers: 0x3,
};

pub(super) fn tables() -> ChipTables {
    TABLE.build()
}
