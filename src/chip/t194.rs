// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use super::{ChipTables, TableDef};

const CLK_CAN1: u32 = 9;
const CLK_CAN2: u32 = 11;
const CLK_DISP: u32 = 21;
const CLK_I2C1: u32 = 48;
const CLK_I2C2: u32 = 49;
const CLK_NVDISPLAY_P0: u32 = 80;
const CLK_SDMMC1: u32 = 120;
const CLK_SDMMC4: u32 = 123;
const CLK_UARTA: u32 = 155;
const CLK_AUD_MCLK: u32 = 7;

const CLK_PLLA: u32 = 93;
const CLK_PLLC: u32 = 94;
const CLK_PLLD: u32 = 95;
const CLK_PLLE: u32 = 96;
const CLK_PLLP_OUT0: u32 = 102;
const CLK_PLLREFE_VCOOUT: u32 = 104;
const CLK_OSC: u32 = 111;
const CLK_CLK_M: u32 = 112;
const CLK_PLLC4_MUXED: u32 = 134;
const CLK_PLLA1: u32 = 229;
const CLK_PLLNVCSI: u32 = 231;

const TABLE: TableDef = TableDef {
    clocks: &[(1, 264)],
    rails: &[0, 1, 2, 3, 4, 5, 6],
    plls: &[CLK_PLLA, CLK_PLLC, CLK_PLLD, CLK_PLLE, CLK_PLLREFE_VCOOUT, CLK_PLLA1, CLK_PLLNVCSI],
    frac_clocks: &[CLK_I2C1, CLK_I2C2, CLK_UARTA, CLK_SDMMC1, CLK_SDMMC4, CLK_AUD_MCLK],
    parent_clocks: &[
        (CLK_CAN1, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_CAN2, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_DISP, &[CLK_PLLD, CLK_PLLP_OUT0, CLK_CLK_M]),
        (CLK_I2C1, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_I2C2, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_NVDISPLAY_P0, &[CLK_PLLD, CLK_PLLA1, CLK_PLLP_OUT0]),
        (CLK_SDMMC1, &[CLK_PLLP_OUT0, CLK_PLLC4_MUXED, CLK_CLK_M]),
        (CLK_SDMMC4, &[CLK_PLLP_OUT0, CLK_PLLC4_MUXED, CLK_CLK_M]),
        (CLK_UARTA, &[CLK_PLLP_OUT0, CLK_CLK_M, CLK_OSC]),
        (CLK_AUD_MCLK, &[CLK_PLLA, CLK_PLLP_OUT0, CLK_CLK_M]),
    ],
    // CCPLEX, DPMU, BPMP, SPE, SCE, DMA, TSECA, TSECB, JTAGM, CSITE, APE
    doorbells: 0x0000_07ff,
    enablers: 0x3,
};

pub(super) fn tables() -> ChipTables {
    TABLE.build()
}
