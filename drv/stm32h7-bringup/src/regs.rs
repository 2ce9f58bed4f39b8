// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register map for the parts of the STM32H743 and the Cortex-M7 core that
//! the bring-up path touches.
//!
//! Addresses and field positions are from RM0433 (rev 7) and the ARMv7-M
//! Architecture Reference Manual. Only what is used is listed.

use crate::bus::Reg;

/// Reset and clock control, RM0433 section 8.7.
pub mod rcc {
    use super::Reg;

    pub const BASE: u32 = 0x5802_4400;

    pub const CR: Reg = Reg::at(BASE, 0x00);
    pub const CFGR: Reg = Reg::at(BASE, 0x10);
    pub const D1CFGR: Reg = Reg::at(BASE, 0x18);
    pub const D2CFGR: Reg = Reg::at(BASE, 0x1C);
    pub const D3CFGR: Reg = Reg::at(BASE, 0x20);
    pub const PLLCKSELR: Reg = Reg::at(BASE, 0x28);
    pub const PLLCFGR: Reg = Reg::at(BASE, 0x2C);
    pub const PLL1DIVR: Reg = Reg::at(BASE, 0x30);
    pub const PLL1FRACR: Reg = Reg::at(BASE, 0x34);
    pub const PLL2DIVR: Reg = Reg::at(BASE, 0x38);
    pub const PLL2FRACR: Reg = Reg::at(BASE, 0x3C);
    pub const PLL3DIVR: Reg = Reg::at(BASE, 0x40);
    pub const PLL3FRACR: Reg = Reg::at(BASE, 0x44);
    pub const D1CCIPR: Reg = Reg::at(BASE, 0x4C);
    pub const D2CCIP1R: Reg = Reg::at(BASE, 0x50);
    pub const D2CCIP2R: Reg = Reg::at(BASE, 0x54);
    pub const AHB3RSTR: Reg = Reg::at(BASE, 0x7C);
    pub const AHB3ENR: Reg = Reg::at(BASE, 0xD4);
    pub const AHB1ENR: Reg = Reg::at(BASE, 0xD8);
    pub const AHB2ENR: Reg = Reg::at(BASE, 0xDC);
    pub const AHB4ENR: Reg = Reg::at(BASE, 0xE0);
    pub const APB3ENR: Reg = Reg::at(BASE, 0xE4);
    pub const APB1LENR: Reg = Reg::at(BASE, 0xE8);
    pub const APB1HENR: Reg = Reg::at(BASE, 0xEC);
    pub const APB2ENR: Reg = Reg::at(BASE, 0xF0);
    pub const APB4ENR: Reg = Reg::at(BASE, 0xF4);

    /// The PLL configuration block. Cleared as a unit when establishing the
    /// baseline, which is only legal once every PLL is off.
    pub const PLL_CONFIG: [Reg; 8] = [
        PLLCKSELR, PLLCFGR, PLL1DIVR, PLL1FRACR, PLL2DIVR, PLL2FRACR,
        PLL3DIVR, PLL3FRACR,
    ];

    /// Kernel clock source selections.
    pub const KERNEL_CLOCK_SELECT: [Reg; 3] = [D1CCIPR, D2CCIP1R, D2CCIP2R];

    /// Every peripheral clock-enable register, in the order the bring-up
    /// writes them.
    pub const CLOCK_ENABLES: [Reg; 9] = [
        AHB4ENR, APB2ENR, AHB3ENR, AHB1ENR, AHB2ENR, APB3ENR, APB1LENR,
        APB1HENR, APB4ENR,
    ];

    bitflags::bitflags! {
        /// RCC_CR oscillator and PLL control/status bits.
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub struct Cr: u32 {
            const HSION = 1 << 0;
            const HSIRDY = 1 << 2;
            const HSEON = 1 << 16;
            const HSERDY = 1 << 17;
            const HSEBYP = 1 << 18;
            const PLL1ON = 1 << 24;
            const PLL1RDY = 1 << 25;
            const PLL2ON = 1 << 26;
            const PLL2RDY = 1 << 27;
            const PLL3ON = 1 << 28;
            const PLL3RDY = 1 << 29;
        }
    }

    // CFGR
    pub const CFGR_SW_MASK: u32 = 0b111;
    pub const CFGR_SWS_SHIFT: u32 = 3;
    pub const CFGR_SWS_MASK: u32 = 0b111 << CFGR_SWS_SHIFT;
    pub const SW_HSI: u32 = 0b000;
    pub const SW_PLL1: u32 = 0b011;

    // D1CFGR
    pub const D1CFGR_HPRE_SHIFT: u32 = 0;

    // PLLCKSELR
    pub const PLLSRC_HSE: u32 = 0b10;
    pub const PLLCKSELR_DIVM1_SHIFT: u32 = 4;

    // PLLCFGR
    pub const PLLCFGR_PLL1VCOSEL: u32 = 1 << 1;
    pub const PLLCFGR_PLL1RGE_SHIFT: u32 = 2;
    pub const PLLCFGR_DIVP1EN: u32 = 1 << 16;
    pub const PLLCFGR_DIVQ1EN: u32 = 1 << 17;
    pub const PLLCFGR_DIVR1EN: u32 = 1 << 18;

    // PLL1DIVR. Every divider field holds (value - 1).
    pub const PLL1DIVR_DIVN_SHIFT: u32 = 0;
    pub const PLL1DIVR_DIVP_SHIFT: u32 = 9;
    pub const PLL1DIVR_DIVQ_SHIFT: u32 = 16;
    pub const PLL1DIVR_DIVR_SHIFT: u32 = 24;

    // D1CCIPR
    pub const D1CCIPR_FMCSEL_SHIFT: u32 = 0;

    // AHB3RSTR
    pub const AHB3RSTR_FMCRST: u32 = 1 << 12;
}

/// Power control, RM0433 section 6.8.
pub mod pwr {
    use super::Reg;

    pub const BASE: u32 = 0x5802_4800;

    pub const CR3: Reg = Reg::at(BASE, 0x0C);
    pub const D3CR: Reg = Reg::at(BASE, 0x18);

    pub const CR3_SCUEN: u32 = 1 << 2;
    pub const D3CR_VOS_SHIFT: u32 = 14;
    pub const D3CR_VOS_MASK: u32 = 0b11 << D3CR_VOS_SHIFT;
    pub const D3CR_VOSRDY: u32 = 1 << 13;
}

/// Embedded flash interface, RM0433 section 4.9.
pub mod flash {
    use super::Reg;

    pub const BASE: u32 = 0x5200_2000;

    pub const ACR: Reg = Reg::at(BASE, 0x00);

    pub const ACR_LATENCY_MASK: u32 = 0b1111;
    pub const ACR_WRHIGHFREQ_SHIFT: u32 = 4;
    pub const ACR_WRHIGHFREQ_MASK: u32 = 0b11 << ACR_WRHIGHFREQ_SHIFT;
}

/// Flexible memory controller, SDRAM bank registers, RM0433 section 22.9.
pub mod fmc {
    use super::Reg;

    pub const BASE: u32 = 0x5200_4000;

    pub const BCR1: Reg = Reg::at(BASE, 0x000);
    pub const SDCR1: Reg = Reg::at(BASE, 0x140);
    pub const SDTR1: Reg = Reg::at(BASE, 0x148);
    pub const SDCMR: Reg = Reg::at(BASE, 0x150);
    pub const SDRTR: Reg = Reg::at(BASE, 0x154);
    pub const SDSR: Reg = Reg::at(BASE, 0x158);

    pub const BCR1_FMCEN: u32 = 1 << 31;
    pub const SDCR_WP: u32 = 1 << 9;
    pub const SDSR_BUSY: u32 = 1 << 5;
    pub const SDRTR_COUNT_SHIFT: u32 = 1;
    pub const SDRTR_COUNT_MASK: u32 = 0x1FFF << SDRTR_COUNT_SHIFT;

    /// Where SDRAM bank 1 appears once the controller is up.
    pub const SDRAM_BANK1_BASE: u32 = 0xC000_0000;
}

/// GPIO ports, RM0433 section 11.4.
pub mod gpio {
    use super::Reg;

    pub const BASE: u32 = 0x5802_0000;
    pub const PORT_STRIDE: u32 = 0x400;

    pub const MODER: u32 = 0x00;
    pub const OTYPER: u32 = 0x04;
    pub const OSPEEDR: u32 = 0x08;
    pub const PUPDR: u32 = 0x0C;
    pub const AFRL: u32 = 0x20;
    pub const AFRH: u32 = 0x24;

    pub const fn reg(port: u32, offset: u32) -> Reg {
        Reg::at(BASE + port * PORT_STRIDE, offset)
    }
}

/// System control block cache and identification registers, ARMv7-M B3.2.
pub mod scb {
    use super::Reg;

    pub const CCSIDR: Reg = Reg::new(0xE000_ED80);
    pub const CSSELR: Reg = Reg::new(0xE000_ED84);
    pub const VTOR: Reg = Reg::new(0xE000_ED08);
    /// I-cache invalidate all to the point of unification.
    pub const ICIALLU: Reg = Reg::new(0xE000_EF50);
    /// D-cache invalidate by set/way.
    pub const DCISW: Reg = Reg::new(0xE000_EF60);
    /// D-cache clean and invalidate by set/way.
    pub const DCCISW: Reg = Reg::new(0xE000_EF74);

    pub const CCSIDR_LINESIZE_MASK: u32 = 0b111;
    pub const CCSIDR_ASSOC_SHIFT: u32 = 3;
    pub const CCSIDR_ASSOC_MASK: u32 = 0x3FF;
    pub const CCSIDR_NUMSETS_SHIFT: u32 = 13;
    pub const CCSIDR_NUMSETS_MASK: u32 = 0x7FFF;
}

/// ARMv7-M protected memory system architecture, B3.5.
pub mod mpu {
    use super::Reg;

    pub const CTRL: Reg = Reg::new(0xE000_ED94);
    pub const RBAR: Reg = Reg::new(0xE000_ED9C);
    pub const RASR: Reg = Reg::new(0xE000_EDA0);

    pub const CTRL_ENABLE: u32 = 0b001;
    pub const CTRL_PRIVDEFENA: u32 = 0b100;
}
