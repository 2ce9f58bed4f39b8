// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated register file for running bring-up sequences off-target.
//!
//! Registers live at their real addresses and start at their documented
//! reset values. The handful of status bits the sequences wait on follow the
//! bits that control them, the way the hardware does once it has settled, and
//! any of them can be pinned to a fixed level to simulate a fault. Every
//! access is recorded in order.

use crate::bus::{Barrier, Reg, RegisterBus};
use crate::regs::{flash, fmc, gpio, pwr, rcc, scb};
use std::collections::BTreeMap;

use rcc::Cr;

/// One bus operation, as seen by the simulator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(Reg, u32),
    Write(Reg, u32),
    Barrier(Barrier),
}

/// How the FMC's busy flag behaves after a command is written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Busy {
    /// Never seen busy.
    Never,
    /// Busy for this many status reads, then idle.
    For(u32),
    /// Busy forever.
    Stuck,
}

#[derive(Copy, Clone, Debug)]
struct Pin {
    reg: Reg,
    mask: u32,
    set: bool,
}

pub struct SimBus {
    regs: BTreeMap<Reg, u32>,
    log: Vec<Access>,
    pins: Vec<Pin>,
    fmc_busy: Busy,
    busy_reads_left: u32,
    ccsidr: u32,
}

/// Cortex-M7 with a 16 KiB, 4-way, 32-byte-line data cache.
pub const CORTEX_M7_DCACHE_CCSIDR: u32 = 0xF00F_E019;

impl SimBus {
    /// A part fresh out of power-on reset.
    pub fn reset() -> Self {
        let mut regs = BTreeMap::new();
        for (reg, v) in [
            (rcc::CR, (Cr::HSION | Cr::HSIRDY).bits()),
            (rcc::PLLCKSELR, 0x0202_0200),
            (rcc::PLLCFGR, 0x01FF_0000),
            (rcc::PLL1DIVR, 0x0101_0280),
            (rcc::PLL2DIVR, 0x0101_0280),
            (rcc::PLL3DIVR, 0x0101_0280),
            (pwr::CR3, 0x0000_0046),
            (pwr::D3CR, (0b01 << pwr::D3CR_VOS_SHIFT) | pwr::D3CR_VOSRDY),
            (flash::ACR, 0x0000_0037),
            (fmc::BCR1, 0x0000_30DB),
            (fmc::SDCR1, 0x0000_02D0),
            (fmc::SDTR1, 0x0FFF_FFFF),
            (gpio::reg(0, gpio::MODER), 0xABFF_FFFF),
        ] {
            regs.insert(reg, v);
        }
        Self {
            regs,
            log: Vec::new(),
            pins: Vec::new(),
            fmc_busy: Busy::Never,
            busy_reads_left: 0,
            ccsidr: CORTEX_M7_DCACHE_CCSIDR,
        }
    }

    /// Pins the bits under `mask` in `reg` high (`set`) or low, whatever is
    /// written.
    pub fn stick(&mut self, reg: Reg, mask: u32, set: bool) {
        self.pins.push(Pin { reg, mask, set });
    }

    pub fn set_fmc_busy(&mut self, busy: Busy) {
        self.fmc_busy = busy;
    }

    /// The level 1 data cache descriptor.
    pub fn set_ccsidr(&mut self, ccsidr: u32) {
        self.ccsidr = ccsidr;
    }

    /// Current value of `reg`, without recording an access or advancing
    /// any simulated state.
    pub fn peek(&self, reg: Reg) -> u32 {
        self.pinned(reg, self.regs.get(&reg).copied().unwrap_or(0))
    }

    /// Sets `reg` directly, without recording an access.
    pub fn poke(&mut self, reg: Reg, value: u32) {
        self.regs.insert(reg, value);
    }

    pub fn log(&self) -> &[Access] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Every value written to `reg`, oldest first.
    pub fn writes_to(&self, reg: Reg) -> impl Iterator<Item = u32> + '_ {
        self.log.iter().filter_map(move |a| match *a {
            Access::Write(r, v) if r == reg => Some(v),
            _ => None,
        })
    }

    /// Every register value, for comparing end states.
    pub fn snapshot(&self) -> BTreeMap<Reg, u32> {
        self.regs.clone()
    }

    fn pinned(&self, reg: Reg, mut v: u32) -> u32 {
        for p in self.pins.iter().filter(|p| p.reg == reg) {
            v &= !p.mask;
            if p.set {
                v |= p.mask;
            }
        }
        v
    }

    /// What the hardware does with a value written to `reg`.
    fn settle(&mut self, reg: Reg, value: u32) -> u32 {
        if reg == rcc::CR {
            // Each ready flag follows its enable.
            let mut cr = Cr::from_bits_retain(value)
                - (Cr::HSIRDY | Cr::HSERDY | Cr::PLL1RDY | Cr::PLL2RDY | Cr::PLL3RDY);
            for (on, rdy) in [
                (Cr::HSION, Cr::HSIRDY),
                (Cr::HSEON, Cr::HSERDY),
                (Cr::PLL1ON, Cr::PLL1RDY),
                (Cr::PLL2ON, Cr::PLL2RDY),
                (Cr::PLL3ON, Cr::PLL3RDY),
            ] {
                cr.set(rdy, cr.contains(on));
            }
            cr.bits()
        } else if reg == rcc::CFGR {
            let sw = value & rcc::CFGR_SW_MASK;
            (value & !rcc::CFGR_SWS_MASK) | (sw << rcc::CFGR_SWS_SHIFT)
        } else if reg == pwr::D3CR {
            (value & pwr::D3CR_VOS_MASK) | pwr::D3CR_VOSRDY
        } else if reg == fmc::SDCMR {
            self.busy_reads_left = match self.fmc_busy {
                Busy::Never => 0,
                Busy::For(n) => n,
                Busy::Stuck => u32::MAX,
            };
            value
        } else {
            value
        }
    }

    fn observe(&mut self, reg: Reg) -> u32 {
        if reg == fmc::SDSR {
            if self.busy_reads_left == 0 {
                return 0;
            }
            if self.fmc_busy != Busy::Stuck {
                self.busy_reads_left -= 1;
            }
            return fmc::SDSR_BUSY;
        }
        if reg == scb::CCSIDR {
            // Only the L1 data cache is described.
            let csselr = self.regs.get(&scb::CSSELR).copied().unwrap_or(0);
            return if csselr == 0 { self.ccsidr } else { 0 };
        }
        self.regs.get(&reg).copied().unwrap_or(0)
    }
}

impl RegisterBus for SimBus {
    fn read(&mut self, reg: Reg) -> u32 {
        let raw = self.observe(reg);
        let v = self.pinned(reg, raw);
        self.log.push(Access::Read(reg, v));
        v
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.log.push(Access::Write(reg, value));
        let v = self.settle(reg, value);
        self.regs.insert(reg, v);
    }

    fn barrier(&mut self, barrier: Barrier) {
        self.log.push(Access::Barrier(barrier));
    }
}
