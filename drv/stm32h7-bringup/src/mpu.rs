// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ARMv7-M MPU setup for the SDRAM window.
//!
//! The default memory map treats 0xA000_0000-0xDFFF_FFFF as device memory,
//! which can't be executed from or cached. One region describing the SDRAM
//! bank as normal memory fixes that; everything else stays on the default
//! map, which privileged code keeps as a background region.

use crate::bus::{Barrier, RegisterBus};
use crate::regs::mpu;
use crate::trace::{BootLog, Trace};
use ringbuf::ringbuf_entry;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RegionAttributes: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        /// Shareable device memory, uncached. Without this the region is
        /// normal write-back memory.
        const DEVICE = 1 << 3;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub base: u32,
    /// Power of two, at least 32.
    pub size: u32,
    pub attributes: RegionAttributes,
}

impl Region {
    pub const fn check(&self) {
        assert!(self.size.is_power_of_two() && self.size >= 32);
        assert!(self.base & (self.size - 1) == 0);
    }

    /// log2 of the size, as RASR.SIZE wants it (one less than the real
    /// exponent).
    const fn size_field(&self) -> u32 {
        30 - self.size.leading_zeros()
    }

    pub const fn rbar(&self, number: u32) -> u32 {
        // VALID: take the region number from RBAR rather than RNR.
        self.base | (1 << 4) | (number & 0xF)
    }

    pub const fn rasr(&self) -> u32 {
        let ratts = self.attributes;
        let xn = !ratts.contains(RegionAttributes::EXECUTE);
        // Never deny privileged access.
        let ap = if ratts.contains(RegionAttributes::WRITE) {
            0b011
        } else if ratts.contains(RegionAttributes::READ) {
            0b010
        } else {
            0b001
        };
        // SCB here is S, C, B from high to low.
        let (tex, scb) = if ratts.contains(RegionAttributes::DEVICE) {
            (0b000, 0b101)
        } else {
            (0b001, 0b111)
        };
        (xn as u32) << 28
            | ap << 24
            | tex << 19
            | scb << 16
            | self.size_field() << 1
            | 1
    }
}

/// The SDRAM bank, executable and cacheable.
pub const SDRAM_REGION: Region = Region {
    base: crate::regs::fmc::SDRAM_BANK1_BASE,
    size: 32 << 20,
    attributes: RegionAttributes::READ
        .union(RegionAttributes::WRITE)
        .union(RegionAttributes::EXECUTE),
};

const _: () = SDRAM_REGION.check();

/// Programs region `number` and turns the MPU on, with the default map as a
/// privileged background region.
pub fn configure(
    bus: &mut impl RegisterBus,
    number: u32,
    region: &Region,
    log: &mut BootLog,
) {
    // Outstanding transactions complete before the map changes under them.
    bus.barrier(Barrier::Dmb);
    bus.write(mpu::CTRL, 0);

    bus.write(mpu::RBAR, region.rbar(number));
    bus.write(mpu::RASR, region.rasr());

    bus.write(mpu::CTRL, mpu::CTRL_ENABLE | mpu::CTRL_PRIVDEFENA);
    bus.barrier(Barrier::Dmb);
    bus.barrier(Barrier::Isb);

    ringbuf_entry!(
        log,
        Trace::MpuRegion {
            base: region.base,
            size_log2: region.size.trailing_zeros() as u8,
        }
    );
}
