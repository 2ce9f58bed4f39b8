// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The register access boundary.
//!
//! Everything above this module is ordinary control flow over a
//! [`RegisterBus`]. The only implementation that dereferences real addresses
//! is [`Mmio`], which exists only when building for the target; host tests
//! drive the same sequences through the simulated register file in
//! `crate::sim`.

/// Address of a 32-bit memory-mapped register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(u32);

impl Reg {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// The register at `offset` bytes from a peripheral's `base`.
    pub const fn at(base: u32, offset: u32) -> Self {
        Self(base + offset)
    }

    pub const fn addr(self) -> u32 {
        self.0
    }
}

/// Memory and instruction barriers, in the Cortex-M sense.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Barrier {
    /// Data memory barrier: orders memory accesses on either side of it.
    Dmb,
    /// Data synchronization barrier: completes all outstanding accesses,
    /// including cache maintenance, before continuing.
    Dsb,
    /// Instruction synchronization barrier: flushes the pipeline so later
    /// instructions see the effects of everything before it.
    Isb,
}

/// Word-wide access to device registers.
///
/// Implementations must perform every `read` and `write` exactly once and in
/// program order; the bring-up sequences depend on it.
pub trait RegisterBus {
    fn read(&mut self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);
    fn barrier(&mut self, barrier: Barrier);

    /// Read-modify-write.
    fn modify(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let v = self.read(reg);
        self.write(reg, f(v));
    }

    fn set_bits(&mut self, reg: Reg, bits: u32) {
        self.modify(reg, |v| v | bits);
    }

    fn clear_bits(&mut self, reg: Reg, bits: u32) {
        self.modify(reg, |v| v & !bits);
    }

    /// Replaces the bits under `mask` with `value` (already shifted into
    /// place), leaving the rest of the register alone.
    fn write_field(&mut self, reg: Reg, mask: u32, value: u32) {
        self.modify(reg, |v| (v & !mask) | (value & mask));
    }
}

/// The real thing: volatile loads and stores at the register's address.
#[cfg(target_os = "none")]
pub struct Mmio {
    _private: (),
}

#[cfg(target_os = "none")]
impl Mmio {
    /// # Safety
    ///
    /// The caller is manufacturing authority over every register in
    /// `crate::regs`. There must be exactly one `Mmio` in the program, and
    /// nothing else may be touching those peripherals while it's alive. In
    /// practice that means: create it in the reset path, with interrupts
    /// masked, and don't create it anywhere else.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_os = "none")]
impl RegisterBus for Mmio {
    fn read(&mut self, reg: Reg) -> u32 {
        // Safety: `Mmio::new`'s contract gives us exclusive access, and every
        // `Reg` we're handed names a word-aligned device register.
        unsafe { core::ptr::read_volatile(reg.addr() as *const u32) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        // Safety: as above.
        unsafe { core::ptr::write_volatile(reg.addr() as *mut u32, value) }
    }

    fn barrier(&mut self, barrier: Barrier) {
        match barrier {
            Barrier::Dmb => cortex_m::asm::dmb(),
            Barrier::Dsb => cortex_m::asm::dsb(),
            Barrier::Isb => cortex_m::asm::isb(),
        }
    }
}
