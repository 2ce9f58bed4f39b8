// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transfer of control to the next-stage kernel.

use crate::bus::{Barrier, RegisterBus};
use crate::regs::scb;
use crate::trace::{BootLog, Trace};
use ringbuf::ringbuf_entry;

/// Where the kernel image, starting with its vector table, sits in flash:
/// sector 1, right after this image.
pub const KERNEL_IMAGE: u32 = 0x0802_0000;

/// VTOR ignores the low bits; the STM32H7's vector table needs 1 KiB
/// alignment.
pub const VECTOR_TABLE_ALIGN: u32 = 0x400;

/// Points VTOR at the vector table at `image`, so the kernel's exceptions go
/// to its own handlers from its first instruction.
pub fn point_vectors(bus: &mut impl RegisterBus, image: u32, log: &mut BootLog) {
    debug_assert_eq!(image & (VECTOR_TABLE_ALIGN - 1), 0);
    bus.barrier(Barrier::Dsb);
    bus.write(scb::VTOR, image);
    bus.barrier(Barrier::Dsb);
    bus.barrier(Barrier::Isb);
    ringbuf_entry!(log, Trace::Handoff { vector_table: image });
}

/// Jumps into the image at `image`: loads its initial stack pointer and
/// branches to its reset vector. Doesn't return.
///
/// # Safety
///
/// `image` must hold a valid vector table for code that is ready to run in
/// the state we leave the machine in. Anything we still hold (including the
/// stack) is abandoned.
#[cfg(target_os = "none")]
pub unsafe fn start_kernel(
    bus: &mut crate::bus::Mmio,
    image: u32,
    log: &mut BootLog,
) -> ! {
    point_vectors(bus, image, log);
    // Safety: passed through from our caller.
    unsafe { cortex_m::asm::bootload(image as *const u32) }
}
