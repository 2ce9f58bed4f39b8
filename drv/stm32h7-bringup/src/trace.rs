// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot trace events.

use crate::clock::Flag;
use crate::sdram::Command;
use ringbuf::Ringbuf;

/// Deep enough to hold one complete boot without wrapping.
pub const TRACE_DEPTH: usize = 48;

/// The trace buffer threaded through every bring-up routine.
pub type BootLog = Ringbuf<Trace, TRACE_DEPTH>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    None,

    // Clock sequencer
    HsiOn,
    Baseline,
    PeripheralClocksOn,
    Ready { flag: Flag, spins: u32 },
    Stuck(Flag),
    PllProgrammed { divm: u8, divn: u16 },
    FlashLatency { latency: u8, write_delay: u8 },
    AhbPrescaler(u8),
    FmcClockSelected,

    // External memory
    FmcReset,
    FmcEnabled,
    SdramConfigured { sdcr: u32, sdtr: u32 },
    SdramCommand(Command),
    SdramBusyTimeout(Command),
    RefreshCount(u16),
    WriteProtectCleared,

    // Caches
    ICacheInvalidated,
    DCacheGeometry { sets: u16, ways: u16, line_shift: u8 },
    DCacheSetWay { ops: u32 },

    // Board collaborators
    MpuRegion { base: u32, size_log2: u8 },
    PinsRouted(u8),
    Handoff { vector_table: u32 },
}

/// A fresh, empty trace buffer.
pub const fn new_log() -> BootLog {
    Ringbuf::new(Trace::None)
}
