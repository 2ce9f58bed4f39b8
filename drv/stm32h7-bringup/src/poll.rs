// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Busy-polling on status bits.
//!
//! Nothing at this stage of boot can sleep, so waiting means re-reading a
//! register. Two policies are in use: the clock tree polls without a bound
//! (a stuck oscillator is a dead board, and there is nobody to tell), and the
//! memory controller polls with a fixed retry budget and carries on either
//! way. Both go through [`poll`] so the bound is always spelled out at the
//! call site.

use crate::bus::{Reg, RegisterBus};

/// How long a poll may spin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Budget {
    /// Spin until the condition holds, forever if need be.
    Unbounded,
    /// Give up after this many re-reads.
    Spins(u32),
}

/// Retry budget used for memory-controller busy polls.
pub const FMC_BUSY_BUDGET: Budget = Budget::Spins(0xFFFF);

/// The state a polled bit field is waiting for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    /// Every bit under the mask is set.
    Set,
    /// Every bit under the mask is clear.
    Clear,
    /// The masked bits equal this value.
    Equals(u32),
}

impl Level {
    fn holds(self, word: u32, mask: u32) -> bool {
        let v = word & mask;
        match self {
            Level::Set => v == mask,
            Level::Clear => v == 0,
            Level::Equals(want) => v == want & mask,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Poll {
    /// The condition held after `spins` re-reads (zero if it held on the
    /// first read).
    Ready { spins: u32 },
    /// The budget ran out first.
    Exhausted,
}

impl Poll {
    pub fn is_ready(self) -> bool {
        matches!(self, Poll::Ready { .. })
    }
}

/// Reads `reg` until the bits under `mask` reach `level`, or `budget` runs
/// out. With [`Budget::Unbounded`] this only returns once the condition
/// holds.
pub fn poll(
    bus: &mut impl RegisterBus,
    reg: Reg,
    mask: u32,
    level: Level,
    budget: Budget,
) -> Poll {
    let mut spins: u32 = 0;
    loop {
        if level.holds(bus.read(reg), mask) {
            return Poll::Ready { spins };
        }
        if let Budget::Spins(limit) = budget {
            if spins >= limit {
                return Poll::Exhausted;
            }
        }
        spins = spins.saturating_add(1);
    }
}
