// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Early bring-up for the STM32H743.
//!
//! This is everything that has to happen between reset and jumping into a
//! kernel image, for a board with SDRAM on the FMC:
//!
//! - [`clock::sequence`] takes the clock tree from HSI to PLL1 off the
//!   external crystal;
//! - [`sdram::bring_up`] resets the FMC and walks the SDRAM through its
//!   power-up commands;
//! - [`cache`] invalidates both L1 caches so that nothing stale survives
//!   into the next image.
//!
//! Around those sit the smaller pieces a board needs to call them: pin
//! muxing ([`pins`]), the MPU region that makes SDRAM usable as normal
//! memory ([`mpu`]), the startup banner ([`console`]) and the jump itself
//! ([`handoff`]). [`boot::boot`] runs all of it in the order the board
//! needs.
//!
//! Every routine takes a [`bus::RegisterBus`] rather than touching memory
//! directly. On the target that is [`bus::Mmio`]; on a host it is the
//! simulated register file in [`sim`], which is what the tests run against.
//! Progress is recorded into a [`trace::BootLog`] that the caller owns.

#![cfg_attr(target_os = "none", no_std)]

pub mod boot;
pub mod bus;
pub mod cache;
pub mod clock;
pub mod console;
pub mod handoff;
pub mod mpu;
pub mod pins;
pub mod poll;
pub mod regs;
pub mod sdram;
pub mod trace;

#[cfg(all(not(target_os = "none"), any(test, feature = "sim")))]
pub mod sim;

pub use boot::boot;
pub use bus::{Barrier, Reg, RegisterBus};
pub use clock::{ClockConfig, ClockError, Clocks};
pub use poll::Budget;
pub use sdram::{Sdram, SdramConfig};
pub use trace::{new_log, BootLog, Trace};
