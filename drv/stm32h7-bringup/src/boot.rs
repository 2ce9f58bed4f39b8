// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bring-up order, independent of what the bus is.

use crate::bus::RegisterBus;
use crate::cache::{self, DcacheOp};
use crate::clock::{self, ClockConfig, ClockError, Clocks};
use crate::console::{announce, Console};
use crate::poll::Budget;
use crate::sdram::{self, Sdram, SdramConfig};
use crate::trace::BootLog;
use crate::{mpu, pins};
use embedded_hal::blocking::delay::DelayUs;

/// Everything up to, but not including, the jump into the kernel.
///
/// `delay` and `console` are built once the clocks are known, since both
/// need the final frequencies.
pub fn boot<D, C>(
    bus: &mut impl RegisterBus,
    clock_config: &ClockConfig,
    sdram_config: &SdramConfig,
    budget: Budget,
    log: &mut BootLog,
    delay: impl FnOnce(&Clocks) -> D,
    console: impl FnOnce(&Clocks) -> C,
) -> Result<Sdram, ClockError>
where
    D: DelayUs<u32>,
    C: Console,
{
    mpu::configure(bus, 0, &mpu::SDRAM_REGION, log);

    let clocks = clock::sequence(bus, clock_config, budget, log)?;

    pins::route_all(bus, &pins::FMC_PINS, pins::af::FMC, log);
    let sdram =
        sdram::bring_up(bus, sdram_config, &clocks, &mut delay(&clocks), log);

    pins::route_all(bus, &[pins::USART1_PINS], pins::af::USART1, log);
    announce(&mut console(&clocks));

    cache::maintain_dcache(bus, DcacheOp::CleanInvalidate, log);
    cache::invalidate_icache(bus, log);

    Ok(sdram)
}
