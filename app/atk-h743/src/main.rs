// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot image for the STM32H743 "ATK" board: clocks, SDRAM, banner, caches,
//! then the kernel in flash sector 1.
//!
//! Built for the host, the same sequence runs against the simulated register
//! file and the trace is printed, which is handy for checking what a change
//! does to the register traffic without a board on the desk.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

use drv_stm32h7_bringup::{ClockConfig, SdramConfig};

pub const CLOCKS: ClockConfig = ClockConfig::ATK_H743;
pub const SDRAM: SdramConfig = SdramConfig::ATK_W9825G6;
#[cfg_attr(not(target_os = "none"), allow(dead_code))]
pub const BAUD: u32 = 115_200;

#[cfg(target_os = "none")]
mod usart;

#[cfg(target_os = "none")]
mod target {
    extern crate panic_halt;

    use crate::usart::Usart;
    use crate::{BAUD, CLOCKS, SDRAM};
    use cortex_m_rt::{entry, exception, ExceptionFrame};
    use drv_stm32h7_bringup::bus::Mmio;
    use drv_stm32h7_bringup::console::fault;
    use drv_stm32h7_bringup::{boot, handoff, new_log, BootLog, Budget};

    cfg_if::cfg_if! {
        if #[cfg(feature = "h743")] {
            use stm32h7::stm32h743 as device;
        } else if #[cfg(feature = "h753")] {
            use stm32h7::stm32h753 as device;
        } else {
            compile_error!("one of the h743 or h753 features is required");
        }
    }

    // Interrupts go off before cortex-m-rt initializes RAM, and nothing
    // turns them back on; the kernel enables what it needs. This has to be
    // assembly since there is no usable stack frame or RAM yet.
    core::arch::global_asm! {
        ".global __pre_init",
        ".type __pre_init,%function",
        ".thumb_func",
        "__pre_init:",
        "    cpsid i",
        "    bx lr",
    }

    #[entry]
    fn main() -> ! {
        let Some(log) = cortex_m::singleton!(: BootLog = new_log()) else {
            fail_stop()
        };
        let Some(cp) = cortex_m::Peripherals::take() else {
            fail_stop()
        };
        let Some(dp) = device::Peripherals::take() else {
            fail_stop()
        };

        // Safety: this is the reset path with interrupts masked, and this is
        // the only `Mmio` we make.
        let mut bus = unsafe { Mmio::new() };

        // An unbounded budget never reports a stuck clock; it hangs in the
        // poll instead. The match is for the type system.
        let booted = boot(
            &mut bus,
            &CLOCKS,
            &SDRAM,
            Budget::Unbounded,
            log,
            |clocks| cortex_m::delay::Delay::new(cp.SYST, clocks.sys_hz),
            |clocks| Usart::turn_on(dp.USART1, clocks.pclk_hz, BAUD),
        );
        if booted.is_err() {
            fail_stop()
        }

        // Safety: the image at KERNEL_IMAGE is the kernel we were built to
        // boot.
        unsafe { handoff::start_kernel(&mut bus, handoff::KERNEL_IMAGE, log) }
    }

    // Every exception we don't expect lands here: report it on the console
    // and stop. Before the banner the USART is still off and the byte goes
    // nowhere.
    #[exception]
    fn HardFault(_frame: &ExceptionFrame) -> ! {
        report_fault()
    }

    #[exception]
    fn DefaultHandler(_irqn: i16) {
        report_fault()
    }

    fn report_fault() -> ! {
        // Safety: we never return to the code that owned USART1.
        let mut usart = unsafe { Usart::steal() };
        fault(&mut usart);
        fail_stop()
    }

    fn fail_stop() -> ! {
        loop {
            cortex_m::asm::nop();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    use drv_stm32h7_bringup::console::Console;
    use drv_stm32h7_bringup::sim::SimBus;
    use drv_stm32h7_bringup::{handoff, new_log, Budget};
    use embedded_hal::blocking::delay::DelayUs;
    use std::io::Write;

    struct Sleep;

    impl DelayUs<u32> for Sleep {
        fn delay_us(&mut self, us: u32) {
            std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
        }
    }

    struct Stdout;

    impl Console for Stdout {
        fn putc(&mut self, byte: u8) {
            // Nowhere to report a failed write to stdout.
            let _ = std::io::stdout().write_all(&[byte]);
        }
    }

    let mut bus = SimBus::reset();
    let mut log = new_log();
    match drv_stm32h7_bringup::boot(
        &mut bus,
        &CLOCKS,
        &SDRAM,
        Budget::Spins(0xFFFF),
        &mut log,
        |_| Sleep,
        |_| Stdout,
    ) {
        Ok(sdram) => {
            handoff::point_vectors(&mut bus, handoff::KERNEL_IMAGE, &mut log);
            println!(
                "\nSDRAM at {:#010x}, {} MiB, refresh count {}, timeouts {:?}",
                sdram.base(),
                sdram.size() >> 20,
                sdram.refresh_count(),
                sdram.timeouts(),
            );
        }
        Err(e) => println!("clock bring-up failed: {e:?}"),
    }

    println!("{} register accesses", bus.log().len());
    for e in log.iter() {
        println!("{:>4} x{:<3} {:?}", e.line, e.count, e.payload);
    }
}
