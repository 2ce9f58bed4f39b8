// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transmit-only USART1, just enough for the banner.

use drv_stm32h7_bringup::console::Console;

cfg_if::cfg_if! {
    if #[cfg(feature = "h743")] {
        use stm32h7::stm32h743 as device;
    } else if #[cfg(feature = "h753")] {
        use stm32h7::stm32h753 as device;
    }
}

pub struct Usart {
    usart: device::USART1,
}

impl Usart {
    /// Enables the transmitter at `baud_rate`. The peripheral clock must
    /// already be on and the TX pin routed.
    pub fn turn_on(usart: device::USART1, clock_hz: u32, baud_rate: u32) -> Self {
        usart.cr1.write(|w| w.fifoen().set_bit().ue().enabled());

        let cycles_per_bit = (clock_hz + (baud_rate / 2)) / baud_rate;
        usart.brr.write(|w| w.brr().bits(cycles_per_bit as u16));

        usart.cr1.modify(|_, w| w.te().enabled());

        Self { usart }
    }

    /// Takes USART1 regardless of who else holds it, for the fault path.
    ///
    /// # Safety
    ///
    /// Only for code that will never return to whoever owned the
    /// peripheral.
    pub unsafe fn steal() -> Self {
        // Safety: passed through from our caller.
        let usart = unsafe { device::Peripherals::steal() }.USART1;
        Self { usart }
    }
}

impl Console for Usart {
    fn putc(&mut self, byte: u8) {
        // TX FIFO not full
        while !self.usart.isr.read().txe().bit() {
            // spin
        }
        self.usart.tdr.write(|w| w.tdr().bits(u16::from(byte)));
    }
}
