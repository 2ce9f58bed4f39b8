// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pin muxing for the boot path.
//!
//! Only one kind of pin configuration is needed this early: alternate
//! function, push-pull, very high speed, no pulls. Pins are handled a port
//! at a time as a [`PinSet`], so each GPIO register is rewritten once per
//! port rather than once per pin.

use crate::bus::RegisterBus;
use crate::regs::gpio;
use crate::trace::{BootLog, Trace};
use ringbuf::ringbuf_entry;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Port {
    A = 0,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Port {
    pub const fn pin(self, index: usize) -> PinSet {
        PinSet {
            port: self,
            pin_mask: 1 << index,
        }
    }

    pub const fn pins<const N: usize>(self, indexes: [usize; N]) -> PinSet {
        let mut pin_mask = 0;
        let mut i = 0;
        while i < N {
            pin_mask |= 1 << indexes[i];
            i += 1;
        }
        PinSet {
            port: self,
            pin_mask,
        }
    }
}

/// Some pins on one port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinSet {
    pub port: Port,
    pub pin_mask: u16,
}

/// Alternate function numbers (AFRL/AFRH). What each one connects to depends
/// on the pin; see the datasheet.
pub mod af {
    pub const USART1: u8 = 7;
    pub const FMC: u8 = 12;
}

/// FMC SDRAM bank 1 on the ATK board: 13 address lines, 16 data lines, two
/// bank selects, the two byte masks and the control strobes.
pub const FMC_PINS: [PinSet; 5] = [
    Port::C.pins([0, 2, 3]),
    Port::D.pins([0, 1, 8, 9, 10, 14, 15]),
    Port::E.pins([0, 1, 7, 8, 9, 10, 11, 12, 13, 14, 15]),
    Port::F.pins([0, 1, 2, 3, 4, 5, 11, 12, 13, 14, 15]),
    Port::G.pins([0, 1, 2, 3, 4, 5, 8, 15]),
];

/// USART1 TX and RX.
pub const USART1_PINS: PinSet = Port::A.pins([9, 10]);

const MODE_ALTERNATE: u32 = 0b10;
const SPEED_VERY_HIGH: u32 = 0b11;
const PUSH_PULL: u32 = 0;
const PULL_NONE: u32 = 0b00;

/// Connects every pin in `pins` to alternate function `af`.
pub fn route_alternate(bus: &mut impl RegisterBus, pins: PinSet, af: u8) {
    let port = pins.port as u32;

    // Register fields are 1, 2 and 4 bits wide. Spread the 1-bit pin mask
    // out to mark the low bit of each wider field.
    let lsbs_1 = u32::from(pins.pin_mask);
    let lsbs_2 = outer_perfect_shuffle(lsbs_1);
    let lsbs_4l = outer_perfect_shuffle(lsbs_2 & 0xFFFF);
    let lsbs_4h = outer_perfect_shuffle(lsbs_2 >> 16);

    let mask_2 = lsbs_2.wrapping_mul(0b11);
    let mask_4l = lsbs_4l.wrapping_mul(0b1111);
    let mask_4h = lsbs_4h.wrapping_mul(0b1111);

    let af = u32::from(af & 0b1111);
    bus.write_field(
        gpio::reg(port, gpio::AFRL),
        mask_4l,
        af.wrapping_mul(lsbs_4l),
    );
    bus.write_field(
        gpio::reg(port, gpio::AFRH),
        mask_4h,
        af.wrapping_mul(lsbs_4h),
    );
    bus.write_field(
        gpio::reg(port, gpio::OTYPER),
        lsbs_1,
        PUSH_PULL.wrapping_mul(lsbs_1),
    );
    bus.write_field(
        gpio::reg(port, gpio::OSPEEDR),
        mask_2,
        SPEED_VERY_HIGH.wrapping_mul(lsbs_2),
    );
    bus.write_field(
        gpio::reg(port, gpio::PUPDR),
        mask_2,
        PULL_NONE.wrapping_mul(lsbs_2),
    );
    // Mode last, so the pin never drives with a stale mux setting.
    bus.write_field(
        gpio::reg(port, gpio::MODER),
        mask_2,
        MODE_ALTERNATE.wrapping_mul(lsbs_2),
    );
}

/// Routes a board pin table, tracing how many pins it touched.
pub fn route_all(
    bus: &mut impl RegisterBus,
    table: &[PinSet],
    af: u8,
    log: &mut BootLog,
) {
    let mut count = 0;
    for &pins in table {
        route_alternate(bus, pins, af);
        count += pins.pin_mask.count_ones();
    }
    ringbuf_entry!(log, Trace::PinsRouted(count as u8));
}

/// Interleaves the bottom 16 bits of `input` with zeroes: bit n moves to bit
/// 2n.
const fn outer_perfect_shuffle(mut input: u32) -> u32 {
    let mut tmp = (input ^ (input >> 8)) & 0x0000ff00;
    input ^= tmp ^ (tmp << 8);
    tmp = (input ^ (input >> 4)) & 0x00f000f0;
    input ^= tmp ^ (tmp << 4);
    tmp = (input ^ (input >> 2)) & 0x0c0c0c0c;
    input ^= tmp ^ (tmp << 2);
    tmp = (input ^ (input >> 1)) & 0x22222222;
    input ^= tmp ^ (tmp << 1);
    input
}
