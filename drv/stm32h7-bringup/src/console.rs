// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The startup banner.

/// Printed once the clocks and SDRAM are up. Seeing it on the wire is the
/// only outward sign that bring-up got that far.
pub const BANNER: &[u8] = b"Start\n\r";

/// Sent by the fault handlers before they stop.
pub const FAULT: u8 = b'E';

/// Blocking single-byte transmit.
pub trait Console {
    fn putc(&mut self, byte: u8);
}

impl<C: Console + ?Sized> Console for &mut C {
    fn putc(&mut self, byte: u8) {
        (**self).putc(byte);
    }
}

pub fn announce(console: &mut impl Console) {
    for &b in BANNER {
        console.putc(b);
    }
}

/// Reports an exception nobody handles. The caller hangs afterwards.
pub fn fault(console: &mut impl Console) {
    console.putc(FAULT);
}
