// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for tracing the boot path
//!
//! Early boot has no console: the serial port is configured last, and a stuck
//! clock poll hangs the part before anything could be printed. What we do
//! have is RAM and a debugger. This crate provides a fixed-size ring of trace
//! entries that the bring-up code appends to as it goes, so that after a hang
//! (or after a successful boot) the sequence can be read back with GDB by
//! printing the buffer wherever the board keeps it.
//!
//! ## Owned, not static
//!
//! Unlike a task-level ring buffer, this one is an ordinary value. The boot
//! path is a single thread of control with interrupts masked, so the buffer is
//! created once (typically in a `cortex_m::singleton!`) and threaded through
//! the bring-up routines as `&mut Ringbuf<T, N>`. This also keeps host unit
//! tests independent of each other: each test owns its own buffer.
//!
//! ## Constraints
//!
//! The entry type must implement `Copy` and `PartialEq`. Two consecutive
//! entries from the same source line with equal payloads are folded into one
//! entry whose `count` is incremented, which keeps busy-poll loops from
//! flushing the whole buffer.
//!
//! ## Recording
//!
//! ```ignore
//! let mut trace: Ringbuf<Trace, 32> = Ringbuf::new(Trace::None);
//! ringbuf_entry!(&mut trace, Trace::HseReady);
//! ```

#![no_std]

/// Inserts `payload` into the ring buffer behind `buf`, tagged with the
/// current source line.
///
/// `buf` must evaluate to a `&mut Ringbuf<T, N>`; it is reborrowed, so the
/// caller keeps using it afterwards.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other, by evaluating them in a tuple where each cannot
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &mut *$buf);
        $crate::Ringbuf::entry(buf, line!() as u16, p);
    }};
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$buf;
        let _ = &$payload;
    }};
}

/// A single entry. `count` is the number of consecutive times this exact
/// `(line, payload)` pair was recorded; `generation` counts how many times
/// the slot has been reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    /// Creates an empty buffer with every slot holding `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // On first use `last` is None. Treating that as an out-of-range index
        // both skips the fold check and lands the first entry in slot 0.
        let last = self.last.unwrap_or(usize::MAX);

        // `get_mut` also covers a corrupted `last`: we just start over at 0
        // instead of panicking on a bounds check.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Fold only while the count doesn't overflow.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Compare-and-reset rather than remainder: Cortex-M0 has no divider,
        // and this turns the usize::MAX starting value into 0 for free.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// The most recently recorded entry, if any.
    pub fn latest(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }

    /// Walks the recorded entries from oldest to newest. Slots that have never
    /// been written are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = match self.last {
            Some(last) => last.wrapping_add(1),
            None => N,
        };
        (0..N)
            .map(move |i| (start + i) % N.max(1))
            .filter(move |_| self.last.is_some())
            .map(move |i| &self.buffer[i])
            .filter(|e| e.generation != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut rb: Ringbuf<u32, 4> = Ringbuf::new(0);
        rb.entry(10, 7);
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].payload, 7);
        assert_eq!(rb.buffer[0].count, 1);
        assert_eq!(rb.buffer[0].generation, 1);
    }

    #[test]
    fn repeated_entries_fold() {
        let mut rb: Ringbuf<u32, 4> = Ringbuf::new(0);
        for _ in 0..5 {
            rb.entry(10, 7);
        }
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].count, 5);

        // Same payload from a different line is a new entry.
        rb.entry(11, 7);
        assert_eq!(rb.last, Some(1));
    }

    #[test]
    fn wraps_and_bumps_generation() {
        let mut rb: Ringbuf<u32, 3> = Ringbuf::new(0);
        for i in 0..4 {
            rb.entry(1, i);
        }
        assert_eq!(rb.last, Some(0));
        assert_eq!(rb.buffer[0].payload, 3);
        assert_eq!(rb.buffer[0].generation, 2);
    }

    #[test]
    fn iter_is_oldest_first() {
        let mut rb: Ringbuf<u32, 3> = Ringbuf::new(0);
        assert_eq!(rb.iter().count(), 0);

        rb.entry(1, 10);
        rb.entry(1, 20);
        let seen: [u32; 2] = {
            let mut it = rb.iter().map(|e| e.payload);
            [it.next().unwrap(), it.next().unwrap()]
        };
        assert_eq!(seen, [10, 20]);

        rb.entry(1, 30);
        rb.entry(1, 40);
        let mut it = rb.iter().map(|e| e.payload);
        assert_eq!(it.next(), Some(20));
        assert_eq!(it.next(), Some(30));
        assert_eq!(it.next(), Some(40));
        assert_eq!(it.next(), None);
        assert_eq!(rb.latest().map(|e| e.payload), Some(40));
    }

    #[test]
    fn macro_reborrows() {
        let mut rb: Ringbuf<u8, 2> = Ringbuf::new(0);
        let trace = &mut rb;
        ringbuf_entry!(trace, 1);
        ringbuf_entry!(trace, 2);
        assert_eq!(trace.latest().map(|e| e.payload), Some(2));
    }
}
