// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Level 1 cache maintenance before hand-off.
//!
//! The I-cache has a single invalidate-all operation. The D-cache only has
//! per-line set/way operations, so its geometry is read from CCSIDR and
//! walked one line at a time.

use crate::bus::{Barrier, Reg, RegisterBus};
use crate::regs::scb;
use crate::trace::{BootLog, Trace};
use ringbuf::ringbuf_entry;

/// Leading zero bits in `x`, found by scanning down from the top bit.
/// Zero has 32.
pub fn clz(x: u32) -> u32 {
    let mut count = 0;
    let mut mask = 1 << 31;
    while mask != 0 && x & mask == 0 {
        count += 1;
        mask >>= 1;
    }
    count
}

/// D-cache shape as described by CCSIDR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CacheGeometry {
    pub sets: u32,
    pub ways: u32,
    /// log2 of the line size in bytes; also where the set index sits in a
    /// set/way operand.
    pub line_shift: u32,
    /// Where the way index sits in a set/way operand: the top of the word,
    /// just wide enough for `ways - 1`.
    pub way_shift: u32,
}

impl CacheGeometry {
    pub fn decode(ccsidr: u32) -> Self {
        let sets = ((ccsidr >> scb::CCSIDR_NUMSETS_SHIFT) & scb::CCSIDR_NUMSETS_MASK) + 1;
        let ways = ((ccsidr >> scb::CCSIDR_ASSOC_SHIFT) & scb::CCSIDR_ASSOC_MASK) + 1;
        let line_shift = (ccsidr & scb::CCSIDR_LINESIZE_MASK) + 4;
        // A direct-mapped cache has no way field; clz(0) = 32 wraps to 0.
        let way_shift = clz(ways - 1) & 0x1F;
        Self {
            sets,
            ways,
            line_shift,
            way_shift,
        }
    }

    /// The operand naming one line for DCISW / DCCISW.
    pub fn set_way(&self, set: u32, way: u32) -> u32 {
        (way << self.way_shift) | (set << self.line_shift)
    }

    pub fn lines(&self) -> u32 {
        self.sets * self.ways
    }
}

/// What to do to each D-cache line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DcacheOp {
    /// Drop the line, dirty or not.
    Invalidate,
    /// Write the line back if dirty, then drop it.
    CleanInvalidate,
}

impl DcacheOp {
    fn reg(self) -> Reg {
        match self {
            DcacheOp::Invalidate => scb::DCISW,
            DcacheOp::CleanInvalidate => scb::DCCISW,
        }
    }
}

pub fn invalidate_icache(bus: &mut impl RegisterBus, log: &mut BootLog) {
    bus.barrier(Barrier::Dsb);
    bus.barrier(Barrier::Isb);
    bus.write(scb::ICIALLU, 0);
    bus.barrier(Barrier::Dsb);
    bus.barrier(Barrier::Isb);
    ringbuf_entry!(log, Trace::ICacheInvalidated);
}

/// Applies `op` to every line of the L1 D-cache, way index varying fastest.
pub fn maintain_dcache(
    bus: &mut impl RegisterBus,
    op: DcacheOp,
    log: &mut BootLog,
) -> CacheGeometry {
    bus.barrier(Barrier::Dsb);
    bus.barrier(Barrier::Isb);

    // Level 1, data.
    bus.write(scb::CSSELR, 0);
    bus.barrier(Barrier::Dsb);
    let geometry = CacheGeometry::decode(bus.read(scb::CCSIDR));
    ringbuf_entry!(
        log,
        Trace::DCacheGeometry {
            sets: geometry.sets as u16,
            ways: geometry.ways as u16,
            line_shift: geometry.line_shift as u8,
        }
    );

    let reg = op.reg();
    bus.barrier(Barrier::Dsb);
    for set in 0..geometry.sets {
        for way in 0..geometry.ways {
            bus.write(reg, geometry.set_way(set, way));
        }
    }
    bus.barrier(Barrier::Dsb);
    bus.barrier(Barrier::Isb);

    ringbuf_entry!(log, Trace::DCacheSetWay { ops: geometry.lines() });
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Access, SimBus};
    use crate::trace::new_log;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn ccsidr(sets: u32, ways: u32, line_field: u32) -> u32 {
        ((sets - 1) << 13) | ((ways - 1) << 3) | line_field
    }

    #[test]
    fn clz_scans_from_the_top() {
        assert_eq!(clz(0), 32);
        assert_eq!(clz(1), 31);
        assert_eq!(clz(3), 30);
        assert_eq!(clz(0x8000_0000), 0);
        assert_eq!(clz(0x0001_0000), 15);
    }

    #[test]
    fn way_shift_for_power_of_two_ways() {
        let shifts: Vec<u32> = [1, 2, 4, 8, 16]
            .iter()
            .map(|&w| CacheGeometry::decode(ccsidr(128, w, 1)).way_shift)
            .collect();
        assert_eq!(shifts, [0, 31, 30, 29, 28]);
    }

    #[test]
    fn cortex_m7_16k_dcache() {
        let g = CacheGeometry::decode(0xF00F_E019);
        assert_eq!(
            g,
            CacheGeometry {
                sets: 128,
                ways: 4,
                line_shift: 5,
                way_shift: 30,
            }
        );
    }

    #[test]
    fn four_sets_two_ways_is_eight_lines() {
        let mut bus = SimBus::reset();
        bus.set_ccsidr(ccsidr(4, 2, 0));
        let mut log = new_log();
        let g = maintain_dcache(&mut bus, DcacheOp::CleanInvalidate, &mut log);
        assert_eq!(g.line_shift, 4);

        let ops: Vec<u32> = bus.writes_to(scb::DCCISW).collect();
        let mut want = vec![];
        for set in 0..4u32 {
            for way in 0..2u32 {
                want.push((way << 31) | (set << 4));
            }
        }
        assert_eq!(ops, want);
        assert_eq!(ops.iter().collect::<BTreeSet<_>>().len(), 8);
        assert_eq!(bus.writes_to(scb::DCISW).count(), 0);
    }

    #[test]
    fn invalidate_uses_dcisw() {
        let mut bus = SimBus::reset();
        bus.set_ccsidr(ccsidr(2, 1, 0));
        let mut log = new_log();
        maintain_dcache(&mut bus, DcacheOp::Invalidate, &mut log);
        assert_eq!(bus.writes_to(scb::DCISW).collect::<Vec<_>>(), [0, 1 << 4]);
    }

    #[test]
    fn dcache_loop_is_fenced() {
        let mut bus = SimBus::reset();
        bus.set_ccsidr(ccsidr(2, 2, 0));
        let mut log = new_log();
        maintain_dcache(&mut bus, DcacheOp::CleanInvalidate, &mut log);

        let log = bus.log();
        let first = log
            .iter()
            .position(|a| matches!(a, Access::Write(r, _) if *r == scb::DCCISW))
            .unwrap();
        let last = log
            .iter()
            .rposition(|a| matches!(a, Access::Write(r, _) if *r == scb::DCCISW))
            .unwrap();
        assert_eq!(log[first - 1], Access::Barrier(Barrier::Dsb));
        assert_eq!(
            &log[last + 1..],
            [Access::Barrier(Barrier::Dsb), Access::Barrier(Barrier::Isb)]
        );
        assert_eq!(log[0], Access::Barrier(Barrier::Dsb));
        assert_eq!(log[1], Access::Barrier(Barrier::Isb));
    }

    #[test]
    fn icache_is_one_fenced_write() {
        let mut bus = SimBus::reset();
        let mut log = new_log();
        invalidate_icache(&mut bus, &mut log);
        assert_eq!(
            bus.log(),
            [
                Access::Barrier(Barrier::Dsb),
                Access::Barrier(Barrier::Isb),
                Access::Write(scb::ICIALLU, 0),
                Access::Barrier(Barrier::Dsb),
                Access::Barrier(Barrier::Isb),
            ]
        );
    }

    proptest! {
        #[test]
        fn clz_matches_leading_zeros(x: u32) {
            prop_assert_eq!(clz(x), x.leading_zeros());
        }

        #[test]
        fn set_and_way_fields_never_overlap(
            sets in 1u32..=0x8000,
            way_log2 in 0u32..=4,
            line_field in 0u32..=7,
        ) {
            let ways = 1 << way_log2;
            let g = CacheGeometry::decode(ccsidr(sets, ways, line_field));
            prop_assert_eq!(g.sets, sets);
            prop_assert_eq!(g.ways, ways);

            let top_way = u64::from(ways - 1) << g.way_shift;
            let top_set = u64::from(sets - 1) << g.line_shift;
            prop_assert!(top_way <= u64::from(u32::MAX));
            prop_assert!(top_set <= u64::from(u32::MAX));
            prop_assert_eq!(top_way & top_set, 0);
            prop_assert_eq!(
                g.set_way(sets - 1, ways - 1) as u64,
                top_way | top_set
            );
        }

        #[test]
        fn every_line_visited_once(
            sets in 1u32..=64,
            way_log2 in 0u32..=3,
            line_field in 0u32..=3,
        ) {
            let ways = 1 << way_log2;
            let mut bus = SimBus::reset();
            bus.set_ccsidr(ccsidr(sets, ways, line_field));
            let mut log = new_log();
            maintain_dcache(&mut bus, DcacheOp::CleanInvalidate, &mut log);

            let ops: Vec<u32> = bus.writes_to(scb::DCCISW).collect();
            let distinct: BTreeSet<u32> = ops.iter().copied().collect();
            prop_assert_eq!(ops.len() as u32, sets * ways);
            prop_assert_eq!(distinct.len(), ops.len());
        }
    }
}
