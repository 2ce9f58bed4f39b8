// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FMC SDRAM bring-up.
//!
//! The controller is reset, enabled, and given the device geometry and
//! timing while write protection is on. The device's power-up protocol
//! follows as a fixed series of commands, each followed by a busy poll and a
//! settle delay. Refresh is programmed last, and only then is write
//! protection dropped.
//!
//! Busy polls are bounded by [`FMC_BUSY_BUDGET`]. A command that never
//! completes doesn't stop the sequence; it is recorded in
//! [`Sdram::timeouts`] and the trace, and whoever looks at the handle decides
//! what it means.

use crate::bus::RegisterBus;
use crate::clock::Clocks;
use crate::poll::{poll, Level, FMC_BUSY_BUDGET};
use crate::regs::{fmc, rcc};
use crate::trace::{BootLog, Trace};
use embedded_hal::blocking::delay::DelayUs;
use ringbuf::ringbuf_entry;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BusWidth {
    Bits8 = 0b00,
    Bits16 = 0b01,
    Bits32 = 0b10,
}

impl BusWidth {
    pub const fn bytes(self) -> u32 {
        match self {
            BusWidth::Bits8 => 1,
            BusWidth::Bits16 => 2,
            BusWidth::Bits32 => 4,
        }
    }
}

/// SDCLK period as a multiple of the FMC kernel clock period.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SdClock {
    Div2 = 0b10,
    Div3 = 0b11,
}

impl SdClock {
    pub const fn divisor(self) -> u32 {
        match self {
            SdClock::Div2 => 2,
            SdClock::Div3 => 3,
        }
    }
}

/// Device geometry and access mode, packed into SDCR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SdControl {
    /// Column address bits, 8-11.
    pub columns: u8,
    /// Row address bits, 11-13.
    pub rows: u8,
    pub width: BusWidth,
    /// Internal banks, 2 or 4.
    pub banks: u8,
    /// CAS latency in SDCLK cycles, 1-3.
    pub cas: u8,
    pub sdclk: SdClock,
    pub read_burst: bool,
    /// Extra kernel-clock cycles of read delay, 0-2.
    pub read_pipe: u8,
}

impl SdControl {
    pub const fn pack(&self, write_protect: bool) -> u32 {
        ((self.columns as u32 - 8) & 0b11)
            | (((self.rows as u32 - 11) & 0b11) << 2)
            | ((self.width as u32) << 4)
            | (((self.banks == 4) as u32) << 6)
            | (((self.cas as u32) & 0b11) << 7)
            | ((write_protect as u32) << 9)
            | ((self.sdclk as u32) << 10)
            | ((self.read_burst as u32) << 12)
            | (((self.read_pipe as u32) & 0b11) << 13)
    }

    /// Addressable bytes on the device.
    pub const fn size_bytes(&self) -> u32 {
        (self.banks as u32)
            << (self.rows as u32 + self.columns as u32)
            << (self.width.bytes().trailing_zeros())
    }

    /// The device mode register for this configuration: burst length 1,
    /// sequential bursts, the controller's CAS latency, standard operation,
    /// programmed write bursts.
    pub const fn mode_register(&self) -> u16 {
        ((self.cas as u16) & 0b111) << 4
    }
}

/// Device timing, in SDCLK cycles (1-16 each), packed into SDTR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SdTiming {
    /// Load mode register to active.
    pub tmrd: u8,
    /// Exit self-refresh delay.
    pub txsr: u8,
    /// Self-refresh time.
    pub tras: u8,
    /// Row cycle delay.
    pub trc: u8,
    /// Recovery delay.
    pub twr: u8,
    /// Row precharge delay.
    pub trp: u8,
    /// Row to column delay.
    pub trcd: u8,
}

impl SdTiming {
    pub const SLOWEST: Self = Self {
        tmrd: 16,
        txsr: 16,
        tras: 16,
        trc: 16,
        twr: 16,
        trp: 16,
        trcd: 16,
    };

    pub const fn pack(&self) -> u32 {
        const fn field(cycles: u8, shift: u32) -> u32 {
            ((cycles as u32 - 1) & 0xF) << shift
        }
        field(self.tmrd, 0)
            | field(self.txsr, 4)
            | field(self.tras, 8)
            | field(self.trc, 12)
            | field(self.twr, 16)
            | field(self.trp, 20)
            | field(self.trcd, 24)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SdramConfig {
    pub control: SdControl,
    pub timing: SdTiming,
    /// Auto-refresh cycles issued during power-up, 1-16.
    pub auto_refresh: u8,
    /// Every row must be refreshed within this window.
    pub refresh_period_ms: u32,
    pub refresh_rows: u32,
    /// Pause after each power-up command.
    pub settle_us: u32,
}

impl SdramConfig {
    /// Winbond W9825G6KH on the ATK board: 4 banks x 8192 rows x 512
    /// columns x 16 bits. Timing is left at the slowest setting, which the
    /// part tolerates at any SDCLK we can produce.
    pub const ATK_W9825G6: Self = Self {
        control: SdControl {
            columns: 9,
            rows: 13,
            width: BusWidth::Bits16,
            banks: 4,
            cas: 3,
            sdclk: SdClock::Div2,
            read_burst: true,
            read_pipe: 0,
        },
        timing: SdTiming::SLOWEST,
        auto_refresh: 8,
        refresh_period_ms: 64,
        refresh_rows: 8192,
        settle_us: 100,
    };

    pub const fn check(&self) {
        let c = &self.control;
        assert!(c.columns >= 8 && c.columns <= 11);
        assert!(c.rows >= 11 && c.rows <= 13);
        assert!(c.banks == 2 || c.banks == 4);
        assert!(c.cas >= 1 && c.cas <= 3);
        assert!(c.read_pipe <= 2);
        assert!(self.auto_refresh >= 1 && self.auto_refresh <= 16);
        assert!(self.refresh_rows > 0);

        const fn cycles(n: u8) -> bool {
            n >= 1 && n <= 16
        }
        let t = &self.timing;
        assert!(cycles(t.tmrd) && cycles(t.txsr) && cycles(t.tras));
        assert!(cycles(t.trc) && cycles(t.twr) && cycles(t.trp));
        assert!(cycles(t.trcd));
    }

    pub const fn sdclk_hz(&self, clocks: &Clocks) -> u32 {
        clocks.fmc_ker_hz / self.control.sdclk.divisor()
    }

    /// SDRTR.COUNT: SDCLK cycles between refresh commands, less the 20
    /// cycle margin the controller asks for, clamped to the field.
    pub const fn refresh_count(&self, clocks: &Clocks) -> u16 {
        let per_row = self.sdclk_hz(clocks) as u64
            * self.refresh_period_ms as u64
            / 1000
            / self.refresh_rows as u64;
        let count = per_row.saturating_sub(20);
        // The controller requires at least 41.
        if count < 41 {
            41
        } else if count > 0x1FFF {
            0x1FFF
        } else {
            count as u16
        }
    }
}

const _: () = SdramConfig::ATK_W9825G6.check();

/// SDRAM controller commands (SDCMR.MODE), all sent to bank 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Normal,
    ClockEnable,
    PrechargeAll,
    /// Issue this many back-to-back auto-refresh cycles.
    AutoRefresh(u8),
    /// Load the device mode register with this value.
    LoadMode(u16),
}

const SDCMR_CTB1: u32 = 1 << 4;
const SDCMR_NRFS_SHIFT: u32 = 5;
const SDCMR_MRD_SHIFT: u32 = 9;

impl Command {
    pub const fn encode(self) -> u32 {
        let (mode, nrfs, mrd) = match self {
            Command::Normal => (0b000, 0, 0),
            Command::ClockEnable => (0b001, 0, 0),
            Command::PrechargeAll => (0b010, 0, 0),
            Command::AutoRefresh(n) => (0b011, (n as u32 - 1) & 0xF, 0),
            Command::LoadMode(m) => (0b100, 0, (m as u32) & 0x3FFF),
        };
        mode | SDCMR_CTB1 | (nrfs << SDCMR_NRFS_SHIFT) | (mrd << SDCMR_MRD_SHIFT)
    }

    fn timeout(self) -> Timeouts {
        match self {
            Command::Normal => Timeouts::empty(),
            Command::ClockEnable => Timeouts::CLOCK_ENABLE,
            Command::PrechargeAll => Timeouts::PRECHARGE_ALL,
            Command::AutoRefresh(_) => Timeouts::AUTO_REFRESH,
            Command::LoadMode(_) => Timeouts::LOAD_MODE,
        }
    }
}

bitflags::bitflags! {
    /// Power-up commands whose busy poll ran out of budget.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Timeouts: u8 {
        const CLOCK_ENABLE = 1 << 0;
        const PRECHARGE_ALL = 1 << 1;
        const AUTO_REFRESH = 1 << 2;
        const LOAD_MODE = 1 << 3;
    }
}

/// A configured SDRAM bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Sdram {
    base: u32,
    size: u32,
    refresh_count: u16,
    timeouts: Timeouts,
}

impl Sdram {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn refresh_count(&self) -> u16 {
        self.refresh_count
    }

    /// Commands that were still busy when their budget ran out. Empty on a
    /// clean bring-up.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

/// Brings up SDRAM bank 1. The FMC kernel clock must already be running at
/// `clocks.fmc_ker_hz`, and the FMC pins routed.
///
/// Panics, before touching any register, if `config` fails
/// [`SdramConfig::check`].
pub fn bring_up(
    bus: &mut impl RegisterBus,
    config: &SdramConfig,
    clocks: &Clocks,
    delay: &mut impl DelayUs<u32>,
    log: &mut BootLog,
) -> Sdram {
    config.check();

    bus.set_bits(rcc::AHB3RSTR, rcc::AHB3RSTR_FMCRST);
    bus.clear_bits(rcc::AHB3RSTR, rcc::AHB3RSTR_FMCRST);
    ringbuf_entry!(log, Trace::FmcReset);

    bus.set_bits(fmc::BCR1, fmc::BCR1_FMCEN);
    ringbuf_entry!(log, Trace::FmcEnabled);

    // Geometry and timing go in once, with writes locked out until the
    // device has been through its power-up sequence.
    let sdcr = config.control.pack(true);
    let sdtr = config.timing.pack();
    bus.write(fmc::SDCR1, sdcr);
    bus.write(fmc::SDTR1, sdtr);
    ringbuf_entry!(log, Trace::SdramConfigured { sdcr, sdtr });

    let mut timeouts = Timeouts::empty();
    for cmd in [
        Command::ClockEnable,
        Command::PrechargeAll,
        Command::AutoRefresh(config.auto_refresh),
        Command::LoadMode(config.control.mode_register()),
    ] {
        bus.write(fmc::SDCMR, cmd.encode());
        ringbuf_entry!(log, Trace::SdramCommand(cmd));
        let p = poll(bus, fmc::SDSR, fmc::SDSR_BUSY, Level::Clear, FMC_BUSY_BUDGET);
        if !p.is_ready() {
            timeouts |= cmd.timeout();
            ringbuf_entry!(log, Trace::SdramBusyTimeout(cmd));
        }
        delay.delay_us(config.settle_us);
    }

    bus.write(fmc::SDCMR, Command::Normal.encode());
    ringbuf_entry!(log, Trace::SdramCommand(Command::Normal));

    let refresh_count = config.refresh_count(clocks);
    bus.write_field(
        fmc::SDRTR,
        fmc::SDRTR_COUNT_MASK,
        u32::from(refresh_count) << fmc::SDRTR_COUNT_SHIFT,
    );
    ringbuf_entry!(log, Trace::RefreshCount(refresh_count));

    bus.clear_bits(fmc::SDCR1, fmc::SDCR_WP);
    ringbuf_entry!(log, Trace::WriteProtectCleared);

    Sdram {
        base: fmc::SDRAM_BANK1_BASE,
        size: config.control.size_bytes(),
        refresh_count,
        timeouts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Reg;
    use crate::clock::ClockConfig;
    use crate::sim::{Access, Busy, SimBus};
    use crate::trace::new_log;

    const CFG: SdramConfig = SdramConfig::ATK_W9825G6;
    const CLOCKS: Clocks = ClockConfig::ATK_H743.clocks();

    /// Records requested delays instead of waiting.
    #[derive(Default)]
    struct Delays(Vec<u32>);

    impl DelayUs<u32> for Delays {
        fn delay_us(&mut self, us: u32) {
            self.0.push(us);
        }
    }

    fn run(bus: &mut SimBus) -> (Sdram, Delays, BootLog) {
        let mut delay = Delays::default();
        let mut log = new_log();
        let sdram = bring_up(bus, &CFG, &CLOCKS, &mut delay, &mut log);
        (sdram, delay, log)
    }

    fn is_memory_side(reg: Reg) -> bool {
        reg == rcc::AHB3RSTR
            || (fmc::BASE..fmc::BASE + 0x1000).contains(&reg.addr())
    }

    #[test]
    fn packed_words() {
        assert_eq!(CFG.control.pack(false), 0x0000_19D9);
        assert_eq!(CFG.control.pack(true), 0x0000_1BD9);
        assert_eq!(CFG.timing.pack(), 0x0FFF_FFFF);
        assert_eq!(CFG.control.mode_register(), 0x030);
        assert_eq!(CFG.control.size_bytes(), 32 << 20);
    }

    #[test]
    fn command_encoding() {
        assert_eq!(Command::ClockEnable.encode(), 0x11);
        assert_eq!(Command::PrechargeAll.encode(), 0x12);
        assert_eq!(Command::AutoRefresh(8).encode(), 0xF3);
        assert_eq!(Command::LoadMode(0x20).encode(), 0x4014);
        assert_eq!(Command::LoadMode(0x30).encode(), 0x6014);
        assert_eq!(Command::Normal.encode(), 0x10);
    }

    #[test]
    fn refresh_from_sdclk() {
        // 125 MHz SDCLK, 64 ms / 8192 rows = 7.8125 us => 976 cycles.
        assert_eq!(CFG.sdclk_hz(&CLOCKS), 125_000_000);
        assert_eq!(CFG.refresh_count(&CLOCKS), 956);

        let slow = Clocks {
            fmc_ker_hz: 4_000_000,
            ..CLOCKS
        };
        assert_eq!(CFG.refresh_count(&slow), 41);
    }

    #[test]
    fn clean_slate_write_order() {
        let mut bus = SimBus::reset();
        let (sdram, _, _) = run(&mut bus);

        let writes: Vec<(Reg, u32)> = bus
            .log()
            .iter()
            .filter_map(|a| match *a {
                Access::Write(r, v) if is_memory_side(r) => Some((r, v)),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            [
                (rcc::AHB3RSTR, rcc::AHB3RSTR_FMCRST),
                (rcc::AHB3RSTR, 0),
                (fmc::BCR1, 0x8000_30DB),
                (fmc::SDCR1, 0x0000_1BD9),
                (fmc::SDTR1, 0x0FFF_FFFF),
                (fmc::SDCMR, 0x11),
                (fmc::SDCMR, 0x12),
                (fmc::SDCMR, 0xF3),
                (fmc::SDCMR, 0x6014),
                (fmc::SDCMR, 0x10),
                (fmc::SDRTR, 956 << 1),
                (fmc::SDCR1, 0x0000_19D9),
            ]
        );

        assert_eq!(sdram.base(), 0xC000_0000);
        assert_eq!(sdram.size(), 32 * 1024 * 1024);
        assert!(sdram.timeouts().is_empty());
    }

    #[test]
    fn each_command_polls_then_settles() {
        let mut bus = SimBus::reset();
        bus.set_fmc_busy(Busy::For(3));
        let (sdram, delays, _) = run(&mut bus);
        assert!(sdram.timeouts().is_empty());
        assert_eq!(delays.0, [100; 4]);

        // Between consecutive commands the busy flag was seen clear.
        let log = bus.log();
        let cmds: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, a)| matches!(a, Access::Write(r, _) if *r == fmc::SDCMR))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(cmds.len(), 5);
        for w in cmds.windows(2) {
            let idle = log[w[0]..w[1]].iter().any(|a| {
                matches!(a, Access::Read(r, v) if *r == fmc::SDSR && v & fmc::SDSR_BUSY == 0)
            });
            assert!(idle);
        }
    }

    #[test]
    fn stuck_busy_times_out_and_carries_on() {
        let mut bus = SimBus::reset();
        bus.set_fmc_busy(Busy::Stuck);
        let (sdram, delays, log) = run(&mut bus);

        assert_eq!(
            sdram.timeouts(),
            Timeouts::CLOCK_ENABLE
                | Timeouts::PRECHARGE_ALL
                | Timeouts::AUTO_REFRESH
                | Timeouts::LOAD_MODE
        );
        // Every remaining step still happened.
        assert_eq!(delays.0.len(), 4);
        assert_eq!(bus.writes_to(fmc::SDCMR).last(), Some(0x10));
        assert_eq!(bus.peek(fmc::SDCR1) & fmc::SDCR_WP, 0);
        assert_eq!(bus.peek(fmc::SDRTR), 956 << 1);

        // Each poll read SDSR once plus once per retry.
        let sdsr_reads = bus
            .log()
            .iter()
            .filter(|a| matches!(a, Access::Read(r, _) if *r == fmc::SDSR))
            .count();
        assert_eq!(sdsr_reads, 4 * (0xFFFF + 1));

        let timeouts = log
            .iter()
            .filter(|e| matches!(e.payload, Trace::SdramBusyTimeout(_)))
            .count();
        assert_eq!(timeouts, 4);
    }

    #[test]
    fn out_of_range_geometry_touches_nothing() {
        let mut bus = SimBus::reset();
        let cfg = SdramConfig {
            control: SdControl {
                columns: 7,
                ..CFG.control
            },
            ..CFG
        };
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut delay = Delays::default();
            let mut log = new_log();
            bring_up(&mut bus, &cfg, &CLOCKS, &mut delay, &mut log)
        }));
        assert!(r.is_err());
        assert!(bus.log().is_empty());
    }

    #[test]
    fn refresh_write_keeps_other_fields() {
        let mut bus = SimBus::reset();
        // REIE survives; a stale count does not.
        bus.poke(fmc::SDRTR, (1 << 14) | (0x710 << 1));
        run(&mut bus);
        assert_eq!(bus.peek(fmc::SDRTR), (1 << 14) | (956 << 1));
    }
}
