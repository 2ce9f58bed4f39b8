// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clock tree bring-up.
//!
//! Out of reset the part runs from the 64 MHz HSI at voltage scale VOS3, with
//! the flash controller already configured for enough wait states to cope.
//! [`sequence`] walks the tree from there to PLL1 fed from the external
//! crystal, in an order where no bus is ever overclocked along the way:
//!
//! 1. baseline: back on HSI, every PLL off, configuration cleared;
//! 2. peripheral clocks on, core voltage raised;
//! 3. HSE cycled off and on, PLL1 reprogrammed and locked;
//! 4. flash wait states raised, AHB prescaler set;
//! 5. and only then the system clock switched to PLL1.
//!
//! Every readiness wait goes through [`poll`] with the caller's [`Budget`].
//! The board passes [`Budget::Unbounded`], which makes a dead oscillator a
//! boot hang; tests pass a finite budget and get [`ClockError`] back instead.

use crate::bus::{Barrier, Reg, RegisterBus};
use crate::poll::{poll, Budget, Level, Poll};
use crate::regs::{flash, pwr, rcc};
use crate::trace::{BootLog, Trace};
use rcc::Cr;
use ringbuf::ringbuf_entry;

/// Divider applied to sys_ck to produce the AHB clock. The discriminant is
/// the D1CFGR.HPRE encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AhbDiv {
    Div1 = 0b0000,
    Div2 = 0b1000,
    Div4 = 0b1001,
    Div8 = 0b1010,
    Div16 = 0b1011,
    Div64 = 0b1100,
    Div128 = 0b1101,
    Div256 = 0b1110,
    Div512 = 0b1111,
}

impl AhbDiv {
    pub const fn divisor(self) -> u32 {
        match self {
            AhbDiv::Div1 => 1,
            AhbDiv::Div2 => 2,
            AhbDiv::Div4 => 4,
            AhbDiv::Div8 => 8,
            AhbDiv::Div16 => 16,
            AhbDiv::Div64 => 64,
            AhbDiv::Div128 => 128,
            AhbDiv::Div256 => 256,
            AhbDiv::Div512 => 512,
        }
    }
}

/// PLL1 reference input range (PLLCFGR.PLL1RGE), which must bracket
/// HSE / DIVM.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PllRange {
    /// 1-2 MHz
    Range1 = 0b00,
    /// 2-4 MHz
    Range2 = 0b01,
    /// 4-8 MHz
    Range4 = 0b10,
    /// 8-16 MHz
    Range8 = 0b11,
}

/// Kernel clock for the FMC (D1CCIPR.FMCSEL).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FmcClock {
    Hclk = 0b00,
    Pll1Q = 0b01,
    Pll2R = 0b10,
    PerCk = 0b11,
}

/// Core voltage scale (PWR.D3CR.VOS). Higher scales allow faster clocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VoltageScale {
    Vos3 = 0b01,
    Vos2 = 0b10,
    Vos1 = 0b11,
}

/// The single operating point the board boots into. Divider fields hold the
/// actual ratio; the `- 1` register encoding is applied when programming.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    pub hse_hz: u32,
    pub vos: VoltageScale,
    pub divm: u8,
    pub pll_range: PllRange,
    /// Selects the medium-range VCO (150-420 MHz) instead of the wide one
    /// (192-836 MHz).
    pub medium_vco: bool,
    pub divn: u16,
    pub divp: u8,
    pub divq: u8,
    pub divr: u8,
    pub ahb_div: AhbDiv,
    pub flash_latency: u8,
    pub flash_write_delay: u8,
    pub fmc_clock: FmcClock,
}

impl ClockConfig {
    /// 25 MHz crystal / 4 = 6.25 MHz reference, x80 = 500 MHz VCO, with all
    /// three PLL1 taps at /2 (250 MHz). The CPU runs at 250 MHz and the AHB at
    /// 125 MHz; the FMC is clocked from pll1_q.
    ///
    /// Flash at 125 MHz AXI and VOS1 needs 2 wait states and programming
    /// delay 2 (RM0433 Table 17).
    pub const ATK_H743: Self = Self {
        hse_hz: 25_000_000,
        vos: VoltageScale::Vos1,
        divm: 4,
        pll_range: PllRange::Range4,
        medium_vco: false,
        divn: 80,
        divp: 2,
        divq: 2,
        divr: 2,
        ahb_div: AhbDiv::Div2,
        flash_latency: 2,
        flash_write_delay: 2,
        fmc_clock: FmcClock::Pll1Q,
    };

    /// Panics (at compile time, when used in a const) if the configuration
    /// can't be encoded or puts the PLL outside its operating ranges.
    pub const fn check(&self) {
        assert!(self.divm >= 1 && self.divm <= 63);
        assert!(self.divn >= 4 && self.divn <= 512);
        assert!(self.divp >= 2 && self.divp <= 128 && self.divp % 2 == 0);
        assert!(self.divq >= 1 && self.divq <= 128);
        assert!(self.divr >= 1 && self.divr <= 128);
        assert!(self.flash_latency <= 7);
        assert!(self.flash_write_delay <= 3);

        let reference = self.hse_hz / self.divm as u32;
        let (lo, hi) = match self.pll_range {
            PllRange::Range1 => (1_000_000, 2_000_000),
            PllRange::Range2 => (2_000_000, 4_000_000),
            PllRange::Range4 => (4_000_000, 8_000_000),
            PllRange::Range8 => (8_000_000, 16_000_000),
        };
        assert!(reference >= lo && reference <= hi);

        let vco = self.vco_hz();
        if self.medium_vco {
            assert!(vco >= 150_000_000 && vco <= 420_000_000);
        } else {
            assert!(vco >= 192_000_000 && vco <= 836_000_000);
        }
    }

    pub const fn vco_hz(&self) -> u32 {
        self.hse_hz / self.divm as u32 * self.divn as u32
    }

    /// The frequencies this configuration produces once [`sequence`] has
    /// finished.
    pub const fn clocks(&self) -> Clocks {
        let vco_hz = self.vco_hz();
        let sys_hz = vco_hz / self.divp as u32;
        let pll1_q_hz = vco_hz / self.divq as u32;
        let pll1_r_hz = vco_hz / self.divr as u32;
        let hclk_hz = sys_hz / self.ahb_div.divisor();
        let fmc_ker_hz = match self.fmc_clock {
            FmcClock::Hclk => hclk_hz,
            FmcClock::Pll1Q => pll1_q_hz,
            // PLL2 stays off and per_ck defaults to HSI.
            FmcClock::Pll2R => 0,
            FmcClock::PerCk => 64_000_000,
        };
        Clocks {
            hse_hz: self.hse_hz,
            vco_hz,
            sys_hz,
            pll1_q_hz,
            pll1_r_hz,
            hclk_hz,
            // APB prescalers are left at /1 by the baseline reset.
            pclk_hz: hclk_hz,
            fmc_ker_hz,
        }
    }
}

const _: () = ClockConfig::ATK_H743.check();

/// Frozen clock frequencies, in Hz. Only produced by a completed
/// [`sequence`] (or [`ClockConfig::clocks`] for planning).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Clocks {
    pub hse_hz: u32,
    pub vco_hz: u32,
    /// sys_ck, from pll1_p. This is also the CPU clock.
    pub sys_hz: u32,
    pub pll1_q_hz: u32,
    pub pll1_r_hz: u32,
    pub hclk_hz: u32,
    /// All four APB domains.
    pub pclk_hz: u32,
    pub fmc_ker_hz: u32,
}

/// The hardware conditions the sequencer waits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    SourceIsHsi,
    PllOff(u8),
    VoltageReady,
    HseOff,
    HseReady,
    PllLocked,
    FlashLatency,
    SourceIsPll,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockError {
    /// A bounded poll ran out before this condition was observed.
    Stuck(Flag),
}

const PLL_ON_RDY: [(u8, Cr, Cr); 3] = [
    (1, Cr::PLL1ON, Cr::PLL1RDY),
    (2, Cr::PLL2ON, Cr::PLL2RDY),
    (3, Cr::PLL3ON, Cr::PLL3RDY),
];

fn wait(
    bus: &mut impl RegisterBus,
    log: &mut BootLog,
    flag: Flag,
    reg: Reg,
    mask: u32,
    level: Level,
    budget: Budget,
) -> Result<(), ClockError> {
    match poll(bus, reg, mask, level, budget) {
        Poll::Ready { spins } => {
            ringbuf_entry!(log, Trace::Ready { flag, spins });
            Ok(())
        }
        Poll::Exhausted => {
            ringbuf_entry!(log, Trace::Stuck(flag));
            Err(ClockError::Stuck(flag))
        }
    }
}

/// Brings the clock tree to `config`, leaving sys_ck on PLL1.
///
/// Running it again from the state it leaves behind produces the same final
/// register values.
///
/// Panics, before touching any register, if `config` fails
/// [`ClockConfig::check`].
pub fn sequence(
    bus: &mut impl RegisterBus,
    config: &ClockConfig,
    budget: Budget,
    log: &mut BootLog,
) -> Result<Clocks, ClockError> {
    config.check();

    // HSI is our fallback and is running already out of reset; it doesn't
    // need a readiness wait.
    bus.set_bits(rcc::CR, Cr::HSION.bits());
    ringbuf_entry!(log, Trace::HsiOn);

    baseline(bus, budget, log)?;

    // Every peripheral clock on. This is a single-purpose boot image, not a
    // power-managed runtime.
    for reg in rcc::CLOCK_ENABLES {
        bus.write(reg, 0xFFFF_FFFF);
    }
    for reg in rcc::KERNEL_CLOCK_SELECT {
        bus.write(reg, 0);
    }
    ringbuf_entry!(log, Trace::PeripheralClocksOn);

    // Raise the core voltage before anything gets faster. The supply
    // configuration update bit is cleared to lock in the LDO settings.
    bus.write_field(
        pwr::D3CR,
        pwr::D3CR_VOS_MASK,
        (config.vos as u32) << pwr::D3CR_VOS_SHIFT,
    );
    bus.clear_bits(pwr::CR3, pwr::CR3_SCUEN);
    wait(
        bus,
        log,
        Flag::VoltageReady,
        pwr::D3CR,
        pwr::D3CR_VOSRDY,
        Level::Set,
        budget,
    )?;

    // Drive the HSE to a known-off state, then bring it up as a crystal
    // oscillator (not bypassed).
    bus.clear_bits(rcc::CR, Cr::HSEON.bits());
    wait(
        bus,
        log,
        Flag::HseOff,
        rcc::CR,
        Cr::HSERDY.bits(),
        Level::Clear,
        budget,
    )?;
    bus.clear_bits(rcc::CR, Cr::HSEBYP.bits());
    bus.set_bits(rcc::CR, Cr::HSEON.bits());
    wait(
        bus,
        log,
        Flag::HseReady,
        rcc::CR,
        Cr::HSERDY.bits(),
        Level::Set,
        budget,
    )?;

    // PLL1 must be off, and seen to be off, before its dividers change.
    bus.clear_bits(rcc::CR, Cr::PLL1ON.bits());
    wait(
        bus,
        log,
        Flag::PllOff(1),
        rcc::CR,
        Cr::PLL1RDY.bits(),
        Level::Clear,
        budget,
    )?;

    bus.write_field(
        rcc::PLLCKSELR,
        0x3F << rcc::PLLCKSELR_DIVM1_SHIFT,
        (config.divm as u32) << rcc::PLLCKSELR_DIVM1_SHIFT,
    );
    bus.write(
        rcc::PLL1DIVR,
        ((config.divr as u32 - 1) << rcc::PLL1DIVR_DIVR_SHIFT)
            | ((config.divq as u32 - 1) << rcc::PLL1DIVR_DIVQ_SHIFT)
            | ((config.divp as u32 - 1) << rcc::PLL1DIVR_DIVP_SHIFT)
            | ((config.divn as u32 - 1) << rcc::PLL1DIVR_DIVN_SHIFT),
    );
    ringbuf_entry!(
        log,
        Trace::PllProgrammed {
            divm: config.divm,
            divn: config.divn,
        }
    );

    // Reference from HSE, input range and VCO selection, then all three
    // outputs enabled. Only after every field is written does the PLL come
    // back on.
    bus.write_field(rcc::PLLCKSELR, 0b11, rcc::PLLSRC_HSE);
    let vcosel = if config.medium_vco {
        rcc::PLLCFGR_PLL1VCOSEL
    } else {
        0
    };
    bus.set_bits(
        rcc::PLLCFGR,
        ((config.pll_range as u32) << rcc::PLLCFGR_PLL1RGE_SHIFT) | vcosel,
    );
    bus.set_bits(
        rcc::PLLCFGR,
        rcc::PLLCFGR_DIVP1EN | rcc::PLLCFGR_DIVQ1EN | rcc::PLLCFGR_DIVR1EN,
    );
    bus.set_bits(rcc::CR, Cr::PLL1ON.bits());
    wait(
        bus,
        log,
        Flag::PllLocked,
        rcc::CR,
        Cr::PLL1RDY.bits(),
        Level::Set,
        budget,
    )?;

    // Flash wait states go up before the clock does. Read back until the
    // controller reports the new setting.
    let acr = (config.flash_latency as u32)
        | ((config.flash_write_delay as u32) << flash::ACR_WRHIGHFREQ_SHIFT);
    let acr_mask = flash::ACR_LATENCY_MASK | flash::ACR_WRHIGHFREQ_MASK;
    bus.write_field(flash::ACR, acr_mask, acr);
    wait(
        bus,
        log,
        Flag::FlashLatency,
        flash::ACR,
        acr_mask,
        Level::Equals(acr),
        budget,
    )?;
    ringbuf_entry!(
        log,
        Trace::FlashLatency {
            latency: config.flash_latency,
            write_delay: config.flash_write_delay,
        }
    );

    bus.write_field(
        rcc::D1CFGR,
        0b1111 << rcc::D1CFGR_HPRE_SHIFT,
        (config.ahb_div as u32) << rcc::D1CFGR_HPRE_SHIFT,
    );
    ringbuf_entry!(log, Trace::AhbPrescaler(config.ahb_div as u8));

    // The flash and prescaler writes must land before the switch.
    bus.barrier(Barrier::Dmb);

    bus.write_field(rcc::CFGR, rcc::CFGR_SW_MASK, rcc::SW_PLL1);
    wait(
        bus,
        log,
        Flag::SourceIsPll,
        rcc::CFGR,
        rcc::CFGR_SWS_MASK,
        Level::Equals(rcc::SW_PLL1 << rcc::CFGR_SWS_SHIFT),
        budget,
    )?;

    // Kernel clock for the memory controller, used by the next stage.
    bus.write_field(
        rcc::D1CCIPR,
        0b11 << rcc::D1CCIPR_FMCSEL_SHIFT,
        (config.fmc_clock as u32) << rcc::D1CCIPR_FMCSEL_SHIFT,
    );
    ringbuf_entry!(log, Trace::FmcClockSelected);

    Ok(config.clocks())
}

/// Puts the tree in a known state regardless of what ran before us: sys_ck
/// back on HSI, every PLL stopped, and the prescaler and PLL configuration
/// registers zeroed. On a cold boot this is all already true; on a warm
/// restart it makes the PLL writes that follow legal.
fn baseline(
    bus: &mut impl RegisterBus,
    budget: Budget,
    log: &mut BootLog,
) -> Result<(), ClockError> {
    bus.write(rcc::CFGR, rcc::SW_HSI);
    wait(
        bus,
        log,
        Flag::SourceIsHsi,
        rcc::CFGR,
        rcc::CFGR_SWS_MASK,
        Level::Equals(rcc::SW_HSI << rcc::CFGR_SWS_SHIFT),
        budget,
    )?;

    for (n, on, rdy) in PLL_ON_RDY {
        bus.clear_bits(rcc::CR, on.bits());
        wait(bus, log, Flag::PllOff(n), rcc::CR, rdy.bits(), Level::Clear, budget)?;
    }

    bus.write(rcc::D1CFGR, 0);
    bus.write(rcc::D2CFGR, 0);
    bus.write(rcc::D3CFGR, 0);
    for reg in rcc::PLL_CONFIG {
        bus.write(reg, 0);
    }
    ringbuf_entry!(log, Trace::Baseline);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Access, SimBus};
    use crate::trace::new_log;

    const CFG: ClockConfig = ClockConfig::ATK_H743;
    const BOUNDED: Budget = Budget::Spins(1000);

    fn run(bus: &mut SimBus) -> Result<Clocks, ClockError> {
        let mut log = new_log();
        sequence(bus, &CFG, BOUNDED, &mut log)
    }

    #[test]
    fn target_frequencies() {
        let c = CFG.clocks();
        assert_eq!(c.vco_hz, 500_000_000);
        assert_eq!(c.sys_hz, 250_000_000);
        assert_eq!(c.pll1_q_hz, 250_000_000);
        assert_eq!(c.pll1_r_hz, 250_000_000);
        assert_eq!(c.hclk_hz, 125_000_000);
        assert_eq!(c.pclk_hz, 125_000_000);
        assert_eq!(c.fmc_ker_hz, 250_000_000);
    }

    #[test]
    fn cold_boot_lands_on_pll1() {
        let mut bus = SimBus::reset();
        let clocks = run(&mut bus).unwrap();
        assert_eq!(clocks, CFG.clocks());

        let cr = Cr::from_bits_truncate(bus.peek(rcc::CR));
        assert!(cr.contains(Cr::HSION | Cr::HSEON | Cr::HSERDY));
        assert!(cr.contains(Cr::PLL1ON | Cr::PLL1RDY));
        assert!(!cr.contains(Cr::HSEBYP));

        assert_eq!(bus.peek(rcc::CFGR), 0b011_011);
        assert_eq!(bus.peek(rcc::PLLCKSELR), (4 << 4) | 0b10);
        assert_eq!(
            bus.peek(rcc::PLL1DIVR),
            (1 << 24) | (1 << 16) | (1 << 9) | 79
        );
        assert_eq!(bus.peek(rcc::PLLCFGR), (0b10 << 2) | (0b111 << 16));
        assert_eq!(bus.peek(rcc::D1CFGR), 0b1000);
        assert_eq!(bus.peek(rcc::D1CCIPR), 0b01);
        assert_eq!(bus.peek(pwr::D3CR) & pwr::D3CR_VOS_MASK, 0b11 << 14);
        assert_eq!(bus.peek(pwr::CR3) & pwr::CR3_SCUEN, 0);
        for reg in rcc::CLOCK_ENABLES {
            assert_eq!(bus.peek(reg), 0xFFFF_FFFF);
        }
    }

    #[test]
    fn flash_keeps_unrelated_acr_bits() {
        let mut bus = SimBus::reset();
        bus.poke(flash::ACR, 0x0000_0137);
        run(&mut bus).unwrap();
        assert_eq!(bus.peek(flash::ACR), 0x0000_0122);
    }

    /// Every write to a PLL1 divider register must come after PLL1ON was
    /// cleared and PLL1RDY was read back as clear, with no re-enable in
    /// between.
    fn assert_pll_off_before_divider_writes(log: &[Access]) {
        let pll1on = Cr::PLL1ON.bits();
        let pll1rdy = Cr::PLL1RDY.bits();
        let dividers = [rcc::PLLCKSELR, rcc::PLL1DIVR, rcc::PLL1FRACR];

        let mut checked = 0;
        for (i, a) in log.iter().enumerate() {
            let Access::Write(reg, _) = *a else { continue };
            if !dividers.contains(&reg) {
                continue;
            }
            let last_cr_write = log[..i]
                .iter()
                .rposition(|a| matches!(a, Access::Write(r, _) if *r == rcc::CR))
                .expect("CR written before any divider");
            let Access::Write(_, cr) = log[last_cr_write] else {
                unreachable!()
            };
            assert_eq!(cr & pll1on, 0, "PLL1ON set at divider write {i}");
            let seen_off = log[last_cr_write..i].iter().any(|a| {
                matches!(a, Access::Read(r, v) if *r == rcc::CR && v & pll1rdy == 0)
            });
            assert!(seen_off, "PLL1RDY not observed clear before write {i}");
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn pll_off_before_dividers_cold() {
        let mut bus = SimBus::reset();
        run(&mut bus).unwrap();
        assert_pll_off_before_divider_writes(bus.log());
    }

    #[test]
    fn pll_off_before_dividers_warm() {
        let mut bus = SimBus::reset();
        run(&mut bus).unwrap();
        bus.clear_log();
        // Second pass starts with PLL1 locked and the dividers populated.
        run(&mut bus).unwrap();
        assert_pll_off_before_divider_writes(bus.log());
    }

    #[test]
    fn flash_before_switch_and_lock_before_switch() {
        let mut bus = SimBus::reset();
        run(&mut bus).unwrap();
        let log = bus.log();

        let switch = log
            .iter()
            .position(|a| {
                matches!(a, Access::Write(r, v) if *r == rcc::CFGR && v & 0b111 == rcc::SW_PLL1)
            })
            .unwrap();
        let acr = log
            .iter()
            .rposition(|a| matches!(a, Access::Write(r, _) if *r == flash::ACR))
            .unwrap();
        let hpre = log
            .iter()
            .rposition(|a| matches!(a, Access::Write(r, _) if *r == rcc::D1CFGR))
            .unwrap();
        let locked = log
            .iter()
            .rposition(|a| {
                matches!(a, Access::Read(r, v) if *r == rcc::CR && v & Cr::PLL1RDY.bits() != 0)
            })
            .unwrap();
        assert!(acr < hpre);
        assert!(hpre < switch);
        assert!(locked < acr);
        assert!(log[hpre..switch]
            .iter()
            .any(|a| *a == Access::Barrier(Barrier::Dmb)));
    }

    #[test]
    fn same_start_same_finish() {
        let mut a = SimBus::reset();
        let mut b = SimBus::reset();
        run(&mut a).unwrap();
        run(&mut b).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());

        // And running again from where the first pass left off changes
        // nothing.
        let first = a.snapshot();
        run(&mut a).unwrap();
        assert_eq!(a.snapshot(), first);
    }

    #[test]
    fn dead_crystal_is_reported_with_a_budget() {
        let mut bus = SimBus::reset();
        bus.stick(rcc::CR, Cr::HSERDY.bits(), false);
        let mut log = new_log();
        let r = sequence(&mut bus, &CFG, BOUNDED, &mut log);
        assert_eq!(r, Err(ClockError::Stuck(Flag::HseReady)));
        assert_eq!(
            log.latest().map(|e| e.payload),
            Some(Trace::Stuck(Flag::HseReady))
        );
        // Nothing past the crystal was touched.
        assert!(bus.writes_to(rcc::PLL1DIVR).all(|v| v == 0));
        assert_ne!(bus.peek(rcc::CFGR) & 0b111, rcc::SW_PLL1);
    }

    #[test]
    fn pll_that_never_locks_keeps_us_on_hsi() {
        let mut bus = SimBus::reset();
        bus.stick(rcc::CR, Cr::PLL1RDY.bits(), false);
        assert_eq!(run(&mut bus), Err(ClockError::Stuck(Flag::PllLocked)));
        assert!(bus.writes_to(rcc::CFGR).all(|v| v & 0b111 != rcc::SW_PLL1));
        assert_eq!(bus.writes_to(flash::ACR).count(), 0);
    }

    #[test]
    fn pll_that_never_stops_is_not_reprogrammed() {
        let mut bus = SimBus::reset();
        bus.stick(rcc::CR, Cr::PLL1RDY.bits(), true);
        assert_eq!(run(&mut bus), Err(ClockError::Stuck(Flag::PllOff(1))));
        assert_eq!(bus.writes_to(rcc::PLL1DIVR).count(), 0);
        assert_eq!(bus.writes_to(rcc::PLLCKSELR).count(), 0);
    }

    #[test]
    fn unencodable_config_touches_nothing() {
        let mut bus = SimBus::reset();
        let cfg = ClockConfig { divr: 0, ..CFG };
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut log = new_log();
            sequence(&mut bus, &cfg, BOUNDED, &mut log)
        }));
        assert!(r.is_err());
        assert!(bus.log().is_empty());
    }

    #[test]
    fn trace_records_each_wait_once() {
        let mut bus = SimBus::reset();
        let mut log = new_log();
        sequence(&mut bus, &CFG, Budget::Unbounded, &mut log).unwrap();
        let flags: Vec<Flag> = log
            .iter()
            .filter_map(|e| match e.payload {
                Trace::Ready { flag, .. } => Some(flag),
                _ => None,
            })
            .collect();
        assert_eq!(
            flags,
            [
                Flag::SourceIsHsi,
                Flag::PllOff(1),
                Flag::PllOff(2),
                Flag::PllOff(3),
                Flag::VoltageReady,
                Flag::HseOff,
                Flag::HseReady,
                Flag::PllOff(1),
                Flag::PllLocked,
                Flag::FlashLatency,
                Flag::SourceIsPll,
            ]
        );
    }

    #[test]
    fn memory_controller_left_alone() {
        let mut bus = SimBus::reset();
        run(&mut bus).unwrap();
        let fmc = crate::regs::fmc::BASE..crate::regs::fmc::BASE + 0x1000;
        assert!(!bus.log().iter().any(|a| {
            matches!(a, Access::Write(r, _) if fmc.contains(&r.addr()))
        }));
        assert_eq!(bus.peek(rcc::AHB3RSTR), 0);
    }
}
