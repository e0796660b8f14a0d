//! TIM14 update interrupt driving the 10 ms system tick.

use embassy_stm32::pac;
use embassy_stm32::pac::interrupt;
use sleeptimer_core::tick::{SystemTick, TickSource};

/// Counter reload: 625 timer clocks of 62.5 kHz per tick.
const TICK_RELOAD: u16 = 624;

static SYSTEM_TICK: SystemTick = SystemTick::new();

#[interrupt]
fn TIM14() {
    pac::TIM14.sr().modify(|w| w.set_uif(false));
    SYSTEM_TICK.on_interrupt(super::sample_keys());
}

/// Enables TIM14 at the full-clock prescaler and unmasks its interrupt.
pub fn start() {
    let timer = pac::TIM14;

    pac::RCC.apbenr2().modify(|w| w.set_tim14en(true));
    timer.psc().write_value(super::clock::FULL_RATE_PRESCALER);
    timer.arr().write(|w| w.set_arr(TICK_RELOAD));
    // Latch PSC and ARR, then drop the flag raised by the forced update.
    timer.egr().write(|w| w.set_ug(true));
    timer.sr().modify(|w| w.set_uif(false));
    timer.dier().modify(|w| w.set_uie(true));
    timer.cr1().modify(|w| w.set_cen(true));

    unsafe {
        cortex_m::peripheral::NVIC::unmask(embassy_stm32::interrupt::TIM14);
    }
}

/// Writes the preloaded prescaler; applies from the next update event.
pub(super) fn set_prescaler(prescaler: u16) {
    pac::TIM14.psc().write_value(prescaler);
}

/// Main-loop handle on the interrupt-fed tick.
pub struct FirmwareTicks {
    tick: &'static SystemTick,
}

impl FirmwareTicks {
    pub const fn new() -> Self {
        Self { tick: &SYSTEM_TICK }
    }
}

impl TickSource for FirmwareTicks {
    fn take_tick(&self) -> bool {
        self.tick.take_tick()
    }

    fn take_pressed(&self, mask: u8) -> u8 {
        self.tick.take_pressed(mask)
    }

    fn idle(&self) {
        // WFI wakes on a pending interrupt even with PRIMASK set.
        cortex_m::interrupt::disable();
        if !self.tick.is_pending() {
            cortex_m::asm::wfi();
        }
        unsafe {
            cortex_m::interrupt::enable();
        }
    }
}
