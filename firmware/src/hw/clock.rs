//! Core clock switching.
//!
//! The divided rate slows HCLK (and with it PCLK and TIM14) by 256. TIM14's
//! prescaler is rewritten in the same critical section so the tick keeps a
//! 10 ms period. The prescaler is preloaded and applies from the next update
//! event, so at most one tick is stretched or shortened by the switch.
//!
//! USART1 keeps the divisor computed for the full clock and is unusable
//! while divided. The computer is unpowered in that state.

use embassy_stm32::pac;
use embassy_stm32::pac::rcc::vals::Hpre;
use sleeptimer_core::power::{ClockControl, ClockRate};

use super::tick;

/// Timer prescaler (PSC value) giving 62.5 kHz from the undivided 16 MHz HSI.
pub(super) const FULL_RATE_PRESCALER: u16 = 255;

/// HCLK is already 62.5 kHz once divided, so TIM14 counts it directly.
const DIVIDED_RATE_PRESCALER: u16 = 0;

pub struct CoreClock {
    _private: (),
}

impl CoreClock {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl ClockControl for CoreClock {
    fn set_rate(&mut self, rate: ClockRate) {
        let (hpre, prescaler) = match rate {
            ClockRate::Full => (Hpre::DIV1, FULL_RATE_PRESCALER),
            ClockRate::Divided => (Hpre::DIV256, DIVIDED_RATE_PRESCALER),
        };

        critical_section::with(|_| {
            pac::RCC.cfgr().modify(|w| w.set_hpre(hpre));
            tick::set_prescaler(prescaler);
        });
        defmt::debug!("clock: {}", rate);
    }
}
