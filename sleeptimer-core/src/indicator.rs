//! Two-colour status LED driven from the system tick.
//!
//! The red LED blinks as a short pulse so that an idle, powered-off appliance
//! draws little current while still showing that it is alive. The pulse is
//! generated in software from the tick, which keeps working at the divided
//! clock because the tick period is held constant in both clock modes.

use crate::countdown::SignalMode;

/// Length of one blink cycle in ticks (about 2.3 s).
pub const BLINK_PERIOD_TICKS: u16 = 230;

/// Portion of the blink cycle the red LED is lit.
pub const BLINK_ON_TICKS: u16 = 32;

/// Raw access to the two LED outputs.
pub trait IndicatorPins {
    /// Drives both LEDs; `true` lights the LED.
    fn set_levels(&mut self, green: bool, red: bool);
}

/// LED state machine for the three [`SignalMode`]s.
pub struct Indicator<P> {
    pins: P,
    mode: SignalMode,
    phase: u16,
}

impl<P> Indicator<P>
where
    P: IndicatorPins,
{
    /// Wraps the pins; nothing is driven until [`Indicator::show`].
    #[must_use]
    pub const fn new(pins: P) -> Self {
        Self {
            pins,
            mode: SignalMode::GreenSteady,
            phase: 0,
        }
    }

    /// Switches to `mode` and applies it immediately.
    pub fn show(&mut self, mode: SignalMode) {
        self.mode = mode;
        self.phase = 0;
        self.apply();
    }

    /// Advances the blink phase by one tick.
    pub fn on_tick(&mut self) {
        if self.mode != SignalMode::RedBlink {
            return;
        }
        self.phase = (self.phase + 1) % BLINK_PERIOD_TICKS;
        if self.phase == 0 || self.phase == BLINK_ON_TICKS {
            self.apply();
        }
    }

    #[must_use]
    pub const fn mode(&self) -> SignalMode {
        self.mode
    }

    #[must_use]
    pub const fn pins(&self) -> &P {
        &self.pins
    }

    fn apply(&mut self) {
        match self.mode {
            SignalMode::GreenSteady => self.pins.set_levels(true, false),
            SignalMode::RedSteady => self.pins.set_levels(false, true),
            SignalMode::RedBlink => self.pins.set_levels(false, self.phase < BLINK_ON_TICKS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLeds;

    #[test]
    fn steady_modes_drive_one_led() {
        let mut indicator = Indicator::new(SimLeds::new());
        indicator.show(SignalMode::GreenSteady);
        assert_eq!(indicator.pins().levels(), (true, false));
        indicator.show(SignalMode::RedSteady);
        assert_eq!(indicator.pins().levels(), (false, true));

        for _ in 0..BLINK_PERIOD_TICKS {
            indicator.on_tick();
        }
        assert_eq!(indicator.pins().levels(), (false, true));
    }

    #[test]
    fn blink_pulses_red_once_per_period() {
        let mut indicator = Indicator::new(SimLeds::new());
        indicator.show(SignalMode::RedBlink);
        assert_eq!(indicator.pins().levels(), (false, true));

        let mut lit_ticks = 0;
        for _ in 0..BLINK_PERIOD_TICKS {
            indicator.on_tick();
            if indicator.pins().levels().1 {
                lit_ticks += 1;
            }
        }
        assert_eq!(lit_ticks, BLINK_ON_TICKS);
        assert_eq!(indicator.pins().levels(), (false, true));
    }
}
