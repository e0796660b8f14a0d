//! Minute countdown that wakes the attached computer.
//!
//! The clock divides the 10 ms tick into minutes and decrements the armed
//! sleep time once per minute. Zero means "no timer armed": the countdown is
//! left alone at zero and only the transition from one to zero raises the
//! alarm.

use core::fmt;

use crate::config::TICKS_PER_MINUTE;

/// LED presentation selected for the off state (and the on indication).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalMode {
    /// Green lit steadily.
    #[default]
    GreenSteady,
    /// Red pulsing; also signals that the fallback wake time was forced.
    RedBlink,
    /// Red lit steadily; shown while the load is powered.
    RedSteady,
}

impl SignalMode {
    /// Maps the captured mode bit of a `SLEEPTIME` command.
    #[must_use]
    pub const fn from_flag(flag: bool) -> Self {
        if flag {
            SignalMode::RedBlink
        } else {
            SignalMode::GreenSteady
        }
    }
}

impl fmt::Display for SignalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalMode::GreenSteady => f.write_str("green"),
            SignalMode::RedBlink => f.write_str("red-blink"),
            SignalMode::RedSteady => f.write_str("red"),
        }
    }
}

/// Snapshot of the armed sleep time and the chosen off indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CountdownState {
    pub sleep_minutes: u16,
    pub signal_mode: SignalMode,
}

impl CountdownState {
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.sleep_minutes != 0
    }
}

/// Tick-driven minute counter plus the user-settable sleep countdown.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountdownClock {
    state: CountdownState,
    ticks_per_minute: u16,
    ticks_to_minute: u16,
}

impl CountdownClock {
    /// Creates a disarmed clock using the standard 100 Hz tick.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_ticks_per_minute(TICKS_PER_MINUTE)
    }

    /// Creates a disarmed clock for a custom tick rate.
    #[must_use]
    pub const fn with_ticks_per_minute(ticks_per_minute: u16) -> Self {
        let ticks_per_minute = if ticks_per_minute == 0 {
            1
        } else {
            ticks_per_minute
        };
        Self {
            state: CountdownState {
                sleep_minutes: 0,
                signal_mode: SignalMode::GreenSteady,
            },
            ticks_per_minute,
            ticks_to_minute: ticks_per_minute,
        }
    }

    /// Arms the countdown and restarts the minute phase.
    ///
    /// Restarting the phase makes an N-minute countdown last exactly N whole
    /// minutes of ticks. Arming with zero minutes disarms but still records
    /// the mode.
    pub fn arm(&mut self, minutes: u16, mode: SignalMode) {
        self.state = CountdownState {
            sleep_minutes: minutes,
            signal_mode: mode,
        };
        self.ticks_to_minute = self.ticks_per_minute;
    }

    /// Clears the armed sleep time; the signal mode is kept.
    pub fn disarm(&mut self) {
        self.state.sleep_minutes = 0;
    }

    /// Advances the clock by one tick, returning `true` on the alarm tick.
    pub fn on_tick(&mut self) -> bool {
        self.ticks_to_minute -= 1;
        if self.ticks_to_minute != 0 {
            return false;
        }
        self.ticks_to_minute = self.ticks_per_minute;

        if self.state.sleep_minutes == 0 {
            return false;
        }
        self.state.sleep_minutes -= 1;
        self.state.sleep_minutes == 0
    }

    #[must_use]
    pub const fn state(&self) -> CountdownState {
        self.state
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    #[must_use]
    pub const fn sleep_minutes(&self) -> u16 {
        self.state.sleep_minutes
    }

    #[must_use]
    pub const fn signal_mode(&self) -> SignalMode {
        self.state.signal_mode
    }

    /// Ticks left until the next minute boundary.
    #[must_use]
    pub const fn ticks_to_minute(&self) -> u16 {
        self.ticks_to_minute
    }
}

impl Default for CountdownClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flag_selects_green_or_blink() {
        assert_eq!(SignalMode::from_flag(false), SignalMode::GreenSteady);
        assert_eq!(SignalMode::from_flag(true), SignalMode::RedBlink);
    }

    #[test]
    fn disarmed_clock_never_alarms() {
        let mut clock = CountdownClock::with_ticks_per_minute(3);
        for _ in 0..30 {
            assert!(!clock.on_tick());
        }
        assert_eq!(clock.sleep_minutes(), 0);
    }

    #[test]
    fn alarm_fires_on_the_last_tick_of_the_last_minute() {
        let mut clock = CountdownClock::with_ticks_per_minute(3);
        clock.arm(2, SignalMode::RedBlink);

        let alarms: usize = (0..5).filter(|_| clock.on_tick()).count();
        assert_eq!(alarms, 0);
        assert_eq!(clock.sleep_minutes(), 1);

        assert!(clock.on_tick());
        assert!(!clock.is_armed());
        assert_eq!(clock.signal_mode(), SignalMode::RedBlink);
    }

    #[test]
    fn arming_restarts_the_minute_phase() {
        let mut clock = CountdownClock::with_ticks_per_minute(10);
        for _ in 0..7 {
            clock.on_tick();
        }
        clock.arm(1, SignalMode::GreenSteady);
        assert_eq!(clock.ticks_to_minute(), 10);

        let fired_at = (1..=10).find(|_| clock.on_tick());
        assert_eq!(fired_at, Some(10));
    }

    #[test]
    fn arm_zero_records_mode_without_arming() {
        let mut clock = CountdownClock::new();
        clock.arm(0, SignalMode::RedBlink);
        assert!(!clock.is_armed());
        assert_eq!(clock.signal_mode(), SignalMode::RedBlink);
    }

    #[test]
    fn disarm_keeps_signal_mode() {
        let mut clock = CountdownClock::new();
        clock.arm(45, SignalMode::RedBlink);
        clock.disarm();
        assert_eq!(
            clock.state(),
            CountdownState {
                sleep_minutes: 0,
                signal_mode: SignalMode::RedBlink,
            }
        );
    }
}
