//! Power state controller and the hardware seams it drives.
//!
//! The controller owns the ON/OFF state of the attached computer. While ON
//! the MCU runs at full clock, the relay is energised and the red LED is lit.
//! While OFF the clock is divided down, the relay is released and the LED
//! shows the mode chosen by the last `SLEEPTIME` command.
//!
//! The shutdown and power-off sequences contain fixed grace periods that
//! block the caller for their full length. Once started they always run to
//! completion.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use crate::config::{ControllerConfig, SESSION_RESET_BYTE, SHUTDOWN_LINE};
use crate::countdown::{CountdownClock, CountdownState, SignalMode};
use crate::indicator::{Indicator, IndicatorPins};
use crate::tick::TickSource;

/// MCU core clock selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockRate {
    /// Undivided clock; required for serial traffic.
    Full,
    /// Heavily divided clock used while the computer is off.
    Divided,
}

/// Switches the MCU clock between full and divided rate.
///
/// Implementations must retune the tick timer in the same step so the tick
/// period stays 10 ms in both modes.
pub trait ClockControl {
    fn set_rate(&mut self, rate: ClockRate);
}

/// Relay feeding the attached computer.
pub trait LoadSwitch {
    fn set_energized(&mut self, energized: bool);
}

/// Byte-level serial transport towards the attached computer.
pub trait SerialLink {
    /// Returns the next received byte without blocking.
    fn receive_byte(&mut self) -> Option<u8>;

    fn send_byte(&mut self, byte: u8);

    fn send_sequence(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.send_byte(byte);
        }
    }
}

/// Events gathered during one pass of the main loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Actions(u8);

impl Actions {
    pub const NONE: Self = Self(0);
    /// Debounced button press.
    pub const KEY_PRESS: Self = Self(1 << 0);
    /// Sleep countdown reached zero.
    pub const ALARM: Self = Self(1 << 1);
    /// Halt notice received on the serial line.
    pub const SWITCH_OFF: Self = Self(1 << 2);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for Actions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Actions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Whether the attached computer is powered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => f.write_str("on"),
            PowerState::Off => f.write_str("off"),
        }
    }
}

/// Why the computer was powered on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    Boot,
    Button,
    Alarm,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeReason::Boot => f.write_str("boot"),
            WakeReason::Button => f.write_str("button"),
            WakeReason::Alarm => f.write_str("alarm"),
        }
    }
}

/// Countdown in force when the computer was powered off.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerOff {
    pub countdown: CountdownState,
    /// No wake time was set, so the fallback countdown was forced.
    pub fallback_armed: bool,
}

/// State change performed by [`PowerController::dispatch`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    PoweredOn(WakeReason),
    PoweredOff(PowerOff),
}

/// Result of dispatching one loop pass worth of [`Actions`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dispatch {
    pub shutdown_requested: bool,
    pub transition: Option<Transition>,
}

/// Two-state controller for the attached computer.
pub struct PowerController<C, L, P> {
    clock: C,
    load: L,
    indicator: Indicator<P>,
    state: PowerState,
    config: ControllerConfig,
}

impl<C, L, P> PowerController<C, L, P>
where
    C: ClockControl,
    L: LoadSwitch,
    P: IndicatorPins,
{
    /// Creates a controller in the OFF state. Call [`Self::turn_on`] at boot
    /// to bring outputs in line with the freshly reset hardware.
    #[must_use]
    pub const fn new(clock: C, load: L, pins: P, config: ControllerConfig) -> Self {
        Self {
            clock,
            load,
            indicator: Indicator::new(pins),
            state: PowerState::Off,
            config,
        }
    }

    /// Powers the computer: full clock, countdown cleared, red LED, relay on.
    pub fn turn_on(&mut self, countdown: &mut CountdownClock) {
        self.clock.set_rate(ClockRate::Full);
        countdown.disarm();
        self.indicator.show(SignalMode::RedSteady);
        self.load.set_energized(true);
        self.state = PowerState::On;
    }

    /// Cuts power after the power-off grace period.
    ///
    /// If no wake time is armed the fallback countdown is forced together
    /// with the blinking indicator, so the computer always wakes eventually.
    pub fn turn_off<T>(&mut self, countdown: &mut CountdownClock, ticks: &T) -> PowerOff
    where
        T: TickSource + ?Sized,
    {
        ticks.wait_ticks(self.config.power_off_grace_ticks());

        let fallback_armed = !countdown.is_armed();
        if fallback_armed {
            countdown.arm(self.config.fallback_sleep_minutes(), SignalMode::RedBlink);
        }

        self.clock.set_rate(ClockRate::Divided);
        self.indicator.show(countdown.signal_mode());
        self.load.set_energized(false);
        self.state = PowerState::Off;

        PowerOff {
            countdown: countdown.state(),
            fallback_armed,
        }
    }

    /// Logs the computer in as the shutdown user.
    ///
    /// EOT forces a fresh login prompt; the grace period gives getty time to
    /// respawn before the login name is typed.
    pub fn request_shutdown<T, S>(&mut self, ticks: &T, serial: &mut S)
    where
        T: TickSource + ?Sized,
        S: SerialLink + ?Sized,
    {
        serial.send_byte(SESSION_RESET_BYTE);
        ticks.wait_ticks(self.config.shutdown_grace_ticks());
        serial.send_sequence(SHUTDOWN_LINE);
    }

    /// Reacts to the events of one loop pass.
    pub fn dispatch<T, S>(
        &mut self,
        actions: Actions,
        countdown: &mut CountdownClock,
        ticks: &T,
        serial: &mut S,
    ) -> Dispatch
    where
        T: TickSource + ?Sized,
        S: SerialLink + ?Sized,
    {
        let mut outcome = Dispatch::default();

        match self.state {
            PowerState::On => {
                if actions.contains(Actions::KEY_PRESS) {
                    self.request_shutdown(ticks, serial);
                    outcome.shutdown_requested = true;
                }
                if actions.contains(Actions::SWITCH_OFF) {
                    let off = self.turn_off(countdown, ticks);
                    outcome.transition = Some(Transition::PoweredOff(off));
                }
            }
            PowerState::Off => {
                if actions.intersects(Actions::KEY_PRESS | Actions::ALARM) {
                    let reason = if actions.contains(Actions::KEY_PRESS) {
                        WakeReason::Button
                    } else {
                        WakeReason::Alarm
                    };
                    self.turn_on(countdown);
                    outcome.transition = Some(Transition::PoweredOn(reason));
                }
            }
        }

        outcome
    }

    /// Per-tick housekeeping (LED blink phase).
    pub fn on_tick(&mut self) {
        self.indicator.on_tick();
    }

    #[must_use]
    pub const fn state(&self) -> PowerState {
        self.state
    }

    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self.state, PowerState::On)
    }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub const fn load(&self) -> &L {
        &self.load
    }

    #[must_use]
    pub const fn indicator(&self) -> &Indicator<P> {
        &self.indicator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimLeds, SimLoad, SimSerial, SimTicks};

    type TestController = PowerController<SimClock, SimLoad, SimLeds>;

    fn controller() -> TestController {
        PowerController::new(
            SimClock::new(),
            SimLoad::new(),
            SimLeds::new(),
            ControllerConfig::standard(),
        )
    }

    #[test]
    fn actions_combine_and_query() {
        let mut actions = Actions::NONE;
        assert!(actions.is_empty());
        actions |= Actions::ALARM;
        assert!(actions.contains(Actions::ALARM));
        assert!(!actions.contains(Actions::ALARM | Actions::KEY_PRESS));
        assert!(actions.intersects(Actions::ALARM | Actions::KEY_PRESS));
        assert_eq!(actions.bits(), 0b010);
    }

    #[test]
    fn turn_on_normalises_outputs() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        countdown.arm(10, SignalMode::GreenSteady);

        power.turn_on(&mut countdown);

        assert!(power.is_on());
        assert_eq!(power.clock().rate(), Some(ClockRate::Full));
        assert!(power.load().is_energized());
        assert_eq!(power.indicator().mode(), SignalMode::RedSteady);
        assert!(!countdown.is_armed());
    }

    #[test]
    fn turn_off_waits_then_applies_armed_mode() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        power.turn_on(&mut countdown);
        countdown.arm(30, SignalMode::GreenSteady);

        let off = power.turn_off(&mut countdown, &ticks);

        assert_eq!(ticks.elapsed(), 100);
        assert!(!off.fallback_armed);
        assert_eq!(off.countdown.sleep_minutes, 30);
        assert_eq!(power.state(), PowerState::Off);
        assert_eq!(power.clock().rate(), Some(ClockRate::Divided));
        assert!(!power.load().is_energized());
        assert_eq!(power.indicator().pins().levels(), (true, false));
    }

    #[test]
    fn turn_off_without_wake_time_forces_fallback() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        power.turn_on(&mut countdown);

        let off = power.turn_off(&mut countdown, &ticks);

        assert!(off.fallback_armed);
        assert_eq!(countdown.sleep_minutes(), 24 * 60);
        assert_eq!(power.indicator().mode(), SignalMode::RedBlink);
    }

    #[test]
    fn key_press_while_on_sends_shutdown_login() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();
        power.turn_on(&mut countdown);

        let outcome = power.dispatch(Actions::KEY_PRESS, &mut countdown, &ticks, &mut serial);

        assert!(outcome.shutdown_requested);
        assert_eq!(outcome.transition, None);
        assert_eq!(serial.transmitted(), b"\x04shutdown\r");
        assert_eq!(ticks.elapsed(), 300);
        assert!(power.is_on());
    }

    #[test]
    fn press_and_halt_in_one_pass_logs_in_before_cutting_power() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();
        power.turn_on(&mut countdown);
        assert_eq!(power.clock().switches(), 1);

        let outcome = power.dispatch(
            Actions::KEY_PRESS | Actions::SWITCH_OFF,
            &mut countdown,
            &ticks,
            &mut serial,
        );

        assert!(outcome.shutdown_requested);
        let Some(Transition::PoweredOff(off)) = outcome.transition else {
            panic!("expected power-off, got {:?}", outcome.transition);
        };
        assert!(off.fallback_armed);
        assert_eq!(serial.transmitted(), b"\x04shutdown\r");
        assert_eq!(ticks.elapsed(), 300 + 100);
        assert_eq!(power.clock().switches(), 2);
        assert!(!power.load().is_energized());
    }

    #[test]
    fn alarm_while_on_is_ignored() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();
        power.turn_on(&mut countdown);

        let outcome = power.dispatch(Actions::ALARM, &mut countdown, &ticks, &mut serial);

        assert_eq!(outcome, Dispatch::default());
        assert!(serial.transmitted().is_empty());
    }

    #[test]
    fn wake_reason_prefers_button() {
        let mut power = controller();
        let mut countdown = CountdownClock::new();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();

        let outcome = power.dispatch(
            Actions::ALARM | Actions::KEY_PRESS,
            &mut countdown,
            &ticks,
            &mut serial,
        );

        assert_eq!(
            outcome.transition,
            Some(Transition::PoweredOn(WakeReason::Button))
        );
        assert!(serial.transmitted().is_empty());
    }
}
