//! Cooperative main loop tying the state machines together.
//!
//! [`SleepTimer`] is the explicit context that owns every piece of mutable
//! state outside the interrupt-shared [`SystemTick`](crate::tick::SystemTick).
//! One call to [`SleepTimer::poll`] is one pass of the main loop:
//!
//! 1. consume the tick flag; on a tick advance the countdown, the LED blink
//!    and collect a debounced button press,
//! 2. take at most one byte from the serial link and feed the matcher,
//! 3. hand the collected [`Actions`] to the power controller.
//!
//! Actions never outlive the pass that produced them.

use crate::countdown::CountdownClock;
use crate::indicator::IndicatorPins;
use crate::matcher::{Command, CommandMatcher};
use crate::power::{
    Actions, ClockControl, Dispatch, LoadSwitch, PowerController, SerialLink, Transition,
    WakeReason,
};
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};
use crate::tick::TickSource;

/// What happened during one pass of the main loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopPass {
    pub ticked: bool,
    pub actions: Actions,
    pub command: Option<Command>,
    pub dispatch: Dispatch,
}

/// The appliance: matcher, countdown, power controller and telemetry.
pub struct SleepTimer<C, L, P> {
    matcher: CommandMatcher,
    countdown: CountdownClock,
    power: PowerController<C, L, P>,
    telemetry: TelemetryRecorder,
    uptime_ticks: u64,
}

impl<C, L, P> SleepTimer<C, L, P>
where
    C: ClockControl,
    L: LoadSwitch,
    P: IndicatorPins,
{
    #[must_use]
    pub fn new(power: PowerController<C, L, P>) -> Self {
        let countdown = CountdownClock::with_ticks_per_minute(power.config().ticks_per_minute());
        Self {
            matcher: CommandMatcher::new(),
            countdown,
            power,
            telemetry: TelemetryRecorder::new(),
            uptime_ticks: 0,
        }
    }

    /// Brings the outputs to the ON state after reset.
    pub fn boot(&mut self) {
        self.power.turn_on(&mut self.countdown);
        self.telemetry.record(
            TelemetryEventKind::PoweredOn(WakeReason::Boot),
            self.uptime_ticks,
        );
    }

    /// Runs one pass of the main loop.
    pub fn poll<T, S>(&mut self, ticks: &T, serial: &mut S) -> LoopPass
    where
        T: TickSource + ?Sized,
        S: SerialLink + ?Sized,
    {
        let mut pass = LoopPass::default();

        if ticks.take_tick() {
            pass.ticked = true;
            self.uptime_ticks += 1;
            if self.countdown.on_tick() {
                pass.actions |= Actions::ALARM;
            }
            self.power.on_tick();
            if ticks.take_pressed(self.power.config().button_mask()) != 0 {
                pass.actions |= Actions::KEY_PRESS;
            }
        }

        if let Some(byte) = serial.receive_byte() {
            pass.command = self.matcher.feed(byte);
            match pass.command {
                Some(Command::SleepTime { minutes, mode }) => {
                    self.countdown.arm(minutes, mode);
                    self.telemetry.record(
                        TelemetryEventKind::SleepTimeSet(self.countdown.state()),
                        self.uptime_ticks,
                    );
                }
                Some(Command::Halt) => pass.actions |= Actions::SWITCH_OFF,
                None => {}
            }
        }

        if !pass.actions.is_empty() {
            pass.dispatch = self
                .power
                .dispatch(pass.actions, &mut self.countdown, ticks, serial);
            self.record_dispatch(pass.dispatch);
        }

        pass
    }

    /// Runs the main loop forever, handing every pass to `observe`.
    pub fn run<T, S, F>(&mut self, ticks: &T, serial: &mut S, mut observe: F) -> !
    where
        T: TickSource + ?Sized,
        S: SerialLink + ?Sized,
        F: FnMut(&Self, &LoopPass),
    {
        loop {
            let pass = self.poll(ticks, serial);
            observe(self, &pass);
        }
    }

    fn record_dispatch(&mut self, dispatch: Dispatch) {
        let config = *self.power.config();

        if dispatch.shutdown_requested {
            self.telemetry
                .record(TelemetryEventKind::ShutdownRequested, self.uptime_ticks);
            self.uptime_ticks += u64::from(config.shutdown_grace_ticks());
        }

        match dispatch.transition {
            Some(Transition::PoweredOff(off)) => {
                self.uptime_ticks += u64::from(config.power_off_grace_ticks());
                self.telemetry
                    .record(TelemetryEventKind::PoweredOff(off), self.uptime_ticks);
            }
            Some(Transition::PoweredOn(reason)) => {
                self.telemetry
                    .record(TelemetryEventKind::PoweredOn(reason), self.uptime_ticks);
            }
            None => {}
        }
    }

    #[must_use]
    pub const fn countdown(&self) -> &CountdownClock {
        &self.countdown
    }

    #[must_use]
    pub const fn power(&self) -> &PowerController<C, L, P> {
        &self.power
    }

    #[must_use]
    pub const fn matcher(&self) -> &CommandMatcher {
        &self.matcher
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Ticks consumed since boot, grace periods included.
    #[must_use]
    pub const fn uptime_ticks(&self) -> u64 {
        self.uptime_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::countdown::SignalMode;
    use crate::power::PowerState;
    use crate::sim::{SimClock, SimLeds, SimLoad, SimSerial, SimTicks};

    fn booted() -> SleepTimer<SimClock, SimLoad, SimLeds> {
        let power = PowerController::new(
            SimClock::new(),
            SimLoad::new(),
            SimLeds::new(),
            ControllerConfig::standard(),
        );
        let mut app = SleepTimer::new(power);
        app.boot();
        app
    }

    #[test]
    fn boot_turns_the_computer_on() {
        let app = booted();
        assert_eq!(app.power().state(), PowerState::On);
        assert!(app.power().load().is_energized());
        assert_eq!(app.telemetry().len(), 1);
    }

    #[test]
    fn pass_without_tick_or_byte_is_quiet() {
        let mut app = booted();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();

        assert_eq!(app.poll(&ticks, &mut serial), LoopPass::default());
    }

    #[test]
    fn one_byte_is_consumed_per_pass() {
        let mut app = booted();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();
        serial.push_rx(b"SLEEPTIME 5min:1");

        let mut passes = 0;
        let command = loop {
            passes += 1;
            if let Some(command) = app.poll(&ticks, &mut serial).command {
                break command;
            }
        };

        assert_eq!(passes, 16);
        assert_eq!(
            command,
            Command::SleepTime {
                minutes: 5,
                mode: SignalMode::RedBlink,
            }
        );
        assert_eq!(app.countdown().sleep_minutes(), 5);
    }

    #[test]
    fn halt_powers_off_and_accounts_for_grace_ticks() {
        let mut app = booted();
        let ticks = SimTicks::new();
        let mut serial = SimSerial::new();
        serial.push_rx(b"reboot: System halted");

        let pass = (0..21)
            .map(|_| app.poll(&ticks, &mut serial))
            .last()
            .expect("passes ran");

        assert!(pass.actions.contains(Actions::SWITCH_OFF));
        assert!(matches!(
            pass.dispatch.transition,
            Some(Transition::PoweredOff(_))
        ));
        assert_eq!(app.uptime_ticks(), ticks.elapsed());
    }
}
