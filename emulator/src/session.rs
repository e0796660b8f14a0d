use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use sleeptimer_core::config::{BUTTON_MASK, TICK_HZ};
use sleeptimer_core::debounce::DEBOUNCE_SAMPLES;
use sleeptimer_core::power::ClockRate;
use sleeptimer_core::sim::{SimClock, SimLeds, SimLoad, SimSerial, SimTicks};
use sleeptimer_core::telemetry::{EventId, TelemetryRecord};
use sleeptimer_core::{ControllerConfig, PowerController, SleepTimer};

use crate::command::{ReplCommand, parse_command};

/// Upper bound on loop passes spent draining the receive buffer per tick.
const MAX_PASSES_PER_TICK: usize = 4 * sleeptimer_core::sim::SIM_SERIAL_CAPACITY;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("tick", "tick [n]                 - fire n tick interrupts (10 ms each)"),
    ("wait", "wait <n>s | <n>min       - advance simulated time"),
    ("press", "press                    - press and release the power button"),
    ("send", "send <text>              - computer prints <text> followed by CR"),
    ("raw", "raw <text>               - computer prints <text> without CR"),
    ("status", "status                   - show power, relay, LEDs and countdown"),
    ("log", "log                      - list retained telemetry records"),
    ("help", "help [topic]             - show help for a command"),
    ("exit", "exit | quit              - leave the emulator"),
];

type Appliance = SleepTimer<SimClock, SimLoad, SimLeds>;

pub struct Session {
    app: Appliance,
    ticks: SimTicks,
    serial: SimSerial,
    transcript: Option<TranscriptLogger>,
    last_seen: Option<EventId>,
}

impl Session {
    /// Boots the simulated appliance, optionally mirroring the session to `transcript`.
    pub fn new(transcript: Option<&Path>) -> io::Result<Self> {
        Self::with_config(ControllerConfig::standard(), transcript)
    }

    pub fn with_config(config: ControllerConfig, transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;
        let power = PowerController::new(SimClock::new(), SimLoad::new(), SimLeds::new(), config);
        let mut app = SleepTimer::new(power);
        app.boot();

        Ok(Self {
            app,
            ticks: SimTicks::new(),
            serial: SimSerial::new(),
            transcript,
            last_seen: None,
        })
    }

    /// Simulated time since boot.
    pub fn elapsed(&self) -> Duration {
        ticks_to_duration(self.ticks.elapsed())
    }

    /// Lines describing everything that happened since boot, for the banner.
    pub fn drain_startup(&mut self) -> io::Result<Vec<String>> {
        let lines = self.collect_output();
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match parse_command(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: ReplCommand) -> Vec<String> {
        match command {
            ReplCommand::Tick(count) | ReplCommand::Wait(count) => {
                self.advance(u64::from(count));
                let mut lines = self.collect_output();
                lines.push(format!("OK t={}", format_elapsed(self.elapsed())));
                lines
            }
            ReplCommand::Press => {
                self.ticks.set_keys(BUTTON_MASK);
                self.advance(u64::from(DEBOUNCE_SAMPLES));
                self.ticks.set_keys(0);
                self.advance(u64::from(DEBOUNCE_SAMPLES));
                let mut lines = self.collect_output();
                lines.push("OK button released".to_string());
                lines
            }
            ReplCommand::Send(mut text) => {
                text.push('\r');
                self.receive(text.as_bytes())
            }
            ReplCommand::Raw(text) => self.receive(text.as_bytes()),
            ReplCommand::Status => self.status(),
            ReplCommand::Log => self.log(),
            ReplCommand::Help(topic) => help(topic.as_deref()),
        }
    }

    fn receive(&mut self, bytes: &[u8]) -> Vec<String> {
        let accepted = self.serial.push_rx(bytes);
        self.pump();
        let mut lines = self.collect_output();
        if accepted < bytes.len() {
            lines.push(format!(
                "WARN rx overflow: dropped {} bytes",
                bytes.len() - accepted
            ));
        }
        lines.push(format!("OK rx {accepted} bytes"));
        lines
    }

    /// Advances simulated time by `count` ticks. Blocking grace periods run
    /// inside the loop and count towards the total.
    fn advance(&mut self, count: u64) {
        let target = self.ticks.elapsed() + count;
        while self.ticks.elapsed() < target {
            self.ticks.fire();
            self.pump();
        }
    }

    /// Runs loop passes until the pending tick and received bytes are consumed.
    fn pump(&mut self) {
        for _ in 0..MAX_PASSES_PER_TICK {
            self.app.poll(&self.ticks, &mut self.serial);
            if !self.ticks.system_tick().is_pending() && self.serial.pending_rx() == 0 {
                break;
            }
        }
    }

    fn collect_output(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .app
            .telemetry()
            .newer_than(self.last_seen)
            .map(describe_record)
            .collect();
        if let Some(latest) = self.app.telemetry().latest() {
            self.last_seen = Some(latest.id);
        }

        let sent = self.serial.transmitted();
        if !sent.is_empty() {
            lines.push(format!("TX \"{}\"", sent.escape_ascii()));
            self.serial.clear_transmitted();
        }
        lines
    }

    fn status(&self) -> Vec<String> {
        let power = self.app.power();
        let countdown = self.app.countdown();
        let (green, red) = power.indicator().pins().levels();
        let clock = match power.clock().rate() {
            Some(ClockRate::Full) => "full",
            Some(ClockRate::Divided) => "divided",
            None => "unset",
        };

        vec![
            format!(
                "power={} relay={} clock={clock}",
                power.state(),
                on_off(power.load().is_energized()),
            ),
            format!(
                "leds green={} red={} mode={}",
                on_off(green),
                on_off(red),
                power.indicator().mode()
            ),
            format!(
                "countdown {}min next-minute-in={} off-mode={}",
                countdown.sleep_minutes(),
                format_elapsed(ticks_to_duration(u64::from(countdown.ticks_to_minute()))),
                countdown.signal_mode()
            ),
            format!(
                "t={} rx-pending={} matcher={}",
                format_elapsed(self.elapsed()),
                self.serial.pending_rx(),
                if self.app.matcher().is_idle() {
                    "idle"
                } else {
                    "partial"
                }
            ),
        ]
    }

    fn log(&self) -> Vec<String> {
        let telemetry = self.app.telemetry();
        if telemetry.is_empty() {
            return vec!["telemetry empty".to_string()];
        }
        telemetry.oldest_first().map(describe_record).collect()
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn app(&self) -> &Appliance {
        &self.app
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS.iter().find(|(name, _)| *name == target) {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_record(record: &TelemetryRecord) -> String {
    format!(
        "[{}] #{} {}",
        format_elapsed(ticks_to_duration(record.at_tick)),
        record.id,
        record.event
    )
}

fn on_off(level: bool) -> &'static str {
    if level { "on" } else { "off" }
}

fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks * 1_000 / u64::from(TICK_HZ))
}

fn format_elapsed(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}.{:02}s", secs / 60, secs % 60, duration.subsec_millis() / 10)
    } else {
        format!("{}.{:02}s", secs, duration.subsec_millis() / 10)
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Sleep timer emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds of simulated time since boot"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>9} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleeptimer_core::PowerState;

    fn session() -> Session {
        let mut session = Session::new(None).expect("session");
        session.drain_startup().expect("startup");
        session
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("command")
    }

    #[test]
    fn boot_is_reported_once() {
        let mut session = Session::new(None).expect("session");
        let lines = session.drain_startup().expect("startup");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("powered-on (boot)"));
        assert!(session.drain_startup().expect("startup").is_empty());
    }

    #[test]
    fn press_while_on_prints_the_shutdown_login() {
        let mut session = session();
        let lines = run(&mut session, "press");
        assert!(lines.iter().any(|line| line == "TX \"\\x04shutdown\\r\""));
        assert_eq!(session.app().power().state(), PowerState::On);
    }

    #[test]
    fn halt_then_wait_wakes_on_the_alarm() {
        let mut session = session();
        run(&mut session, "send SLEEPTIME 1min:1");
        let lines = run(&mut session, "send reboot: System halted");
        assert!(lines.iter().any(|line| line.contains("powered-off")));
        assert_eq!(session.app().power().state(), PowerState::Off);

        let lines = run(&mut session, "wait 1min");
        assert!(lines.iter().any(|line| line.contains("powered-on (alarm)")));
        assert_eq!(session.app().power().state(), PowerState::On);
    }

    #[test]
    fn halt_without_a_schedule_uses_the_configured_fallback() {
        let config = ControllerConfig::standard().with_fallback_sleep_minutes(1);
        let mut session = Session::with_config(config, None).expect("session");
        session.drain_startup().expect("startup");

        run(&mut session, "send reboot: System halted");
        assert_eq!(session.app().countdown().sleep_minutes(), 1);
        let lines = run(&mut session, "wait 1min");
        assert!(lines.iter().any(|line| line.contains("powered-on (alarm)")));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = session();
        let lines = run(&mut session, "launch");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax"));
    }

    #[test]
    fn help_lists_topics() {
        assert_eq!(help(Some("press")).len(), 1);
        assert!(help(Some("nope"))[1].contains("tick, wait"));
        assert_eq!(help(None).len(), HELP_TOPICS.len() + 2);
    }

    #[test]
    fn elapsed_formats_minutes() {
        assert_eq!(format_elapsed(Duration::from_millis(1_230)), "1.23s");
        assert_eq!(format_elapsed(Duration::from_millis(61_500)), "1m01.50s");
    }
}
