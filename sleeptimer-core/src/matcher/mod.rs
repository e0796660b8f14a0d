//! Streaming recogniser for the serial commands.
//!
//! The host never frames its output, so the matcher consumes one byte at a
//! time and keeps a resumable cursor per pattern instead of buffering lines.
//! Each [`PatternMatcher`] walks a static table of [`Segment`]s; literal
//! segments must match byte for byte, while capture segments collect a
//! decimal number or a single mode bit on the way.
//!
//! A byte that does not continue the pattern resets the cursor and drops any
//! partial capture. The same byte is then tried once against the start of
//! the pattern so that it can open a new attempt. Malformed input is never
//! reported; it simply fails to match.

pub mod patterns;

use core::fmt;

use crate::countdown::SignalMode;

/// One element of a command pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// Bytes that must appear verbatim.
    Literal(&'static [u8]),
    /// One or more ASCII digits accumulated into [`Captures::number`].
    Digits,
    /// Exactly one ASCII digit whose low bit lands in [`Captures::flag`].
    Flag,
}

/// Immutable pattern table. Holds at most one `Digits` and one `Flag`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    name: &'static str,
    segments: &'static [Segment],
}

impl Pattern {
    #[must_use]
    pub const fn new(name: &'static str, segments: &'static [Segment]) -> Self {
        Self { name, segments }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn segments(&self) -> &'static [Segment] {
        self.segments
    }
}

/// Values collected while walking a pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Captures {
    /// Decimal digit run, saturating at `u16::MAX`.
    pub number: Option<u16>,
    pub flag: Option<bool>,
}

const fn ascii_digit(byte: u8) -> Option<u8> {
    if byte.is_ascii_digit() {
        Some(byte - b'0')
    } else {
        None
    }
}

/// Resumable automaton for a single [`Pattern`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PatternMatcher {
    pattern: Pattern,
    segment: usize,
    offset: usize,
    captures: Captures,
}

impl PatternMatcher {
    #[must_use]
    pub const fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            segment: 0,
            offset: 0,
            captures: Captures {
                number: None,
                flag: None,
            },
        }
    }

    /// Consumes one byte, returning the captures when it completes the pattern.
    pub fn feed(&mut self, byte: u8) -> Option<Captures> {
        if !self.advance(byte) {
            let was_at_start = self.is_at_start();
            self.reset();
            if !was_at_start && !self.advance(byte) {
                self.reset();
            }
        }

        if self.segment < self.pattern.segments.len() {
            return None;
        }

        let captures = self.captures;
        self.reset();
        Some(captures)
    }

    /// Returns the cursor to the start of the pattern and drops captures.
    pub fn reset(&mut self) {
        self.segment = 0;
        self.offset = 0;
        self.captures = Captures::default();
    }

    /// `true` while no byte of a new attempt has been accepted.
    #[must_use]
    pub fn is_at_start(&self) -> bool {
        self.segment == 0 && self.offset == 0 && self.captures == Captures::default()
    }

    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn next_segment(&mut self) {
        self.segment += 1;
        self.offset = 0;
    }

    fn advance(&mut self, byte: u8) -> bool {
        while let Some(segment) = self.pattern.segments.get(self.segment) {
            match *segment {
                Segment::Literal(text) => {
                    if text.get(self.offset) != Some(&byte) {
                        return false;
                    }
                    self.offset += 1;
                    if self.offset == text.len() {
                        self.next_segment();
                    }
                    return true;
                }
                Segment::Digits => {
                    if let Some(digit) = ascii_digit(byte) {
                        let value = self.captures.number.unwrap_or(0);
                        self.captures.number =
                            Some(value.saturating_mul(10).saturating_add(u16::from(digit)));
                        return true;
                    }
                    if self.captures.number.is_none() {
                        return false;
                    }
                    // The run ends here; this byte belongs to the next segment.
                    self.next_segment();
                }
                Segment::Flag => {
                    let Some(digit) = ascii_digit(byte) else {
                        return false;
                    };
                    self.captures.flag = Some(digit & 1 == 1);
                    self.next_segment();
                    return true;
                }
            }
        }

        // A trailing digit run was terminated by this byte.
        true
    }
}

/// Commands recognised on the serial line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Arm the wake countdown and choose the off indicator.
    SleepTime { minutes: u16, mode: SignalMode },
    /// The host has halted; cut its power.
    Halt,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SleepTime { minutes, mode } => write!(f, "sleeptime {minutes}min {mode}"),
            Command::Halt => f.write_str("halt"),
        }
    }
}

/// Runs the `SLEEPTIME` and halt matchers side by side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandMatcher {
    sleeptime: PatternMatcher,
    halt: PatternMatcher,
}

impl CommandMatcher {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sleeptime: PatternMatcher::new(patterns::SLEEPTIME),
            halt: PatternMatcher::new(patterns::HALT),
        }
    }

    /// Feeds one received byte to both matchers.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        let sleeptime = self
            .sleeptime
            .feed(byte)
            .map(|captures| Command::SleepTime {
                minutes: captures.number.unwrap_or(0),
                mode: SignalMode::from_flag(captures.flag.unwrap_or(false)),
            });
        let halt = self.halt.feed(byte).map(|_| Command::Halt);
        sleeptime.or(halt)
    }

    /// Feeds a byte slice, returning the last command it completed.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Option<Command> {
        bytes.iter().fold(None, |last, &byte| self.feed(byte).or(last))
    }

    /// `true` when neither matcher holds a partial attempt.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.sleeptime.is_at_start() && self.halt.is_at_start()
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new()
    }
}
