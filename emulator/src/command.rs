//! Grammar for the emulator prompt.
//!
//! Keywords are case-insensitive. Numbers are plain decimal; `wait` takes a
//! unit suffix of `s` or `min` and is converted to ticks here so the session
//! only ever deals in ticks.

use core::fmt;

use sleeptimer_core::config::{TICK_HZ, TICKS_PER_MINUTE};
use winnow::ascii::{Caseless, alpha1, digit1, space0, space1};
use winnow::combinator::{alt, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::rest;

/// One line typed at the prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplCommand {
    /// Fire this many tick interrupts.
    Tick(u32),
    /// Advance simulated time, expressed in ticks.
    Wait(u32),
    /// Hold the button until it debounces, then release it.
    Press,
    /// Queue a line from the computer, `\r` appended.
    Send(String),
    /// Queue bytes from the computer verbatim.
    Raw(String),
    Status,
    Log,
    Help(Option<String>),
}

/// Position of the first byte the grammar could not accept.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyntaxError {
    pub column: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected input at column {}", self.column)
    }
}

/// Parses a full prompt line.
pub fn parse_command(line: &str) -> Result<ReplCommand, SyntaxError> {
    let line = line.trim_start();
    terminated(command, space0)
        .parse(line)
        .map_err(|err| SyntaxError {
            column: err.offset() + 1,
        })
}

fn command(input: &mut &str) -> ModalResult<ReplCommand> {
    alt((
        preceded(Caseless("tick"), opt(preceded(space1, count)))
            .map(|count| ReplCommand::Tick(count.unwrap_or(1))),
        preceded((Caseless("wait"), space1), duration_ticks).map(ReplCommand::Wait),
        Caseless("press").value(ReplCommand::Press),
        preceded((Caseless("send"), space1), rest).map(|text: &str| ReplCommand::Send(text.into())),
        preceded((Caseless("raw"), space1), rest).map(|text: &str| ReplCommand::Raw(text.into())),
        Caseless("status").value(ReplCommand::Status),
        Caseless("log").value(ReplCommand::Log),
        preceded(Caseless("help"), opt(preceded(space1, alpha1)))
            .map(|topic: Option<&str>| ReplCommand::Help(topic.map(str::to_ascii_lowercase))),
    ))
    .parse_next(input)
}

fn count(input: &mut &str) -> ModalResult<u32> {
    digit1.try_map(str::parse::<u32>).parse_next(input)
}

fn duration_ticks(input: &mut &str) -> ModalResult<u32> {
    let value = count.parse_next(input)?;
    let ticks_per_unit = alt((
        Caseless("min").value(u32::from(TICKS_PER_MINUTE)),
        Caseless("s").value(u32::from(TICK_HZ)),
    ))
    .parse_next(input)?;
    Ok(value.saturating_mul(ticks_per_unit))
}
