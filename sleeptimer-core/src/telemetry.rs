//! Telemetry ring for power transitions and accepted commands.
//!
//! Records are kept in a fixed-capacity history buffer; once it is full the
//! oldest entry is overwritten. Event identifiers count up by one per record
//! and wrap, so consumers (defmt logging, the emulator) compare them with
//! serial-number arithmetic to pick up only what is new.

use core::fmt;

use heapless::HistoryBuf;

use crate::countdown::CountdownState;
use crate::power::{PowerOff, WakeReason};

/// Number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 16;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    PoweredOn(WakeReason),
    PoweredOff(PowerOff),
    ShutdownRequested,
    SleepTimeSet(CountdownState),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::PoweredOn(reason) => write!(f, "powered-on ({reason})"),
            TelemetryEventKind::PoweredOff(off) => {
                write!(
                    f,
                    "powered-off wake-in={}min led={}",
                    off.countdown.sleep_minutes, off.countdown.signal_mode
                )?;
                if off.fallback_armed {
                    f.write_str(" (fallback)")?;
                }
                Ok(())
            }
            TelemetryEventKind::ShutdownRequested => f.write_str("shutdown-requested"),
            TelemetryEventKind::SleepTimeSet(state) => write!(
                f,
                "sleeptime-set {}min led={}",
                state.sleep_minutes, state.signal_mode
            ),
        }
    }
}

/// One entry in the telemetry ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Main-loop ticks since boot when the event was recorded.
    pub at_tick: u64,
    pub event: TelemetryEventKind,
}

/// Fixed-size telemetry history.
pub struct TelemetryRecorder {
    ring: HistoryBuf<TelemetryRecord, TELEMETRY_RING_CAPACITY>,
    next_event_id: EventId,
}

impl TelemetryRecorder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event, evicting the oldest once the ring is full.
    pub fn record(&mut self, event: TelemetryEventKind, at_tick: u64) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, at_tick, event });
        id
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Recorded events in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Events recorded after `last_seen`, or everything retained when `None`.
    pub fn newer_than(
        &self,
        last_seen: Option<EventId>,
    ) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.oldest_first()
            .filter(move |record| last_seen.is_none_or(|seen| is_after(record.id, seen)))
    }
}

/// `true` when `id` was issued after `seen`, tolerating wrap-around.
fn is_after(id: EventId, seen: EventId) -> bool {
    let distance = id.wrapping_sub(seen);
    distance != 0 && distance <= EventId::MAX / 2
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
