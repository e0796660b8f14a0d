//! Mirrors the core telemetry ring to defmt.

use sleeptimer_core::telemetry::{EventId, TelemetryRecorder};

/// Tracks which telemetry records have already been logged.
pub struct TelemetryLog {
    last_seen: Option<EventId>,
}

impl TelemetryLog {
    pub const fn new() -> Self {
        Self { last_seen: None }
    }

    /// Logs every record added since the previous flush.
    pub fn flush(&mut self, recorder: &TelemetryRecorder) {
        for record in recorder.newer_than(self.last_seen) {
            defmt::info!(
                "telemetry #{} @{}: {}",
                record.id,
                record.at_tick,
                record.event
            );
            self.last_seen = Some(record.id);
        }
    }
}
