//! Periodic tick source shared between the timer interrupt and the main loop.
//!
//! [`SystemTick`] is the only state the interrupt writes: a single-writer,
//! single-reader tick flag and the key debouncer. Ticks are not queued. The
//! main loop must consume the flag at least once per tick period or the
//! countdown and debounce cadence drift.

use portable_atomic::{AtomicBool, Ordering};

use crate::debounce::KeyDebouncer;

/// Interrupt-shared block holding the tick flag and the key debouncer.
pub struct SystemTick {
    raised: AtomicBool,
    keys: KeyDebouncer,
}

impl SystemTick {
    /// Creates a tick block with no pending tick and every key released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            keys: KeyDebouncer::new(),
        }
    }

    /// Body of the periodic timer interrupt.
    ///
    /// `pressed` carries the raw key levels, one bit per key, set when the
    /// contact is closed.
    pub fn on_interrupt(&self, pressed: u8) {
        self.raised.store(true, Ordering::Release);
        self.keys.sample(pressed);
    }

    /// Peeks at the tick flag without consuming it.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Debounced key levels, for status reporting.
    #[must_use]
    pub fn debounced_keys(&self) -> u8 {
        self.keys.debounced()
    }
}

impl Default for SystemTick {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-loop view of the tick source.
pub trait TickSource {
    /// Consumes the pending tick, returning `true` if one was raised.
    fn take_tick(&self) -> bool;

    /// Returns and clears the debounced presses selected by `mask`.
    fn take_pressed(&self, mask: u8) -> u8;

    /// Called while spinning for the next tick.
    fn idle(&self) {
        core::hint::spin_loop();
    }

    /// Blocks until `count` ticks have elapsed.
    ///
    /// The wait cannot be cancelled and consumes the ticks it observes, so
    /// nothing else advances while it runs.
    fn wait_ticks(&self, count: u32) {
        let mut remaining = count;
        while remaining > 0 {
            if self.take_tick() {
                remaining -= 1;
            } else {
                self.idle();
            }
        }
    }
}

impl TickSource for SystemTick {
    fn take_tick(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    fn take_pressed(&self, mask: u8) -> u8 {
        self.keys.take_pressed(mask)
    }
}
