//! Vertical-counter key debouncer.
//!
//! Every key owns one bit in each of two counter bytes. A key whose raw level
//! differs from its debounced level counts down through four states; the
//! debounced level only toggles when both counter bits roll over together,
//! which takes [`DEBOUNCE_SAMPLES`] consecutive changed samples. Any sample
//! that agrees with the debounced level resets that key's counter, so a
//! single-sample glitch never propagates.
//!
//! `sample` runs in the tick interrupt and `take_pressed` in the main loop.
//! Both go through the same critical section so a press latched by the
//! interrupt can never be lost by a concurrent read-and-clear.

use core::cell::Cell;

use critical_section::Mutex;

/// Consecutive changed samples required before the debounced level toggles.
pub const DEBOUNCE_SAMPLES: u8 = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct FilterState {
    level: u8,
    pressed: u8,
    ct0: u8,
    ct1: u8,
}

impl FilterState {
    const fn new() -> Self {
        Self {
            level: 0,
            pressed: 0,
            ct0: 0xFF,
            ct1: 0xFF,
        }
    }

    fn step(&mut self, raw_pressed: u8) {
        let mut changed = self.level ^ raw_pressed;
        self.ct0 = !(self.ct0 & changed);
        self.ct1 = self.ct0 ^ (self.ct1 & changed);
        changed &= self.ct0 & self.ct1;
        self.level ^= changed;
        self.pressed |= self.level & changed;
    }
}

/// Debounces up to eight keys sampled once per tick.
pub struct KeyDebouncer {
    state: Mutex<Cell<FilterState>>,
}

impl KeyDebouncer {
    /// Creates a debouncer with every key released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(FilterState::new())),
        }
    }

    /// Feeds one raw sample; bit set means the contact is closed.
    pub fn sample(&self, raw_pressed: u8) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.step(raw_pressed);
            cell.set(state);
        });
    }

    /// Returns and clears the latched presses selected by `mask`.
    #[must_use]
    pub fn take_pressed(&self, mask: u8) -> u8 {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let taken = state.pressed & mask;
            state.pressed ^= taken;
            cell.set(state);
            taken
        })
    }

    /// Current debounced level of every key.
    #[must_use]
    pub fn debounced(&self) -> u8 {
        critical_section::with(|cs| self.state.borrow(cs).get().level)
    }
}

impl Default for KeyDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: u8 = 0b0000_0001;

    fn feed(debouncer: &KeyDebouncer, level: u8, samples: u8) {
        for _ in 0..samples {
            debouncer.sample(level);
        }
    }

    #[test]
    fn toggles_after_exactly_four_changed_samples() {
        let debouncer = KeyDebouncer::new();
        feed(&debouncer, KEY, DEBOUNCE_SAMPLES - 1);
        assert_eq!(debouncer.debounced(), 0);
        assert_eq!(debouncer.take_pressed(KEY), 0);

        debouncer.sample(KEY);
        assert_eq!(debouncer.debounced(), KEY);
        assert_eq!(debouncer.take_pressed(KEY), KEY);
    }

    #[test]
    fn interrupted_run_restarts_the_counter() {
        let debouncer = KeyDebouncer::new();
        feed(&debouncer, KEY, 3);
        debouncer.sample(0);
        feed(&debouncer, KEY, 3);
        assert_eq!(debouncer.debounced(), 0);
        debouncer.sample(KEY);
        assert_eq!(debouncer.debounced(), KEY);
    }

    #[test]
    fn release_does_not_latch_a_press() {
        let debouncer = KeyDebouncer::new();
        feed(&debouncer, KEY, 8);
        assert_eq!(debouncer.take_pressed(KEY), KEY);

        feed(&debouncer, 0, 8);
        assert_eq!(debouncer.debounced(), 0);
        assert_eq!(debouncer.take_pressed(KEY), 0);
    }

    #[test]
    fn take_pressed_only_clears_requested_bits() {
        let debouncer = KeyDebouncer::new();
        feed(&debouncer, 0b11, DEBOUNCE_SAMPLES);
        assert_eq!(debouncer.take_pressed(0b01), 0b01);
        assert_eq!(debouncer.take_pressed(0b01), 0);
        assert_eq!(debouncer.take_pressed(0b10), 0b10);
    }

    #[test]
    fn keys_debounce_independently() {
        let debouncer = KeyDebouncer::new();
        feed(&debouncer, 0b01, 2);
        feed(&debouncer, 0b11, 2);
        assert_eq!(debouncer.debounced(), 0b01);
        feed(&debouncer, 0b11, 2);
        assert_eq!(debouncer.debounced(), 0b11);
    }
}
