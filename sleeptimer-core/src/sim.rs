//! Simulated hardware for host tests and the emulator.
//!
//! Nothing here touches real peripherals. [`SimTicks`] stands in for the
//! timer interrupt: every time the main loop idles waiting for a tick it
//! fires one simulated interrupt, so blocking grace periods complete in
//! simulated time and the elapsed tick count can be asserted on.

use core::cell::Cell;

use heapless::{Deque, Vec};

use crate::indicator::IndicatorPins;
use crate::power::{ClockControl, ClockRate, LoadSwitch, SerialLink};
use crate::tick::{SystemTick, TickSource};

/// Bytes the simulated UART can hold in each direction.
pub const SIM_SERIAL_CAPACITY: usize = 256;

/// Tick source whose interrupt is fired on demand.
pub struct SimTicks {
    tick: SystemTick,
    keys: Cell<u8>,
    elapsed: Cell<u64>,
}

impl SimTicks {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tick: SystemTick::new(),
            keys: Cell::new(0),
            elapsed: Cell::new(0),
        }
    }

    /// Runs the tick interrupt once with the current key levels.
    pub fn fire(&self) {
        self.tick.on_interrupt(self.keys.get());
        self.elapsed.set(self.elapsed.get() + 1);
    }

    /// Sets the raw key levels seen by subsequent interrupts.
    pub fn set_keys(&self, pressed: u8) {
        self.keys.set(pressed);
    }

    /// Interrupts fired so far.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.elapsed.get()
    }

    #[must_use]
    pub const fn system_tick(&self) -> &SystemTick {
        &self.tick
    }
}

impl Default for SimTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SimTicks {
    fn take_tick(&self) -> bool {
        self.tick.take_tick()
    }

    fn take_pressed(&self, mask: u8) -> u8 {
        self.tick.take_pressed(mask)
    }

    fn idle(&self) {
        self.fire();
    }
}

/// Loopback UART with bounded receive and transmit buffers.
#[derive(Default)]
pub struct SimSerial {
    rx: Deque<u8, SIM_SERIAL_CAPACITY>,
    tx: Vec<u8, SIM_SERIAL_CAPACITY>,
    dropped: usize,
}

impl SimSerial {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Vec::new(),
            dropped: 0,
        }
    }

    /// Queues bytes as if the computer had sent them. Returns how many fit.
    pub fn push_rx(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            if self.rx.push_back(byte).is_err() {
                self.dropped += bytes.len() - accepted;
                break;
            }
            accepted += 1;
        }
        accepted
    }

    #[must_use]
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Everything sent to the computer since the last [`Self::clear_transmitted`].
    #[must_use]
    pub fn transmitted(&self) -> &[u8] {
        &self.tx
    }

    pub fn clear_transmitted(&mut self) {
        self.tx.clear();
    }

    /// Bytes lost to full buffers in either direction.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}

impl SerialLink for SimSerial {
    fn receive_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn send_byte(&mut self, byte: u8) {
        if self.tx.push(byte).is_err() {
            self.dropped += 1;
        }
    }
}

/// Records the selected clock rate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SimClock {
    rate: Option<ClockRate>,
    switches: u32,
}

impl SimClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rate: None,
            switches: 0,
        }
    }

    /// Last applied rate, `None` before the first switch.
    #[must_use]
    pub const fn rate(&self) -> Option<ClockRate> {
        self.rate
    }

    #[must_use]
    pub const fn switches(&self) -> u32 {
        self.switches
    }
}

impl ClockControl for SimClock {
    fn set_rate(&mut self, rate: ClockRate) {
        self.rate = Some(rate);
        self.switches += 1;
    }
}

/// Records the relay level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SimLoad {
    energized: bool,
}

impl SimLoad {
    #[must_use]
    pub const fn new() -> Self {
        Self { energized: false }
    }

    #[must_use]
    pub const fn is_energized(&self) -> bool {
        self.energized
    }
}

impl LoadSwitch for SimLoad {
    fn set_energized(&mut self, energized: bool) {
        self.energized = energized;
    }
}

/// Records both LED levels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SimLeds {
    green: bool,
    red: bool,
}

impl SimLeds {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            green: false,
            red: false,
        }
    }

    /// `(green, red)`
    #[must_use]
    pub const fn levels(&self) -> (bool, bool) {
        (self.green, self.red)
    }
}

impl IndicatorPins for SimLeds {
    fn set_levels(&mut self, green: bool, red: bool) {
        self.green = green;
        self.red = red;
    }
}
