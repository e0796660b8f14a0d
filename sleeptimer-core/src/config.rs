//! Timing and protocol constants shared by firmware and host targets.
//!
//! All time-based behaviour is expressed in ticks of the 10 ms system timer.
//! [`ControllerConfig`] bundles the grace periods and the fallback wake time so
//! the emulator and tests can shorten them without touching the state machines.

use core::time::Duration;

/// System tick frequency in hertz (one tick every 10 ms).
pub const TICK_HZ: u16 = 100;

/// Ticks in one minute of the countdown clock.
pub const TICKS_PER_MINUTE: u16 = TICK_HZ * 60;

/// Grace period between the session reset byte and the shutdown login.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Delay between the halt notice and cutting the load.
pub const POWER_OFF_GRACE: Duration = Duration::from_secs(1);

/// Countdown armed when the device powers off without a wake time.
pub const FALLBACK_SLEEP_MINUTES: u16 = 24 * 60;

/// Button input bit inside the debouncer's key mask.
pub const BUTTON_MASK: u8 = 1 << 0;

/// Control byte (EOT) that makes the remote getty print a fresh login prompt.
pub const SESSION_RESET_BYTE: u8 = 0x04;

/// Login name of the remote shutdown account, terminated like a typed line.
pub const SHUTDOWN_LINE: &[u8] = b"shutdown\r";

/// Converts a wall-clock duration into whole ticks at `tick_hz`, rounding down.
/// Durations too long for a `u32` saturate.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn ticks_for(duration: Duration, tick_hz: u16) -> u32 {
    let millis = duration.as_millis();
    let ticks = millis * tick_hz as u128 / 1_000;
    if ticks > u32::MAX as u128 {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Tunables for the power state controller and the countdown clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    tick_hz: u16,
    shutdown_grace_ticks: u32,
    power_off_grace_ticks: u32,
    fallback_sleep_minutes: u16,
    button_mask: u8,
}

impl ControllerConfig {
    /// Configuration used by the shipping firmware.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            tick_hz: TICK_HZ,
            shutdown_grace_ticks: ticks_for(SHUTDOWN_GRACE, TICK_HZ),
            power_off_grace_ticks: ticks_for(POWER_OFF_GRACE, TICK_HZ),
            fallback_sleep_minutes: FALLBACK_SLEEP_MINUTES,
            button_mask: BUTTON_MASK,
        }
    }

    /// Overrides the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ticks = ticks_for(grace, self.tick_hz);
        self
    }

    /// Overrides the power-off grace period.
    #[must_use]
    pub const fn with_power_off_grace(mut self, grace: Duration) -> Self {
        self.power_off_grace_ticks = ticks_for(grace, self.tick_hz);
        self
    }

    /// Overrides the countdown armed when powering off with no wake time.
    #[must_use]
    pub const fn with_fallback_sleep_minutes(mut self, minutes: u16) -> Self {
        self.fallback_sleep_minutes = minutes;
        self
    }

    /// Selects which debouncer key bit acts as the power button.
    #[must_use]
    pub const fn with_button_mask(mut self, mask: u8) -> Self {
        self.button_mask = mask;
        self
    }

    #[must_use]
    pub const fn tick_hz(&self) -> u16 {
        self.tick_hz
    }

    /// Ticks in one countdown minute.
    #[must_use]
    pub const fn ticks_per_minute(&self) -> u16 {
        self.tick_hz * 60
    }

    #[must_use]
    pub const fn shutdown_grace_ticks(&self) -> u32 {
        self.shutdown_grace_ticks
    }

    #[must_use]
    pub const fn power_off_grace_ticks(&self) -> u32 {
        self.power_off_grace_ticks
    }

    #[must_use]
    pub const fn fallback_sleep_minutes(&self) -> u16 {
        self.fallback_sleep_minutes
    }

    #[must_use]
    pub const fn button_mask(&self) -> u8 {
        self.button_mask
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_matches_tick_budget() {
        let config = ControllerConfig::standard();
        assert_eq!(config.tick_hz(), 100);
        assert_eq!(config.ticks_per_minute(), TICKS_PER_MINUTE);
        assert_eq!(config.shutdown_grace_ticks(), 300);
        assert_eq!(config.power_off_grace_ticks(), 100);
        assert_eq!(config.fallback_sleep_minutes(), 1_440);
        assert_eq!(config.button_mask(), BUTTON_MASK);
    }

    #[test]
    fn overrides_convert_durations_to_ticks() {
        let config = ControllerConfig::standard()
            .with_shutdown_grace(Duration::from_millis(250))
            .with_power_off_grace(Duration::ZERO)
            .with_fallback_sleep_minutes(5);
        assert_eq!(config.shutdown_grace_ticks(), 25);
        assert_eq!(config.power_off_grace_ticks(), 0);
        assert_eq!(config.fallback_sleep_minutes(), 5);
    }

    #[test]
    fn ticks_for_rounds_down_partial_ticks() {
        assert_eq!(ticks_for(Duration::from_millis(19), TICK_HZ), 1);
        assert_eq!(ticks_for(Duration::from_secs(60), TICK_HZ), 6_000);
    }

    #[test]
    fn ticks_for_saturates_on_huge_durations() {
        assert_eq!(ticks_for(Duration::from_secs(u64::MAX), TICK_HZ), u32::MAX);
    }

    #[test]
    fn button_mask_can_be_moved() {
        let config = ControllerConfig::standard().with_button_mask(1 << 3);
        assert_eq!(config.button_mask(), 1 << 3);
        assert_eq!(config.fallback_sleep_minutes(), FALLBACK_SLEEP_MINUTES);
    }
}
