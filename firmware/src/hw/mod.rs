//! Board wiring for the sleep timer on an STM32G0B1KE.
//!
//! # Pin Assignments
//!
//! - **PA0**: power button to ground, internal pull-up
//! - **PA6**: green LED, active high
//! - **PA7**: red LED, active high
//! - **PB3**: relay driver feeding the computer, active high
//! - **PB6 / PB7**: USART1 TX / RX to the computer's serial console
//!
//! The button input is parked in a static so the tick interrupt can sample
//! it; everything else is handed to the power controller by value.

use core::cell::RefCell;

use embassy_stm32::Peripherals;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use sleeptimer_core::config::BUTTON_MASK;
use sleeptimer_core::indicator::IndicatorPins;
use sleeptimer_core::power::LoadSwitch;

pub mod clock;
pub mod serial;
pub mod tick;

pub use clock::CoreClock;
pub use serial::UartLink;
pub use tick::FirmwareTicks;

static BUTTON: Mutex<CriticalSectionRawMutex, RefCell<Option<Input<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Raw key levels for the debouncer; bit set while the button is held.
pub(crate) fn sample_keys() -> u8 {
    BUTTON.lock(|button| match button.borrow().as_ref() {
        Some(pin) if pin.is_low() => BUTTON_MASK,
        _ => 0,
    })
}

/// Green and red status LEDs.
pub struct StatusLeds {
    green: Output<'static>,
    red: Output<'static>,
}

impl IndicatorPins for StatusLeds {
    fn set_levels(&mut self, green: bool, red: bool) {
        self.green.set_level(Level::from(green));
        self.red.set_level(Level::from(red));
    }
}

/// Relay switching mains to the computer.
pub struct Relay {
    pin: Output<'static>,
}

impl LoadSwitch for Relay {
    fn set_energized(&mut self, energized: bool) {
        self.pin.set_level(Level::from(energized));
    }
}

/// Peripherals owned by the main loop.
pub struct Board {
    pub leds: StatusLeds,
    pub relay: Relay,
    pub serial: UartLink,
}

impl Board {
    /// Claims the pins. All outputs start low: relay open, LEDs dark.
    pub fn new(p: Peripherals) -> Self {
        let button = Input::new(p.PA0, Pull::Up);
        BUTTON.lock(|slot| *slot.borrow_mut() = Some(button));

        Self {
            leds: StatusLeds {
                green: Output::new(p.PA6, Level::Low, Speed::Low),
                red: Output::new(p.PA7, Level::Low, Speed::Low),
            },
            relay: Relay {
                pin: Output::new(p.PB3, Level::Low, Speed::Low),
            },
            serial: UartLink::new(p.USART1, p.PB6, p.PB7),
        }
    }
}
