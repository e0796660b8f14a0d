#![no_std]

// Shared logic for the sleep timer appliance.
//
// Every state machine lives here so the firmware image and the host emulator
// run the same code. The crate avoids the standard library and leaves pins,
// clocks and the UART to the traits in `power` and `tick`.

pub mod app;
pub mod config;
pub mod countdown;
pub mod debounce;
pub mod indicator;
pub mod matcher;
pub mod power;
pub mod sim;
pub mod telemetry;
pub mod tick;

pub use app::SleepTimer;
pub use config::ControllerConfig;
pub use countdown::{CountdownClock, CountdownState, SignalMode};
pub use matcher::{Command, CommandMatcher};
pub use power::{Actions, PowerController, PowerState};
pub use tick::{SystemTick, TickSource};
