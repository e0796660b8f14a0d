use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_stm32 as hal;
use sleeptimer_core::{ControllerConfig, PowerController, SleepTimer};

use crate::hw::{self, Board, CoreClock, FirmwareTicks};
use crate::telemetry::TelemetryLog;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let peripherals = hal::init(hal::Config::default());
    let Board {
        leds,
        relay,
        mut serial,
    } = Board::new(peripherals);

    hw::tick::start();

    let config = ControllerConfig::standard();
    let power = PowerController::new(CoreClock::new(), relay, leds, config);
    let mut app = SleepTimer::new(power);
    app.boot();
    defmt::info!("sleep timer up: {}", config);

    let ticks = FirmwareTicks::new();
    let mut log = TelemetryLog::new();
    app.run(&ticks, &mut serial, |app, pass| {
        if let Some(command) = pass.command {
            defmt::debug!("command: {}", command);
        }
        log.flush(app.telemetry());
    })
}
