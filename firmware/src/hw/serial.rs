//! USART1 link to the computer's serial console.
//!
//! Reception is interrupt-buffered so bytes that arrive during a blocking
//! grace period are kept for the main loop. Errors are logged and otherwise
//! treated as "no byte".

use embassy_stm32::Peri;
use embassy_stm32::peripherals::{PB6, PB7, USART1};
use embassy_stm32::usart::{
    BufferedInterruptHandler, BufferedUart, Config as UartConfig, DataBits, Error as UartError,
    Parity, StopBits,
};
use embedded_io::{Read, ReadReady, Write};
use sleeptimer_core::power::SerialLink;
use static_cell::StaticCell;

const UART_TX_BUFFER_SIZE: usize = 64;
/// Holds the console output of one shutdown grace period: the respawned
/// getty's banner and login prompt, a few hundred bytes. Anything beyond
/// that is console noise; it is dropped and reported as an overrun.
const UART_RX_BUFFER_SIZE: usize = 1024;
const CONSOLE_BAUD: u32 = 115_200;

static UART_TX_BUFFER: StaticCell<[u8; UART_TX_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_RX_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART1 => BufferedInterruptHandler<USART1>;
});

pub struct UartLink {
    uart: BufferedUart<'static>,
}

impl UartLink {
    pub fn new(
        usart: Peri<'static, USART1>,
        tx_pin: Peri<'static, PB6>,
        rx_pin: Peri<'static, PB7>,
    ) -> Self {
        let mut config = UartConfig::default();
        config.baudrate = CONSOLE_BAUD;
        config.data_bits = DataBits::DataBits8;
        config.stop_bits = StopBits::STOP1;
        config.parity = Parity::ParityNone;

        let uart = BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            UART_TX_BUFFER.init([0; UART_TX_BUFFER_SIZE]),
            UART_RX_BUFFER.init([0; UART_RX_BUFFER_SIZE]),
            UartIrqs,
            config,
        )
        .expect("failed to initialize console UART");

        Self { uart }
    }
}

impl SerialLink for UartLink {
    fn receive_byte(&mut self) -> Option<u8> {
        match self.uart.read_ready() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(UartError::Overrun) => {
                defmt::warn!("serial: receive buffer overrun, console bytes dropped");
                return None;
            }
            Err(_) => {
                defmt::warn!("serial: UART receive error");
                return None;
            }
        }

        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(_) => {
                defmt::warn!("serial: UART read error");
                None
            }
        }
    }

    fn send_byte(&mut self, byte: u8) {
        self.send_sequence(&[byte]);
    }

    fn send_sequence(&mut self, bytes: &[u8]) {
        if self.uart.write_all(bytes).is_err() {
            defmt::warn!("serial: UART write error");
            return;
        }
        if self.uart.flush().is_err() {
            defmt::warn!("serial: UART flush error");
        }
    }
}
