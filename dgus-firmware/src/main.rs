//! DGUS VP bridge firmware
//!
//! Bridges host UART links to an emulated DGUS variable (VP) space on an
//! RP2040. Hosts read and write VP words with 0x82/0x83 frames; a write of
//! 0x5A into the high byte of VP 0x0F00 pushes a block of VP words to every
//! upload-enabled port.
//!
//! Board wiring: port 2 on UART0 (GPIO0 TX, GPIO1 RX), port 3 on UART1
//! (GPIO4 TX, GPIO5 RX).

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::uart::{self, BufferedInterruptHandler, Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use dgus_core::config::{BridgeConfig, PortConfig, MAX_PORTS};
use dgus_core::{Bridge, PortLink, VpRam};
use dgus_hal::uart as hal;

use crate::config::load_config;
use crate::tasks::VP_CELLS;
use crate::transport::{UartKick, TX_STAGES};

mod channels;
mod config;
mod tasks;
mod transport;

/// Port served by UART0
const UART0_PORT: u8 = 2;

/// Port served by UART1
const UART1_PORT: u8 = 3;

/// Driver-side buffer size per direction
const UART_BUF_SIZE: usize = 256;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

/// Interrupt-shared port state, indexed like `BridgeConfig::ports`
static LINKS: [PortLink; MAX_PORTS] = [
    PortLink::new(),
    PortLink::new(),
    PortLink::new(),
    PortLink::new(),
];

// Static cells for UART buffers (must live forever)
static UART0_TX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static UART0_RX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static UART1_TX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static UART1_RX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();

/// Emulated VP memory
static VP_MEMORY: StaticCell<VpRam<VP_CELLS>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("DGUS bridge starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();
    for port in &config.ports {
        info!(
            "UART{}: {} baud, response={}, crc={}, upload={}, settle={}ms",
            port.id, port.baudrate, port.response, port.crc, port.upload, port.settle_ms
        );
    }

    let mut kick = UartKick::new();

    if let Some((index, port)) = find_port(&config, UART0_PORT) {
        let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config(port));
        let uart = uart.into_buffered(
            Irqs,
            UART0_TX_BUF.init([0u8; UART_BUF_SIZE]),
            UART0_RX_BUF.init([0u8; UART_BUF_SIZE]),
        );
        let (tx, rx) = uart.split();
        let stage = &TX_STAGES[0];
        kick.attach(port.id, stage);
        spawner
            .spawn(tasks::uart_rx_task(port.id, rx, &LINKS[index]))
            .unwrap();
        spawner
            .spawn(tasks::uart_tx_task(port.id, tx, &LINKS[index], stage))
            .unwrap();
        info!("UART0 initialized for port {}", port.id);
    }

    if let Some((index, port)) = find_port(&config, UART1_PORT) {
        let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, uart_config(port));
        let uart = uart.into_buffered(
            Irqs,
            UART1_TX_BUF.init([0u8; UART_BUF_SIZE]),
            UART1_RX_BUF.init([0u8; UART_BUF_SIZE]),
        );
        let (tx, rx) = uart.split();
        let stage = &TX_STAGES[1];
        kick.attach(port.id, stage);
        spawner
            .spawn(tasks::uart_rx_task(port.id, rx, &LINKS[index]))
            .unwrap();
        spawner
            .spawn(tasks::uart_tx_task(port.id, tx, &LINKS[index], stage))
            .unwrap();
        info!("UART1 initialized for port {}", port.id);
    }

    for port in config
        .ports
        .iter()
        .filter(|p| p.id != UART0_PORT && p.id != UART1_PORT)
    {
        warn!("UART{} has no pins on this board, port stays idle", port.id);
    }

    let vp = VP_MEMORY.init(VpRam::new());
    let bridge = unwrap!(Bridge::new(&config, &LINKS, vp, kick));

    spawner.spawn(tasks::bridge_task(bridge)).unwrap();

    info!("All tasks spawned, DGUS bridge running");
}

/// Position and settings of a port in the configuration
fn find_port(config: &BridgeConfig, id: u8) -> Option<(usize, &PortConfig)> {
    config.ports.iter().enumerate().find(|(_, p)| p.id == id)
}

/// embassy-rp line settings for a port
fn uart_config(port: &PortConfig) -> UartConfig {
    let settings = port.uart();
    let mut config = UartConfig::default();
    config.baudrate = settings.baudrate;
    config.data_bits = match settings.data_bits {
        hal::DataBits::Seven => uart::DataBits::DataBits7,
        hal::DataBits::Eight => uart::DataBits::DataBits8,
    };
    config.parity = match settings.parity {
        hal::Parity::None => uart::Parity::ParityNone,
        hal::Parity::Even => uart::Parity::ParityEven,
        hal::Parity::Odd => uart::Parity::ParityOdd,
    };
    config.stop_bits = match settings.stop_bits {
        hal::StopBits::One => uart::StopBits::STOP1,
        hal::StopBits::Two => uart::StopBits::STOP2,
    };
    config
}
