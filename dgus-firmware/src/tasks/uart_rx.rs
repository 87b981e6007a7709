//! UART receive task
//!
//! Moves received bytes into a port's Rx ring. One instance per UART.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use dgus_core::PortLink;

use crate::channels::RX_READY;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// UART RX task - feeds the port ring and wakes the bridge
#[embassy_executor::task(pool_size = 2)]
pub async fn uart_rx_task(port: u8, mut rx: BufferedUartRx, link: &'static PortLink) {
    info!("UART{} RX task started", port);

    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("UART{} RX: {} bytes", port, n);
                for &byte in &buf[..n] {
                    link.on_rx_byte(byte);
                }
                RX_READY.signal(());
            }
            Ok(_) => {
                // No bytes read, continue
            }
            Err(e) => {
                warn!("UART{} read error: {:?}", port, e);
            }
        }
    }
}
