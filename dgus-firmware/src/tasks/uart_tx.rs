//! UART transmit task
//!
//! Empties a port's TX stage into the buffered UART driver. One instance
//! per UART.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use dgus_core::PortLink;

use crate::transport::{refill, TxStage};

/// Bytes written to the driver per await
const TX_BUF_SIZE: usize = 64;

/// UART TX task - waits for staged bytes and writes them out
#[embassy_executor::task(pool_size = 2)]
pub async fn uart_tx_task(
    port: u8,
    mut tx: BufferedUartTx,
    link: &'static PortLink,
    stage: &'static TxStage,
) {
    info!("UART{} TX task started", port);

    let mut buf = [0u8; TX_BUF_SIZE];

    loop {
        let n = stage.read(&mut buf).await;
        if let Err(e) = tx.write_all(&buf[..n]).await {
            warn!("UART{} write failed: {:?}", port, e);
        }
        trace!("UART{} TX: {} bytes", port, n);

        // Pick up whatever the stage had no room for earlier
        refill(link, stage);
    }
}
