//! UART transmit side
//!
//! The bridge fills each port's Tx ring synchronously from the bridge task,
//! so starting a port cannot wait on the UART. [`UartKick`] instead moves
//! queued bytes into the port's [`TxStage`], a pipe that the port's
//! `uart_tx_task` empties into the buffered UART driver. Bytes that do not
//! fit in the stage stay in the ring, with the ring still marked busy, until
//! the TX task pulls them after its next write.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use heapless::Vec;

use dgus_core::{PortLink, TxStart};

/// Staging capacity per port, enough for two maximum-size replies
pub const TX_STAGE_SIZE: usize = 520;

/// Bytes moved from a ring per stage write
const CHUNK_SIZE: usize = 32;

/// Number of UARTs on the board
pub const UART_COUNT: usize = 2;

/// Bytes handed over by the bridge task, waiting for a TX task
pub type TxStage = Pipe<CriticalSectionRawMutex, TX_STAGE_SIZE>;

/// One stage per UART
pub static TX_STAGES: [TxStage; UART_COUNT] = [Pipe::new(), Pipe::new()];

/// Move as much of `link`'s Tx ring into `stage` as fits
///
/// Returns the number of bytes moved. The ring is left busy when bytes
/// remain, so later enqueues do not restart the port.
pub fn refill(link: &PortLink, stage: &TxStage) -> usize {
    let mut moved = 0;
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let room = stage.free_capacity().min(CHUNK_SIZE);
        let n = link.drain_tx(&mut chunk[..room]);
        if n == 0 {
            break;
        }
        // Only the bridge task and this port's TX task write the stage, and
        // neither yields between measuring the room and writing.
        if stage.try_write(&chunk[..n]).is_err() {
            warn!("TX stage rejected {} bytes", n);
            break;
        }
        moved += n;
        if n < room {
            break;
        }
    }
    moved
}

/// Routes each port's output to its UART's stage
pub struct UartKick {
    stages: Vec<(u8, &'static TxStage), UART_COUNT>,
}

impl UartKick {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Route a port's output to `stage`
    pub fn attach(&mut self, port: u8, stage: &'static TxStage) {
        if self.stages.push((port, stage)).is_err() {
            warn!("No room for UART{} transmitter", port);
        }
    }
}

impl TxStart for UartKick {
    fn start(&mut self, port: u8, link: &PortLink) {
        let Some(&(_, stage)) = self.stages.iter().find(|(id, _)| *id == port) else {
            // Nothing wired: discard so the ring does not stay busy
            while link.on_tx_complete().is_some() {}
            return;
        };

        let moved = refill(link, stage);
        trace!("UART{} staged {} bytes", port, moved);
    }
}
