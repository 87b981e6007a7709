//! Per-port transport
//!
//! A [`PortLink`] is the part of a port shared with interrupt handlers: the
//! Rx and Tx rings, the transmitter busy flag and the statistics counters.
//! It is built in a `static` and never moves.
//!
//! ```text
//!  RX IRQ ──on_rx_byte──▶ [Rx ring] ──try_dequeue_rx_byte──▶ foreground
//!  TX IRQ ◀─on_tx_complete─ [Tx ring] ◀──enqueue_tx_byte──── foreground
//! ```

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use dgus_hal::UartPeripheral;

use crate::ring::{Overrun, SharedRing};

/// Rx ring capacity per port
pub const RX_RING_SIZE: usize = 1024;

/// Tx ring capacity per port
pub const TX_RING_SIZE: usize = 256;

/// Transmit errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Tx ring stayed full for the whole retry budget
    Backpressure,
    /// No port with this identifier
    UnknownPort(u8),
}

/// Event counters for one port
///
/// Updated from both interrupt and foreground context; read at any time
/// with [`PortStats::snapshot`].
#[derive(Debug, Default)]
pub struct PortStats {
    frames: AtomicU32,
    resyncs: AtomicU32,
    length_errors: AtomicU32,
    unknown_commands: AtomicU32,
    crc_errors: AtomicU32,
    dropped: AtomicU32,
    rx_overruns: AtomicU32,
    tx_overruns: AtomicU32,
}

/// Point-in-time copy of [`PortStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Frames dispatched successfully
    pub frames: u32,
    /// Header sequences abandoned after the first byte
    pub resyncs: u32,
    /// LENGTH bytes out of range
    pub length_errors: u32,
    /// Command bytes the assembler rejected
    pub unknown_commands: u32,
    /// Frames dropped on CRC mismatch
    pub crc_errors: u32,
    /// Frames dropped for any other reason
    pub dropped: u32,
    /// Received bytes lost to a full Rx ring
    pub rx_overruns: u32,
    /// Bytes lost to Tx backpressure
    pub tx_overruns: u32,
}

/// Which counter to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Frames,
    Resyncs,
    LengthErrors,
    UnknownCommands,
    CrcErrors,
    Dropped,
    RxOverruns,
    TxOverruns,
}

impl PortStats {
    pub const fn new() -> Self {
        Self {
            frames: AtomicU32::new(0),
            resyncs: AtomicU32::new(0),
            length_errors: AtomicU32::new(0),
            unknown_commands: AtomicU32::new(0),
            crc_errors: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            rx_overruns: AtomicU32::new(0),
            tx_overruns: AtomicU32::new(0),
        }
    }

    pub(crate) fn bump(&self, counter: Counter) {
        let slot = match counter {
            Counter::Frames => &self.frames,
            Counter::Resyncs => &self.resyncs,
            Counter::LengthErrors => &self.length_errors,
            Counter::UnknownCommands => &self.unknown_commands,
            Counter::CrcErrors => &self.crc_errors,
            Counter::Dropped => &self.dropped,
            Counter::RxOverruns => &self.rx_overruns,
            Counter::TxOverruns => &self.tx_overruns,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            length_errors: self.length_errors.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            crc_errors: self.crc_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rx_overruns: self.rx_overruns.load(Ordering::Relaxed),
            tx_overruns: self.tx_overruns.load(Ordering::Relaxed),
        }
    }
}

/// Interrupt-shared half of a port
pub struct PortLink {
    rx: SharedRing<RX_RING_SIZE>,
    tx: SharedRing<TX_RING_SIZE>,
    tx_busy: AtomicBool,
    stats: PortStats,
}

impl Default for PortLink {
    fn default() -> Self {
        Self::new()
    }
}

impl PortLink {
    pub const fn new() -> Self {
        Self {
            rx: SharedRing::new(),
            tx: SharedRing::new(),
            tx_busy: AtomicBool::new(false),
            stats: PortStats::new(),
        }
    }

    /// Receive interrupt: store one byte
    ///
    /// A full ring drops the byte and counts an Rx overrun.
    pub fn on_rx_byte(&self, byte: u8) {
        if self.rx.push(byte).is_err() {
            self.stats.bump(Counter::RxOverruns);
        }
    }

    /// Transmit-complete interrupt: next byte to send
    ///
    /// Returns `None` and marks the transmitter idle once the ring is empty.
    pub fn on_tx_complete(&self) -> Option<u8> {
        self.tx.with(|ring| {
            let next = ring.pop();
            if next.is_none() {
                self.tx_busy.store(false, Ordering::Release);
            }
            next
        })
    }

    /// Move up to `out.len()` queued bytes into `out`
    ///
    /// For transmitters fed in blocks rather than from a per-byte interrupt.
    /// The transmitter stays busy while bytes remain in the ring and goes
    /// idle once it is empty, so the next enqueue restarts it.
    pub fn drain_tx(&self, out: &mut [u8]) -> usize {
        self.tx.with(|ring| {
            let mut n = 0;
            while n < out.len() {
                match ring.pop() {
                    Some(byte) => {
                        out[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            if ring.is_empty() {
                self.tx_busy.store(false, Ordering::Release);
            }
            n
        })
    }

    /// Queue one byte for transmission
    ///
    /// Retries up to `spin_budget` times while the ring is full. Returns
    /// `Ok(true)` when the transmitter was idle and must be started.
    pub fn enqueue_tx_byte(&self, byte: u8, spin_budget: u32) -> Result<bool, TxError> {
        let mut retries = 0;
        loop {
            let queued = self.tx.with(|ring| {
                ring.push(byte)?;
                Ok::<bool, Overrun>(!self.tx_busy.swap(true, Ordering::AcqRel))
            });
            match queued {
                Ok(start) => return Ok(start),
                Err(Overrun) if retries < spin_budget => {
                    retries += 1;
                    core::hint::spin_loop();
                }
                Err(Overrun) => {
                    self.stats.bump(Counter::TxOverruns);
                    return Err(TxError::Backpressure);
                }
            }
        }
    }

    /// Take the oldest received byte
    pub fn try_dequeue_rx_byte(&self) -> Option<u8> {
        self.rx.pop()
    }

    /// Received bytes are waiting
    pub fn rx_available(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Bytes queued but not yet handed to the transmitter
    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    /// Transmitter is running
    pub fn tx_busy(&self) -> bool {
        self.tx_busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &PortStats {
        &self.stats
    }

    /// Receive interrupt helper: move the data register into the Rx ring
    pub fn service_rx<U: UartPeripheral>(&self, uart: &mut U) {
        self.on_rx_byte(uart.read_rx());
    }

    /// Transmit interrupt helper: load the next queued byte, if any
    pub fn service_tx<U: UartPeripheral>(&self, uart: &mut U) {
        if let Some(byte) = self.on_tx_complete() {
            uart.write_tx(byte);
        }
    }
}
