//! UART serial abstractions
//!
//! The bridge moves single bytes between a peripheral's data register and
//! its ring buffers from interrupt context. Chip HALs implement
//! [`UartPeripheral`] for each port they expose.

/// Data-register access for one UART
///
/// All three methods are called from the port's interrupt handler and must
/// not block.
pub trait UartPeripheral {
    /// Read the received byte out of the data register
    ///
    /// Only called after the peripheral signalled "receive data ready".
    fn read_rx(&mut self) -> u8;

    /// Load the next byte into the transmit data register
    fn write_tx(&mut self, byte: u8);

    /// Raise the transmit-complete interrupt so the handler runs once
    ///
    /// Used to restart an idle transmitter after the foreground queued data.
    fn pend_tx(&mut self);
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl UartConfig {
    /// 8N1 at the given baud rate
    pub const fn new(baudrate: u32) -> Self {
        Self {
            baudrate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new(115200)
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    One,
    Two,
}
