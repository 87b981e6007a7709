//! Configuration type definitions
//!
//! Port and bridge settings. Built from defaults or from `bridge.toml`
//! (see [`super::toml`]).

use heapless::Vec;

use dgus_hal::{DataBits, Parity, StopBits, UartConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of UART ports on one bridge
pub const MAX_PORTS: usize = 4;

/// Lowest valid port identifier
pub const MIN_PORT_ID: u8 = 2;

/// Highest valid port identifier
pub const MAX_PORT_ID: u8 = 5;

/// Default VP trigger poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10;

/// Default number of retries before a full Tx ring reports backpressure
pub const DEFAULT_TX_SPIN_BUDGET: u32 = 10_000;

/// Default settle delay before a port is first serviced
pub const DEFAULT_SETTLE_MS: u32 = 5;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Port identifier outside MIN_PORT_ID..=MAX_PORT_ID
    InvalidPortId(u8),
    /// Two ports share an identifier
    DuplicatePort(u8),
    /// More than MAX_PORTS ports
    TooManyPorts,
    /// Baud rate of zero
    InvalidBaudrate(u8),
    /// No transport link supplied for this port
    MissingLink(u8),
}

/// Per-port settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PortConfig {
    /// Port identifier (2..=5)
    pub id: u8,
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Acknowledge VP writes
    pub response: bool,
    /// Frames on this port carry a CRC16 trailer
    pub crc: bool,
    /// Receive 0x0F00 upload frames
    pub upload: bool,
    /// Delay after init before the port is serviced
    pub settle_ms: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl PortConfig {
    /// Port with default flags
    pub const fn new(id: u8, baudrate: u32) -> Self {
        Self {
            id,
            baudrate,
            response: true,
            crc: false,
            upload: true,
            settle_ms: DEFAULT_SETTLE_MS,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Serial line settings for the HAL
    pub fn uart(&self) -> UartConfig {
        UartConfig {
            baudrate: self.baudrate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new(MIN_PORT_ID, 115200)
    }
}

/// Bridge-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BridgeConfig {
    /// Enabled ports
    pub ports: Vec<PortConfig, MAX_PORTS>,
    /// Interval between 0x0F00 trigger checks
    pub poll_interval_ms: u32,
    /// Retries on a full Tx ring before giving up on a byte
    pub tx_spin_budget: u32,
}

impl BridgeConfig {
    /// Empty configuration with default timing
    pub fn new() -> Self {
        Self {
            ports: Vec::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tx_spin_budget: DEFAULT_TX_SPIN_BUDGET,
        }
    }

    /// Find a port by identifier
    pub fn find_port(&self, id: u8) -> Option<&PortConfig> {
        self.ports.iter().find(|p| p.id == id)
    }

    /// Add a port, rejecting duplicates and bad identifiers
    pub fn add_port(&mut self, port: PortConfig) -> Result<(), ConfigError> {
        validate_port(&port)?;
        if self.find_port(port.id).is_some() {
            return Err(ConfigError::DuplicatePort(port.id));
        }
        self.ports.push(port).map_err(|_| ConfigError::TooManyPorts)
    }

    /// Check every port
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, port) in self.ports.iter().enumerate() {
            validate_port(port)?;
            if self.ports[..i].iter().any(|p| p.id == port.id) {
                return Err(ConfigError::DuplicatePort(port.id));
            }
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    /// UART2 at 115200 and UART3 at 1612800, acks on, CRC off, upload on
    fn default() -> Self {
        let mut ports = Vec::new();
        let _ = ports.push(PortConfig::new(2, 115200));
        let _ = ports.push(PortConfig::new(3, 1_612_800));
        Self {
            ports,
            ..Self::new()
        }
    }
}

fn validate_port(port: &PortConfig) -> Result<(), ConfigError> {
    if !(MIN_PORT_ID..=MAX_PORT_ID).contains(&port.id) {
        return Err(ConfigError::InvalidPortId(port.id));
    }
    if port.baudrate == 0 {
        return Err(ConfigError::InvalidBaudrate(port.id));
    }
    Ok(())
}
