//! Embassy async tasks
//!
//! Each task runs independently and communicates via the port rings, the
//! TX stages and the RX_READY signal.

pub mod bridge;
pub mod uart_rx;
pub mod uart_tx;

pub use bridge::{bridge_task, BoardBridge, VP_CELLS};
pub use uart_rx::uart_rx_task;
pub use uart_tx::uart_tx_task;
