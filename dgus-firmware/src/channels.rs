//! Inter-task signals
//!
//! RX tasks store bytes straight into the port rings; the only thing they
//! need to tell the bridge task is that there is something to look at.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Raised by any RX task after bytes were queued
pub static RX_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
