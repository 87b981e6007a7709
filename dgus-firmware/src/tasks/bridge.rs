//! Bridge task
//!
//! Runs the frame engine: wakes on received bytes or every tick, advances
//! the settle and poll timers, and services all ports.

use defmt::*;
use embassy_futures::select::select;
use embassy_time::{Duration, Instant, Ticker};

use dgus_core::config::MAX_PORTS;
use dgus_core::{Bridge, BridgeEvent, VpRam};

use crate::channels::RX_READY;
use crate::transport::UartKick;

/// Tick interval in milliseconds
pub const TICK_INTERVAL_MS: u64 = 1;

/// Interval between statistics log lines
const STATS_INTERVAL_MS: u64 = 10_000;

/// VP space size in 32-bit cells (two words each)
pub const VP_CELLS: usize = 0x1000;

/// The bridge as wired on this board
pub type BoardBridge = Bridge<'static, &'static mut VpRam<VP_CELLS>, UartKick>;

/// Bridge task - frame processing and VP upload polling
#[embassy_executor::task]
pub async fn bridge_task(mut bridge: BoardBridge) {
    info!("Bridge task started");

    let port_ids: heapless::Vec<u8, MAX_PORTS> = bridge.ports().map(|p| p.id).collect();

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut last = Instant::now();
    let mut last_stats = last;

    loop {
        select(RX_READY.wait(), ticker.next()).await;

        // Carry sub-millisecond remainders into the next round
        let elapsed_ms = last.elapsed().as_millis();
        last += Duration::from_millis(elapsed_ms);
        bridge.tick(elapsed_ms as u32);

        bridge.process_with(log_event);

        if last_stats.elapsed().as_millis() >= STATS_INTERVAL_MS {
            last_stats = Instant::now();
            for &id in &port_ids {
                if let Some(stats) = bridge.stats(id) {
                    debug!("UART{} stats: {:?}", id, stats);
                }
            }
        }
    }
}

fn log_event(event: BridgeEvent) {
    match event {
        BridgeEvent::Dispatched { port, outcome } => {
            debug!("UART{}: {:?}", port, outcome);
        }
        BridgeEvent::Dropped { port, error } => {
            warn!("UART{}: frame dropped: {:?}", port, error);
        }
        BridgeEvent::Framing { port, error } => {
            trace!("UART{}: framing reset: {:?}", port, error);
        }
        BridgeEvent::Backpressure { port } => {
            warn!("UART{}: Tx ring full, output truncated", port);
        }
        BridgeEvent::Upload(outcome) => {
            info!("VP upload: {:?}", outcome);
        }
    }
}
