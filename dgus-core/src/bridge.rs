//! Foreground engine
//!
//! [`Bridge`] owns the foreground half of every port (assembler, reply
//! buffer, settle counter) plus the VP memory. The firmware calls
//! [`Bridge::tick`] with elapsed time and [`Bridge::process`] from its main
//! loop. Each call services every settled port once, handling at most one
//! frame per port, then runs the 0x0F00 upload poll when it is due.

use heapless::Vec;

use dgus_hal::VpMemory;
use dgus_protocol::messages::append_crc;
use dgus_protocol::{FrameAssembler, FrameBuf, FrameError};

use crate::config::{BridgeConfig, ConfigError, PortConfig, MAX_PORTS};
use crate::dispatch::{dispatch, read_response, DispatchError, DispatchOutcome};
use crate::port::{Counter, PortLink, StatsSnapshot, TxError};

/// VP word holding the upload trigger (magic in the high byte)
pub const UPLOAD_TRIGGER: u16 = 0x0F00;

/// VP word holding the upload address low byte and word count
pub const UPLOAD_PARAMS: u16 = 0x0F01;

/// High byte of [`UPLOAD_TRIGGER`] that requests an upload
pub const UPLOAD_MAGIC: u8 = 0x5A;

/// Starts an idle transmitter
///
/// Called when a port's Tx ring goes from idle to busy. On interrupt-driven
/// hardware this pends the transmit interrupt; a task-based driver hands
/// queued bytes to its writer through [`PortLink::drain_tx`] without
/// blocking, since the bridge keeps queuing the rest of the reply after
/// this returns.
pub trait TxStart {
    fn start(&mut self, port: u8, link: &PortLink);
}

impl<F: FnMut(u8, &PortLink)> TxStart for F {
    fn start(&mut self, port: u8, link: &PortLink) {
        self(port, link)
    }
}

/// Result of one upload poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// No upload requested
    Idle,
    /// Frame sent to `ports` upload-enabled ports
    Uploaded { address: u16, count: u8, ports: u8 },
    /// Upload requested but could not be built; triggers were cleared
    Rejected { address: u16, count: u8, error: DispatchError },
    /// Trigger registers could not be accessed
    Unavailable,
}

/// Something worth reporting from [`Bridge::process_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeEvent {
    /// A frame was executed
    Dispatched { port: u8, outcome: DispatchOutcome },
    /// A complete frame was dropped
    Dropped { port: u8, error: DispatchError },
    /// Framing was abandoned mid-frame
    Framing { port: u8, error: FrameError },
    /// A reply or upload could not be queued in full
    Backpressure { port: u8 },
    /// The upload poll ran and found a request
    Upload(PollOutcome),
}

/// Foreground state of one port
struct Port<'a> {
    config: PortConfig,
    link: &'a PortLink,
    assembler: FrameAssembler,
    response: FrameBuf,
    settle_ms: u32,
}

/// The frame engine for all ports
pub struct Bridge<'a, M: VpMemory, K: TxStart> {
    ports: Vec<Port<'a>, MAX_PORTS>,
    vp: M,
    kick: K,
    poll_interval_ms: u32,
    poll_elapsed_ms: u32,
    tx_spin_budget: u32,
}

impl<'a, M: VpMemory, K: TxStart> Bridge<'a, M, K> {
    /// Build a bridge for `config`
    ///
    /// `links[i]` serves `config.ports[i]`. Every port starts with its
    /// configured settle delay armed.
    pub fn new(
        config: &BridgeConfig,
        links: &'a [PortLink],
        vp: M,
        kick: K,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut ports = Vec::new();
        for (i, port) in config.ports.iter().enumerate() {
            let link = links.get(i).ok_or(ConfigError::MissingLink(port.id))?;
            ports
                .push(Port {
                    config: *port,
                    link,
                    assembler: FrameAssembler::new(),
                    response: FrameBuf::new(),
                    settle_ms: port.settle_ms,
                })
                .map_err(|_| ConfigError::TooManyPorts)?;
        }

        Ok(Self {
            ports,
            vp,
            kick,
            poll_interval_ms: config.poll_interval_ms,
            poll_elapsed_ms: 0,
            tx_spin_budget: config.tx_spin_budget,
        })
    }

    pub fn vp(&self) -> &M {
        &self.vp
    }

    pub fn vp_mut(&mut self) -> &mut M {
        &mut self.vp
    }

    /// Configuration of every port, in service order
    pub fn ports(&self) -> impl Iterator<Item = &PortConfig> + '_ {
        self.ports.iter().map(|p| &p.config)
    }

    /// Configuration of a port
    pub fn port_config(&self, id: u8) -> Option<&PortConfig> {
        self.find(id).map(|p| &p.config)
    }

    /// Counters of a port
    pub fn stats(&self, id: u8) -> Option<StatsSnapshot> {
        self.find(id).map(|p| p.link.stats().snapshot())
    }

    /// Port is past its settle delay
    pub fn is_settled(&self, id: u8) -> Option<bool> {
        self.find(id).map(|p| p.settle_ms == 0)
    }

    fn find(&self, id: u8) -> Option<&Port<'a>> {
        self.ports.iter().find(|p| p.config.id == id)
    }

    /// Advance time by `elapsed_ms`
    pub fn tick(&mut self, elapsed_ms: u32) {
        for port in self.ports.iter_mut() {
            port.settle_ms = port.settle_ms.saturating_sub(elapsed_ms);
        }
        self.poll_elapsed_ms = self.poll_elapsed_ms.saturating_add(elapsed_ms);
    }

    /// Queue raw bytes on a port
    ///
    /// Stops at the first byte that cannot be queued.
    pub fn send(&mut self, id: u8, bytes: &[u8]) -> Result<(), TxError> {
        let port = self
            .ports
            .iter()
            .find(|p| p.config.id == id)
            .ok_or(TxError::UnknownPort(id))?;
        transmit(port.link, id, bytes, &mut self.kick, self.tx_spin_budget)
    }

    /// Service all ports and the upload poll, discarding events
    pub fn process(&mut self) {
        self.process_with(|_| {});
    }

    /// Service all ports and the upload poll, reporting events
    pub fn process_with(&mut self, mut on_event: impl FnMut(BridgeEvent)) {
        for port in self.ports.iter_mut() {
            if port.settle_ms > 0 {
                continue;
            }
            service_port(
                port,
                &mut self.vp,
                &mut self.kick,
                self.tx_spin_budget,
                &mut on_event,
            );
        }

        if self.poll_elapsed_ms >= self.poll_interval_ms {
            self.poll_elapsed_ms = 0;
            match self.poll_upload_with(&mut on_event) {
                PollOutcome::Idle => {}
                outcome => on_event(BridgeEvent::Upload(outcome)),
            }
        }
    }

    /// Check the upload trigger now
    ///
    /// When the high byte of VP 0x0F00 is 0x5A, reads `count` (low byte of
    /// 0x0F01) words starting at `(low byte of 0x0F00) : (high byte of
    /// 0x0F01)` and sends them as a read response to every upload-enabled
    /// port, with a CRC trailer where the port uses one. Both trigger words
    /// are then cleared.
    pub fn poll_upload(&mut self) -> PollOutcome {
        self.poll_upload_with(&mut |_| {})
    }

    fn poll_upload_with(&mut self, on_event: &mut impl FnMut(BridgeEvent)) -> PollOutcome {
        let (trigger, params) = match (
            self.vp.read_word(UPLOAD_TRIGGER),
            self.vp.read_word(UPLOAD_PARAMS),
        ) {
            (Ok(t), Ok(p)) => (t, p),
            _ => return PollOutcome::Unavailable,
        };
        if (trigger >> 8) as u8 != UPLOAD_MAGIC {
            return PollOutcome::Idle;
        }

        let address = ((trigger & 0x00FF) << 8) | (params >> 8);
        let count = params as u8;

        let mut frame = FrameBuf::new();
        let outcome = match read_response(address, count, false, &mut self.vp, &mut frame) {
            Ok(()) => {
                let sent = self.fan_out(&frame, on_event);
                PollOutcome::Uploaded {
                    address,
                    count,
                    ports: sent,
                }
            }
            Err(error) => PollOutcome::Rejected {
                address,
                count,
                error,
            },
        };

        let cleared = self
            .vp
            .write_word(UPLOAD_TRIGGER, 0)
            .and_then(|()| self.vp.write_word(UPLOAD_PARAMS, 0));
        if cleared.is_err() {
            return PollOutcome::Unavailable;
        }
        outcome
    }

    /// Send a prepared read response to each upload-enabled port
    fn fan_out(&mut self, frame: &FrameBuf, on_event: &mut impl FnMut(BridgeEvent)) -> u8 {
        let mut sent = 0;
        for port in self.ports.iter_mut().filter(|p| p.config.upload) {
            let id = port.config.id;
            port.response.clone_from(frame);
            if port.config.crc && append_crc(&mut port.response).is_err() {
                port.link.stats().bump(Counter::Dropped);
                on_event(BridgeEvent::Dropped {
                    port: id,
                    error: DispatchError::Frame(FrameError::ResponseTooLarge),
                });
                continue;
            }
            match transmit(
                port.link,
                id,
                &port.response,
                &mut self.kick,
                self.tx_spin_budget,
            ) {
                Ok(()) => sent += 1,
                Err(_) => on_event(BridgeEvent::Backpressure { port: id }),
            }
        }
        sent
    }
}

/// Feed one port's received bytes until a frame completes or the ring runs dry
fn service_port<M: VpMemory, K: TxStart>(
    port: &mut Port<'_>,
    vp: &mut M,
    kick: &mut K,
    spin_budget: u32,
    on_event: &mut impl FnMut(BridgeEvent),
) {
    let id = port.config.id;

    while let Some(byte) = port.link.try_dequeue_rx_byte() {
        match port.assembler.feed(byte) {
            Ok(false) => {}
            Ok(true) => break,
            Err(error) => {
                port.link.stats().bump(framing_counter(error));
                on_event(BridgeEvent::Framing { port: id, error });
            }
        }
    }

    let Some(frame) = port.assembler.frame() else {
        return;
    };
    let result = dispatch(&port.config, &frame, vp, &mut port.response);
    port.assembler.reset();

    match result {
        Ok(outcome) => {
            port.link.stats().bump(Counter::Frames);
            on_event(BridgeEvent::Dispatched { port: id, outcome });
            if !port.response.is_empty()
                && transmit(port.link, id, &port.response, kick, spin_budget).is_err()
            {
                on_event(BridgeEvent::Backpressure { port: id });
            }
        }
        Err(error) => {
            let counter = match error {
                DispatchError::Frame(FrameError::CrcMismatch) => Counter::CrcErrors,
                _ => Counter::Dropped,
            };
            port.link.stats().bump(counter);
            on_event(BridgeEvent::Dropped { port: id, error });
        }
    }
}

fn framing_counter(error: FrameError) -> Counter {
    match error {
        FrameError::Resync => Counter::Resyncs,
        FrameError::LengthOutOfRange(_) => Counter::LengthErrors,
        FrameError::UnknownCommand(_) => Counter::UnknownCommands,
        _ => Counter::Dropped,
    }
}

/// Queue `bytes` on a link, starting the transmitter when it was idle
fn transmit<K: TxStart>(
    link: &PortLink,
    id: u8,
    bytes: &[u8],
    kick: &mut K,
    spin_budget: u32,
) -> Result<(), TxError> {
    for &byte in bytes {
        if link.enqueue_tx_byte(byte, spin_budget)? {
            kick.start(id, link);
        }
    }
    Ok(())
}
