//! Packet engine
//!
//! Owns the link, the inbound stream buffer, the command queues and the
//! outstanding-request tracker, and exposes the four periodic activities:
//!
//! - [`PacketEngine::command_worker`]: send the next queued command if the
//!   in-flight limit allows it
//! - [`PacketEngine::fill_buffer`]: pull whatever bytes the link has
//! - [`PacketEngine::check_packet`]: extract and dispatch one frame
//! - [`PacketEngine::bin_watch`]: resend (or give up on) one timed-out request
//!
//! None of them block; each returns immediately when there is nothing to do.

use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::codec::{scan_frame, ScanOutcome};
use super::commands::{command_name, Report};
use super::{
    encode_frame, Bin, BinTracker, Command, CommandQueue, Packet, PendingCommand, Priority,
    ProtocolError, ResponseHandler, SerialLink, StreamBuffer, DEFAULT_RESPONSE_TIMEOUT_MS,
    FRAME_OVERHEAD, MAX_DATA_SIZE,
};

/// Default number of resends before a request is abandoned
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Receives packets that are not consumed by the request tracker alone
pub trait PacketListener: Send {
    /// Every command response, before it is matched to its request
    fn on_packet(&mut self, _packet: &Packet) {}

    /// Key activity report; `key` is the first payload byte
    fn on_key_event(&mut self, _key: u8) {}

    /// Fan speed report
    fn on_fan_report(&mut self, _packet: &Packet) {}

    /// Temperature sensor report
    fn on_temp_report(&mut self, _packet: &Packet) {}
}

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Age after which an unanswered command is resent
    pub response_timeout: Duration,
    /// Maximum commands on the wire without a response
    pub command_limit: usize,
    /// Resends before a command is abandoned (0 = never give up)
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            command_limit: 1,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Link counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Frames written, resends included
    pub commands_sent: u64,
    /// Responses matched to a request
    pub commands_received: u64,
    /// Requests resent after a timeout
    pub commands_resent: u64,
    /// Requests given up on after too many resends
    pub commands_abandoned: u64,
    /// Scans that discarded bytes
    pub tossed: u64,
    /// XOR of every status report byte received
    pub error_flags: u8,
    /// Key, fan and temperature reports received
    pub reports_received: u64,
    /// Bytes written to the link
    pub tx_bytes: u64,
    /// Bytes read from the link
    pub rx_bytes: u64,
}

/// Command/response state machine for one display
pub struct PacketEngine {
    link: Option<Box<dyn SerialLink>>,
    buffer: StreamBuffer,
    queue: CommandQueue,
    bins: BinTracker,
    in_flight: usize,
    current_command: Option<u8>,
    config: EngineConfig,
    stats: EngineStats,
    listener: Option<Box<dyn PacketListener>>,
}

impl PacketEngine {
    /// Create an engine with no link attached
    pub fn new(config: EngineConfig) -> Self {
        Self {
            link: None,
            buffer: StreamBuffer::new(),
            queue: CommandQueue::new(),
            bins: BinTracker::new(),
            in_flight: 0,
            current_command: None,
            config,
            stats: EngineStats::default(),
            listener: None,
        }
    }

    /// Attach an open link
    pub fn attach(&mut self, mut link: Box<dyn SerialLink>) {
        if let Err(e) = link.clear_input_buffer() {
            debug!("could not flush stale input: {}", e);
        }
        self.buffer.clear();
        self.link = Some(link);
    }

    /// Abandon all work and hand back the link, if any
    pub fn detach(&mut self) -> Option<Box<dyn SerialLink>> {
        self.abandon_all();
        self.link.take()
    }

    /// Whether a link is attached
    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// Install the receiver for reports and responses
    pub fn set_listener(&mut self, listener: Box<dyn PacketListener>) {
        self.listener = Some(listener);
    }

    /// Current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Counters since creation
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Commands written but not yet answered
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Commands waiting in the queues
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Requests tracked as outstanding
    pub fn outstanding(&self) -> usize {
        self.bins.len()
    }

    /// Most recently dispatched command code
    pub fn current_command(&self) -> Option<u8> {
        self.current_command
    }

    /// Nothing queued and nothing awaiting a response
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.bins.is_empty()
    }

    /// Submit a command.
    ///
    /// With `send_now` the frame is written immediately (it still takes an
    /// in-flight slot); otherwise it waits on the queue for `priority`.
    pub fn send_command(
        &mut self,
        command: Command,
        handler: Option<ResponseHandler>,
        priority: Priority,
        send_now: bool,
    ) -> Result<(), ProtocolError> {
        let pending = PendingCommand {
            command,
            handler,
            priority,
            attempts: 0,
        };
        if send_now {
            self.transmit_or_requeue(pending, true)
        } else {
            self.queue.push(pending);
            Ok(())
        }
    }

    /// Send the next queued command if the in-flight limit allows.
    ///
    /// Returns whether a command was written. A command the link is too
    /// busy to take goes back to the front of its queue for the next tick.
    pub fn command_worker(&mut self) -> Result<bool, ProtocolError> {
        if self.link.is_none() || self.in_flight >= self.config.command_limit {
            return Ok(false);
        }
        let Some(pending) = self.queue.pop_next() else {
            return Ok(false);
        };
        match self.transmit(pending, false)? {
            None => Ok(true),
            Some(pending) => {
                self.queue.push_front(pending);
                Ok(false)
            }
        }
    }

    /// Move available bytes from the link into the stream buffer.
    ///
    /// Reads at most one maximum-size frame per call. Returns the byte count.
    pub fn fill_buffer(&mut self) -> Result<usize, ProtocolError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(0);
        };

        let available = link
            .bytes_to_read()
            .map_err(|e| ProtocolError::Disconnected(e.to_string()))?;
        if available == 0 {
            return Ok(0);
        }

        let mut tmp = [0u8; MAX_DATA_SIZE + FRAME_OVERHEAD];
        let want = (available as usize).min(tmp.len());
        match link.read(&mut tmp[..want]) {
            Ok(n) => {
                if n > 0 {
                    trace!("rx {:02x?}", &tmp[..n]);
                    self.buffer.append(&tmp[..n]);
                    self.stats.rx_bytes += n as u64;
                }
                Ok(n)
            }
            Err(e) if is_busy(&e) => Ok(0),
            Err(e) => Err(ProtocolError::Disconnected(e.to_string())),
        }
    }

    /// Run one scan of the stream buffer and dispatch whatever it yields.
    ///
    /// Returns whether any bytes were consumed.
    pub fn check_packet(&mut self) -> bool {
        match scan_frame(&mut self.buffer) {
            ScanOutcome::NeedMore => false,
            ScanOutcome::Tossed(reason) => {
                self.stats.tossed += 1;
                debug!(?reason, "discarded inbound bytes");
                true
            }
            ScanOutcome::DeviceReport(code) => {
                self.stats.error_flags ^= code;
                warn!("Report from display: {}: {}", code, command_name(code));
                true
            }
            ScanOutcome::Frame(packet) => {
                self.dispatch(packet);
                true
            }
        }
    }

    /// One update tick: send, read, scan
    pub fn update(&mut self) -> Result<(), ProtocolError> {
        self.command_worker()?;
        self.fill_buffer()?;
        self.check_packet();
        Ok(())
    }

    /// Handle at most one request that has waited longer than the response timeout
    pub fn bin_watch(&mut self) -> Result<(), ProtocolError> {
        let Some(bin) = self
            .bins
            .take_expired(Instant::now(), self.config.response_timeout)
        else {
            return Ok(());
        };
        self.in_flight = self.in_flight.saturating_sub(1);

        let code = bin.command.code();
        let max = self.config.max_retries;
        if max > 0 && bin.attempts > max {
            self.stats.commands_abandoned += 1;
            warn!(
                "Response timeout; giving up on {} after {} attempts",
                command_name(code),
                bin.attempts
            );
            if let Some(handler) = bin.handler {
                handler(Err(ProtocolError::RetriesExhausted {
                    command: code,
                    attempts: bin.attempts,
                }));
            }
            return Ok(());
        }

        warn!("Response timeout; resending {}", command_name(code));
        self.stats.commands_resent += 1;
        let pending = PendingCommand {
            command: bin.command,
            handler: bin.handler,
            priority: bin.priority,
            attempts: bin.attempts,
        };
        if bin.send_now {
            self.transmit_or_requeue(pending, true)
        } else {
            self.queue.push(pending);
            Ok(())
        }
    }

    /// Drop every queued and outstanding command without running handlers.
    ///
    /// Returns how many were dropped.
    pub fn abandon_all(&mut self) -> usize {
        let dropped = self.queue.clear() + self.bins.clear();
        self.in_flight = 0;
        self.current_command = None;
        self.buffer.clear();
        if dropped > 0 {
            debug!(dropped, "abandoned pending commands");
        }
        dropped
    }

    /// Write one frame and track it.
    ///
    /// Hands the command back untouched when the link is momentarily busy.
    fn transmit(
        &mut self,
        pending: PendingCommand,
        send_now: bool,
    ) -> Result<Option<PendingCommand>, ProtocolError> {
        let link = self.link.as_mut().ok_or(ProtocolError::NotConnected)?;
        let frame = encode_frame(&pending.command);

        trace!("tx {:02x?}", frame);
        match link.write_all(&frame).and_then(|_| link.flush()) {
            Ok(()) => {}
            Err(e) if is_busy(&e) => {
                debug!(
                    "link busy, holding {}: {}",
                    command_name(pending.command.code()),
                    e
                );
                return Ok(Some(pending));
            }
            Err(e) => return Err(ProtocolError::Disconnected(e.to_string())),
        }

        self.stats.tx_bytes += frame.len() as u64;
        self.stats.commands_sent += 1;
        self.current_command = Some(pending.command.code());
        self.in_flight += 1;
        self.bins.register(Bin {
            command: pending.command,
            handler: pending.handler,
            priority: pending.priority,
            send_now,
            issued_at: Instant::now(),
            attempts: pending.attempts + 1,
        });
        Ok(None)
    }

    /// Immediate write; a busy link queues the command at the front instead
    fn transmit_or_requeue(
        &mut self,
        pending: PendingCommand,
        send_now: bool,
    ) -> Result<(), ProtocolError> {
        if let Some(pending) = self.transmit(pending, send_now)? {
            self.queue.push_front(pending);
        }
        Ok(())
    }

    fn dispatch(&mut self, packet: Packet) {
        if packet.is_report() {
            match Report::from_code(packet.command) {
                Some(report) => {
                    self.stats.reports_received += 1;
                    self.dispatch_report(report, &packet);
                }
                None => debug!(command = packet.command, "unknown report type"),
            }
            return;
        }
        if let Some(listener) = self.listener.as_mut() {
            listener.on_packet(&packet);
        }
        self.resolve(packet);
    }

    fn dispatch_report(&mut self, report: Report, packet: &Packet) {
        debug!(?report, "incoming report");
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        match report {
            Report::KeyActivity => match packet.data.first() {
                Some(&key) => listener.on_key_event(key),
                None => warn!("key report without payload"),
            },
            Report::FanSpeed => listener.on_fan_report(packet),
            Report::TempSensor => listener.on_temp_report(packet),
        }
    }

    fn resolve(&mut self, packet: Packet) {
        let Some(bin) = self.bins.take_match(packet.command, self.current_command) else {
            debug!(
                "response to {} does not match an outstanding request",
                command_name(packet.request_code())
            );
            return;
        };
        self.in_flight = self.in_flight.saturating_sub(1);
        self.stats.commands_received += 1;
        if let Some(handler) = bin.handler {
            handler(Ok(packet));
        }
    }
}

/// Errors that mean "try again later" rather than a lost link
fn is_busy(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}
