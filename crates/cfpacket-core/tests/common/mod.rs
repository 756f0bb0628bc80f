//! In-memory serial link shared by the integration tests

#![allow(dead_code)]

use cfpacket_core::protocol::{Packet, SerialLink, RESPONSE_FLAG};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// Route engine logs to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct Wire {
    /// Everything the engine wrote
    pub written: Vec<u8>,
    /// Bytes waiting to be read by the engine
    pub inbound: Vec<u8>,
    /// Answer every written frame with an echo response
    pub auto_reply: bool,
    /// Fail reads with a broken pipe
    pub broken: bool,
    /// Time out this many writes before accepting bytes again
    pub stalled_writes: u32,
}

#[derive(Clone, Default)]
pub struct MockLink(pub Arc<Mutex<Wire>>);

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_reply() -> Self {
        let link = Self::default();
        link.0.lock().unwrap().auto_reply = true;
        link
    }

    /// Queue raw bytes for the engine to read
    pub fn inject(&self, bytes: &[u8]) {
        self.0.lock().unwrap().inbound.extend_from_slice(bytes);
    }

    /// Queue a response to `code` carrying `data`
    pub fn respond(&self, code: u8, data: &[u8]) {
        let packet = Packet::new(RESPONSE_FLAG | code, data.to_vec()).unwrap();
        self.inject(&packet.to_bytes());
    }

    pub fn written(&self) -> Vec<u8> {
        self.0.lock().unwrap().written.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock().unwrap().written)
    }

    /// Split everything written so far into frames
    pub fn written_frames(&self) -> Vec<Packet> {
        let bytes = self.written();
        let mut frames = Vec::new();
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            let packet = Packet::from_bytes(rest).unwrap();
            rest = &rest[packet.data.len() + 4..];
            frames.push(packet);
        }
        frames
    }

    pub fn break_link(&self) {
        self.0.lock().unwrap().broken = true;
    }

    pub fn stall_writes(&self, count: u32) {
        self.0.lock().unwrap().stalled_writes = count;
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.0.lock().unwrap();
        if wire.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        let n = buf.len().min(wire.inbound.len());
        buf[..n].copy_from_slice(&wire.inbound[..n]);
        wire.inbound.drain(..n);
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.0.lock().unwrap();
        if wire.stalled_writes > 0 {
            wire.stalled_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "tx busy"));
        }
        wire.written.extend_from_slice(buf);
        if wire.auto_reply {
            if let Ok(packet) = Packet::from_bytes(buf) {
                let reply = Packet::new(RESPONSE_FLAG | packet.command, packet.data).unwrap();
                wire.inbound.extend_from_slice(&reply.to_bytes());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let wire = self.0.lock().unwrap();
        if wire.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        Ok(wire.inbound.len() as u32)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().inbound.clear();
        Ok(())
    }
}
