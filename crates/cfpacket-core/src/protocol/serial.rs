//! Serial link to the display
//!
//! The engine only needs raw byte I/O, so the port is hidden behind
//! [`SerialLink`]. Tests substitute an in-memory implementation.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Read timeout for the port; reads are only issued when bytes are waiting
const PORT_TIMEOUT_MS: u64 = 50;

/// Byte-level access to the display
pub trait SerialLink: Read + Write + Send {
    /// Number of bytes that can be read without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Discard anything received but not yet read
    fn clear_input_buffer(&mut self) -> io::Result<()>;
}

/// [`SerialLink`] over a `serialport` handle
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an already opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

/// Open and configure a port for packet-mode communication (8N1, no flow control)
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<SerialChannel, ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::SerialError("no port configured".to_string()));
    }
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

    let port = serialport::new(name, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
        .open()
        .map_err(|e| ProtocolError::SerialError(format!("{}: {}", name, e)))?;

    let mut channel = SerialChannel::new(port);
    channel.clear_input_buffer()?;
    tracing::debug!(port = name, baud, "serial port opened");
    Ok(channel)
}
