//! Packet and command types, frame encoding/decoding
//!
//! Frame format:
//! - 1 byte: command
//! - 1 byte: payload length
//! - N bytes: payload
//! - 2 bytes: CRC-16 of command + length + payload (little-endian)

use byteorder::{ByteOrder, LittleEndian};

use super::crc::frame_crc;
use super::{ProtocolError, FRAME_OVERHEAD, MAX_DATA_SIZE};

/// A decoded frame received from the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command byte (responses carry `0x40 | request`, reports are 0x80+)
    pub command: u8,
    /// Payload
    pub data: Vec<u8>,
    /// CRC-16 as received
    pub crc: u16,
}

impl Packet {
    /// Create a packet, computing its CRC
    pub fn new(command: u8, data: Vec<u8>) -> Result<Self, ProtocolError> {
        check_len(data.len())?;
        let crc = frame_crc(command, &data);
        Ok(Self { command, data, crc })
    }

    /// Decode a complete frame from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(ProtocolError::InvalidResponse);
        }

        let command = bytes[0];
        let length = bytes[1] as usize;
        check_len(length)?;

        if bytes.len() < length + FRAME_OVERHEAD {
            return Err(ProtocolError::InvalidResponse);
        }

        let data = bytes[2..2 + length].to_vec();
        let received = LittleEndian::read_u16(&bytes[2 + length..2 + length + 2]);
        let expected = frame_crc(command, &data);

        if received != expected {
            return Err(ProtocolError::CrcMismatch {
                expected,
                actual: received,
            });
        }

        Ok(Self {
            command,
            data,
            crc: received,
        })
    }

    /// Encode the packet to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        frame_bytes(self.command, &self.data)
    }

    /// Whether this is an unsolicited report (key, fan, temperature)
    pub fn is_report(&self) -> bool {
        self.command & 0xC0 == 0x80
    }

    /// The request code this packet answers
    pub fn request_code(&self) -> u8 {
        self.command & 0x3F
    }
}

/// An outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    code: u8,
    data: Vec<u8>,
}

impl Command {
    /// Create a command with a payload
    pub fn new(code: u8, data: Vec<u8>) -> Result<Self, ProtocolError> {
        check_len(data.len())?;
        Ok(Self { code, data })
    }

    /// Create a command with no payload
    pub fn empty(code: u8) -> Self {
        Self {
            code,
            data: Vec::new(),
        }
    }

    /// Command code
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Code the display answers this command with
    pub fn response_code(&self) -> u8 {
        super::RESPONSE_FLAG | self.code
    }
}

/// Serialize a command into its wire frame
pub fn encode_frame(command: &Command) -> Vec<u8> {
    frame_bytes(command.code, &command.data)
}

fn frame_bytes(code: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + FRAME_OVERHEAD);
    bytes.push(code);
    bytes.push(data.len() as u8);
    bytes.extend_from_slice(data);

    let mut crc_bytes = [0u8; 2];
    LittleEndian::write_u16(&mut crc_bytes, frame_crc(code, data));
    bytes.extend_from_slice(&crc_bytes);

    bytes
}

fn check_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_DATA_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            len,
            max: MAX_DATA_SIZE,
        });
    }
    Ok(())
}

/// Builder for command payloads
pub struct PacketBuilder {
    code: u8,
    payload: Vec<u8>,
}

impl PacketBuilder {
    /// Start a payload for the given command code
    pub fn new(code: u8) -> Self {
        Self {
            code,
            payload: Vec::new(),
        }
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add an integer clamped into `[min, max]`
    pub fn clamped(mut self, value: i32, min: u8, max: u8) -> Self {
        self.payload.push(value.clamp(min as i32, max as i32) as u8);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Build the command, rejecting oversized payloads
    pub fn build(self) -> Result<Command, ProtocolError> {
        Command::new(self.code, self.payload)
    }
}
