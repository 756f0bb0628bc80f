//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to a packet-mode display
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Opening or configuring the port failed
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No link is attached
    #[error("Not connected to display")]
    NotConnected,

    /// A link is already attached
    #[error("Already connected")]
    AlreadyConnected,

    /// The link failed and the session was torn down
    #[error("Display disconnected: {0}")]
    Disconnected(String),

    /// A reply did not have the expected shape
    #[error("Invalid response from display")]
    InvalidResponse,

    /// Frame trailer did not match its contents
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC computed over the frame
        expected: u16,
        /// CRC carried in the trailer
        actual: u16,
    },

    /// Payload longer than the command allows
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Offered length
        len: usize,
        /// Largest accepted length
        max: usize,
    },

    /// An argument is out of range for the model
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Model name unknown or not packet-mode
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// A request timed out too many times
    #[error("Command {command} abandoned after {attempts} attempts")]
    RetriesExhausted {
        /// Request code
        command: u8,
        /// Times it was written
        attempts: u32,
    },

    /// The background task has exited
    #[error("Driver task stopped")]
    DriverStopped,

    /// Other I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
