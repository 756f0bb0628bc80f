//! Packet-mode serial protocol
//!
//! Implements the Crystalfontz packet protocol used by the CFA533/633 and
//! CFA631/635 families.
//!
//! Frame layout on the wire:
//! - 1 byte: command (bits 0-5 index, bit 6 set on responses, 0xC0 = status report)
//! - 1 byte: payload length (0-22)
//! - N bytes: payload
//! - 2 bytes: CRC-16 (low byte first)

pub mod buffer;
mod bins;
pub mod codec;
pub mod commands;
pub mod crc;
mod engine;
mod error;
mod packet;
mod queue;
pub mod serial;

pub use bins::{Bin, BinTracker, ResponseHandler};
pub use buffer::StreamBuffer;
pub use codec::{scan_frame, ScanOutcome, TossReason};
pub use engine::{EngineConfig, EngineStats, PacketEngine, PacketListener, DEFAULT_MAX_RETRIES};
pub use error::ProtocolError;
pub use packet::{encode_frame, Command, Packet, PacketBuilder};
pub use queue::{CommandQueue, PendingCommand, Priority};
pub use serial::{open_port, SerialChannel, SerialLink};

/// Default baud rate for packet-mode modules
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default time to wait for a response before resending, in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 250;

/// Interval of the outstanding-request watchdog, in milliseconds
pub const BIN_WATCH_INTERVAL_MS: u64 = 10;

/// Maximum payload carried by a single frame
pub const MAX_DATA_SIZE: usize = 22;

/// Highest defined command index (low six bits of the command byte)
pub const MAX_COMMAND: u8 = 35;

/// Bytes of framing around the payload (command, length, two CRC bytes)
pub const FRAME_OVERHEAD: usize = 4;

/// Bit set on a command code to form the code of its response
pub const RESPONSE_FLAG: u8 = 0x40;

/// Update period for the command/fill/check cycle at a given baud rate.
///
/// One maximum-size frame worth of bits at `baud`, rounded to whole
/// milliseconds and never below 1 ms.
pub fn transfer_rate_ms(baud: u32) -> u64 {
    let baud = if baud == 0 { DEFAULT_BAUD_RATE } else { baud };
    let ms = ((MAX_DATA_SIZE + FRAME_OVERHEAD) as f64 / baud as f64 * 8000.0).round() as u64;
    ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_rate() {
        assert_eq!(transfer_rate_ms(115200), 2);
        assert_eq!(transfer_rate_ms(19200), 11);
        assert_eq!(transfer_rate_ms(0), 2);
        assert_eq!(transfer_rate_ms(10_000_000), 1);
    }
}
