//! Frame extraction from the inbound stream
//!
//! One call to [`scan_frame`] looks at the head of the buffer and either
//! extracts a validated packet, discards bytes that cannot start a frame, or
//! leaves everything in place until more bytes arrive.

use byteorder::{ByteOrder, LittleEndian};

use super::buffer::StreamBuffer;
use super::crc::frame_crc;
use super::{Packet, FRAME_OVERHEAD, MAX_COMMAND, MAX_DATA_SIZE};

/// Why bytes were discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TossReason {
    /// Command index above the highest defined command
    BadCommand(u8),
    /// Length byte larger than the maximum payload
    Oversized(u8),
    /// Frame CRC did not match the trailer
    CrcMismatch {
        /// CRC computed over the frame
        expected: u16,
        /// CRC carried in the trailer
        actual: u16,
    },
}

/// Result of a single scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Not enough bytes for a decision; nothing consumed
    NeedMore,
    /// Bytes were discarded
    Tossed(TossReason),
    /// A status/error report byte (both high bits set) was consumed
    DeviceReport(u8),
    /// A complete, CRC-valid packet was consumed
    Frame(Packet),
}

/// Attempt to extract one frame from the head of `buffer`
pub fn scan_frame(buffer: &mut StreamBuffer) -> ScanOutcome {
    let Some(header) = buffer.peek(0, FRAME_OVERHEAD) else {
        return ScanOutcome::NeedMore;
    };
    let command = header[0];
    let length = header[1];

    if command & 0x3F > MAX_COMMAND {
        buffer.commit(1);
        return ScanOutcome::Tossed(TossReason::BadCommand(command));
    }

    if command & 0xC0 == 0xC0 {
        buffer.commit(1);
        return ScanOutcome::DeviceReport(command);
    }

    if length as usize > MAX_DATA_SIZE {
        buffer.commit(1);
        return ScanOutcome::Tossed(TossReason::Oversized(length));
    }

    let length = length as usize;
    let Some(frame) = buffer.peek(0, length + FRAME_OVERHEAD) else {
        return ScanOutcome::NeedMore;
    };

    let data = frame[2..2 + length].to_vec();
    let actual = LittleEndian::read_u16(&frame[2 + length..]);
    let expected = frame_crc(command, &data);

    buffer.commit(length + FRAME_OVERHEAD);

    if actual != expected {
        return ScanOutcome::Tossed(TossReason::CrcMismatch { expected, actual });
    }

    ScanOutcome::Frame(Packet {
        command,
        data,
        crc: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_frame, Command};

    fn frame(code: u8, data: &[u8]) -> Vec<u8> {
        encode_frame(&Command::new(code, data.to_vec()).unwrap())
    }

    #[test]
    fn test_short_buffer_needs_more() {
        let mut buf = StreamBuffer::new();
        buf.append(&[0x4D, 0x00, 0x12]);
        assert_eq!(scan_frame(&mut buf), ScanOutcome::NeedMore);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_partial_payload_needs_more() {
        let bytes = frame(0x5F, &[1, 2, 3, 4, 5, 6]);
        let mut buf = StreamBuffer::new();
        buf.append(&bytes[..6]);
        assert_eq!(scan_frame(&mut buf), ScanOutcome::NeedMore);
        assert_eq!(buf.len(), 6);

        buf.append(&bytes[6..]);
        match scan_frame(&mut buf) {
            ScanOutcome::Frame(pkt) => assert_eq!(pkt.data, vec![1, 2, 3, 4, 5, 6]),
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bad_command_index_tossed() {
        let mut buf = StreamBuffer::new();
        buf.append(&[0x3F, 0x00, 0x00, 0x00]);
        assert_eq!(
            scan_frame(&mut buf),
            ScanOutcome::Tossed(TossReason::BadCommand(0x3F))
        );
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_status_report_consumes_one_byte() {
        let mut buf = StreamBuffer::new();
        buf.append(&[0xC0 | 13, 0x00, 0x00, 0x00]);
        assert_eq!(scan_frame(&mut buf), ScanOutcome::DeviceReport(0xCD));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_crc_mismatch_consumes_frame() {
        let mut bad = frame(0x49, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        bad[5] ^= 0x01;
        let good = frame(0x4E, &[]);

        let mut buf = StreamBuffer::new();
        buf.append(&bad);
        buf.append(&good);

        assert!(matches!(
            scan_frame(&mut buf),
            ScanOutcome::Tossed(TossReason::CrcMismatch { .. })
        ));
        assert_eq!(buf.len(), good.len());
        match scan_frame(&mut buf) {
            ScanOutcome::Frame(pkt) => {
                assert_eq!(pkt.command, 0x4E);
                assert!(pkt.data.is_empty());
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_length_23_drops_one_byte() {
        // the bogus length byte is where the real frame starts
        let good = frame(0x17, &[0x0F, 0x0F]);
        let mut buf = StreamBuffer::new();
        buf.append(&[0x57]);
        buf.append(&good);

        assert_eq!(
            scan_frame(&mut buf),
            ScanOutcome::Tossed(TossReason::Oversized(23))
        );
        assert_eq!(buf.len(), good.len());
        match scan_frame(&mut buf) {
            ScanOutcome::Frame(pkt) => {
                assert_eq!(pkt.command, 0x17);
                assert_eq!(pkt.data, vec![0x0F, 0x0F]);
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_full_payload_accepted() {
        let data: Vec<u8> = (0..MAX_DATA_SIZE as u8).collect();
        let mut buf = StreamBuffer::new();
        buf.append(&frame(0x5F, &data));

        match scan_frame(&mut buf) {
            ScanOutcome::Frame(pkt) => {
                assert_eq!(pkt.command, 0x5F);
                assert_eq!(pkt.data.len(), 22);
                assert_eq!(pkt.data, data);
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(buf.is_empty());
    }
}
