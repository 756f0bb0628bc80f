//! Inbound byte accumulator
//!
//! Bytes read from the link are appended here. The frame scanner peeks at
//! them without consuming, and only commits once a frame has been validated
//! or discarded.

/// Compact the backing storage once this many consumed bytes pile up
const COMPACT_THRESHOLD: usize = 512;

/// Append-only byte buffer with a read head
#[derive(Debug, Default, Clone)]
pub struct StreamBuffer {
    data: Vec<u8>,
    head: usize,
}

impl StreamBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the link
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    /// Whether there is nothing left to scan
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View `n` bytes starting `offset` bytes past the read head.
    ///
    /// Returns `None` if fewer bytes are buffered. Never advances the head.
    pub fn peek(&self, offset: usize, n: usize) -> Option<&[u8]> {
        let start = self.head + offset;
        let end = start + n;
        if end > self.data.len() {
            return None;
        }
        Some(&self.data[start..end])
    }

    /// Single byte at `offset` past the read head
    pub fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.peek(offset, 1).map(|b| b[0])
    }

    /// Consume `n` bytes (clamped to what is buffered)
    pub fn commit(&mut self, n: usize) {
        self.head += n.min(self.len());
        if self.head == self.data.len() {
            self.data.clear();
            self.head = 0;
        } else if self.head >= COMPACT_THRESHOLD {
            self.data.drain(..self.head);
            self.head = 0;
        }
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_does_not_consume() {
        let mut buf = StreamBuffer::new();
        buf.append(&[1, 2, 3, 4]);
        assert_eq!(buf.peek(0, 2), Some(&[1, 2][..]));
        assert_eq!(buf.peek(2, 2), Some(&[3, 4][..]));
        assert_eq!(buf.peek(3, 2), None);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_commit_advances() {
        let mut buf = StreamBuffer::new();
        buf.append(&[1, 2, 3, 4]);
        buf.commit(1);
        assert_eq!(buf.peek_byte(0), Some(2));
        assert_eq!(buf.len(), 3);
        buf.append(&[5]);
        buf.commit(10);
        assert!(buf.is_empty());
        assert_eq!(buf.peek_byte(0), None);
    }

    #[test]
    fn test_compaction_keeps_order() {
        let mut buf = StreamBuffer::new();
        let bytes: Vec<u8> = (0..=255).cycle().take(COMPACT_THRESHOLD + 10).collect();
        buf.append(&bytes);
        buf.commit(COMPACT_THRESHOLD);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.peek(0, 10), Some(&bytes[COMPACT_THRESHOLD..]));
    }
}
