//! Outstanding-request tracking
//!
//! Every command written to the display gets a bin keyed by the response
//! code it expects (`0x40 | code`). Bins under one key are answered in the
//! order they were sent.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use super::{Command, Packet, Priority, ProtocolError};

/// Callback run with the display's answer to a command.
///
/// Receives `Err(RetriesExhausted)` if the command is given up on. Not run
/// at all when the connection is torn down with the command still pending.
pub type ResponseHandler = Box<dyn FnOnce(Result<Packet, ProtocolError>) + Send>;

/// A command that has been written and awaits its response
pub struct Bin {
    /// The request as sent
    pub command: Command,
    /// Called with the response
    pub handler: Option<ResponseHandler>,
    /// Queue the command came from
    pub priority: Priority,
    /// Whether it bypassed the queues
    pub send_now: bool,
    /// When it was written
    pub issued_at: Instant,
    /// Number of writes so far, this one included
    pub attempts: u32,
}

impl Bin {
    /// Response code this bin waits for
    pub fn key(&self) -> u8 {
        self.command.response_code()
    }

    /// Time since the command was written
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.issued_at)
    }
}

impl fmt::Debug for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bin")
            .field("command", &self.command)
            .field("has_handler", &self.handler.is_some())
            .field("priority", &self.priority)
            .field("send_now", &self.send_now)
            .field("issued_at", &self.issued_at)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Map of response code to in-flight requests
#[derive(Debug, Default)]
pub struct BinTracker {
    bins: BTreeMap<u8, VecDeque<Bin>>,
}

impl BinTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command that was just written
    pub fn register(&mut self, bin: Bin) {
        self.bins.entry(bin.key()).or_default().push_back(bin);
    }

    /// Take the bin a response answers.
    ///
    /// Only the head of the bucket is eligible, and only if the response
    /// belongs to `current`, the most recently dispatched command code.
    pub fn take_match(&mut self, response: u8, current: Option<u8>) -> Option<Bin> {
        let bucket = self.bins.get_mut(&response)?;
        if bucket.is_empty() || Some(response ^ super::RESPONSE_FLAG) != current {
            return None;
        }
        bucket.pop_front()
    }

    /// Take the first bin older than `timeout`, scanning keys in order
    pub fn take_expired(&mut self, now: Instant, timeout: Duration) -> Option<Bin> {
        for bucket in self.bins.values_mut() {
            if let Some(pos) = bucket.iter().position(|bin| bin.age(now) > timeout) {
                return bucket.remove(pos);
            }
        }
        None
    }

    /// Number of bins waiting under `key`
    pub fn pending_for(&self, key: u8) -> usize {
        self.bins.get(&key).map_or(0, VecDeque::len)
    }

    /// Total outstanding requests
    pub fn len(&self) -> usize {
        self.bins.values().map(VecDeque::len).sum()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.bins.values().all(VecDeque::is_empty)
    }

    /// Remove every bin without running handlers; returns the count
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        self.bins.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(code: u8, issued_at: Instant) -> Bin {
        Bin {
            command: Command::empty(code),
            handler: None,
            priority: Priority::Normal,
            send_now: false,
            issued_at,
            attempts: 1,
        }
    }

    #[test]
    fn test_register_keys_by_response_code() {
        let mut tracker = BinTracker::new();
        tracker.register(bin(13, Instant::now()));
        assert_eq!(tracker.pending_for(0x4D), 1);
        assert_eq!(tracker.pending_for(13), 0);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_match_requires_current_command() {
        let mut tracker = BinTracker::new();
        tracker.register(bin(13, Instant::now()));

        assert!(tracker.take_match(0x4D, Some(14)).is_none());
        assert!(tracker.take_match(0x4D, None).is_none());
        assert!(tracker.take_match(0x4E, Some(14)).is_none());

        let taken = tracker.take_match(0x4D, Some(13)).expect("head should match");
        assert_eq!(taken.command.code(), 13);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_match_is_fifo() {
        let mut tracker = BinTracker::new();
        let now = Instant::now();
        tracker.register(Bin {
            command: Command::new(31, vec![0, 0]).unwrap(),
            ..bin(31, now)
        });
        tracker.register(Bin {
            command: Command::new(31, vec![0, 1]).unwrap(),
            ..bin(31, now)
        });

        let first = tracker.take_match(0x5F, Some(31)).unwrap();
        assert_eq!(first.command.data(), &[0, 0]);
        let second = tracker.take_match(0x5F, Some(31)).unwrap();
        assert_eq!(second.command.data(), &[0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_one_at_a_time() {
        let mut tracker = BinTracker::new();
        let start = Instant::now();
        tracker.register(bin(6, start));
        tracker.register(bin(13, start));

        let timeout = Duration::from_millis(250);
        assert!(tracker.take_expired(Instant::now(), timeout).is_none());

        tokio::time::advance(Duration::from_millis(251)).await;
        let first = tracker.take_expired(Instant::now(), timeout).unwrap();
        assert_eq!(first.command.code(), 6);
        assert_eq!(tracker.len(), 1);
        let second = tracker.take_expired(Instant::now(), timeout).unwrap();
        assert_eq!(second.command.code(), 13);
        assert!(tracker.take_expired(Instant::now(), timeout).is_none());
    }
}
