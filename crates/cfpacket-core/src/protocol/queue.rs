//! Pending outbound commands
//!
//! Two FIFO queues. The urgent queue is always drained before the normal
//! one.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Command, ResponseHandler};

/// Queue a command is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Regular traffic (screen updates, settings)
    #[default]
    Normal,
    /// Jumps ahead of everything on the normal queue
    Urgent,
}

/// A command waiting for its turn on the wire
pub struct PendingCommand {
    /// The request
    pub command: Command,
    /// Called with the response
    pub handler: Option<ResponseHandler>,
    /// Queue it came from, kept so a resend lands on the same one
    pub priority: Priority,
    /// How many times it has already been written
    pub attempts: u32,
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("command", &self.command)
            .field("has_handler", &self.handler.is_some())
            .field("priority", &self.priority)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Dual-priority command queue
#[derive(Debug, Default)]
pub struct CommandQueue {
    normal: VecDeque<PendingCommand>,
    urgent: VecDeque<PendingCommand>,
}

impl CommandQueue {
    /// Create empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the queue named by the command's priority
    pub fn push(&mut self, pending: PendingCommand) {
        match pending.priority {
            Priority::Normal => self.normal.push_back(pending),
            Priority::Urgent => self.urgent.push_back(pending),
        }
    }

    /// Put a command back at the head of its queue
    pub fn push_front(&mut self, pending: PendingCommand) {
        match pending.priority {
            Priority::Normal => self.normal.push_front(pending),
            Priority::Urgent => self.urgent.push_front(pending),
        }
    }

    /// Next command to send: urgent first, FIFO within a queue
    pub fn pop_next(&mut self) -> Option<PendingCommand> {
        self.urgent.pop_front().or_else(|| self.normal.pop_front())
    }

    /// Total queued commands
    pub fn len(&self) -> usize {
        self.normal.len() + self.urgent.len()
    }

    /// Whether both queues are empty
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.urgent.is_empty()
    }

    /// Drop everything queued without running any handler; returns the count
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        self.normal.clear();
        self.urgent.clear();
        dropped
    }
}
