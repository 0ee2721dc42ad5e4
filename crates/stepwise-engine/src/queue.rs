//! Bounded command queue with deterministic ordering.
//!
//! [`CommandQueue`] buffers commands between submission and step execution.
//! It enforces a capacity limit, assigns monotonic insertion sequence
//! numbers, and hands out due commands in a total order.
//!
//! # Ordering
//!
//! Entries are kept sorted by the composite key:
//! `(step, priority rank, sequence)`
//!
//! This ensures:
//! - Earlier steps drain first.
//! - Within a step, `PLAYER` runs before `AUTOMATION` before `SYSTEM`,
//!   regardless of arrival order.
//! - Same-step, same-priority commands run in insertion order.
//!
//! Two queues fed the same commands in the same order always drain
//! identically, which is what replay relies on.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use stepwise_core::{Command, CommandError, Step};

use crate::error::QueueRestoreError;

/// Default command queue capacity.
///
/// Callers that expect large bursts (bulk imports, long replays) should
/// size the queue explicitly through
/// [`RuntimeConfig::queue_capacity`](crate::RuntimeConfig::queue_capacity).
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

/// A command paired with its insertion sequence number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// The queued command.
    pub command: Command,
    /// Monotonic insertion counter, the final tie-break.
    pub sequence: u64,
}

impl QueueEntry {
    fn sort_key(&self) -> (Step, u8, u64) {
        (self.command.step, self.command.priority.rank(), self.sequence)
    }
}

/// Serializable image of a queue, as stored in saves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Pending entries in drain order.
    pub entries: Vec<QueueEntry>,
    /// Sequence number the next accepted command will receive.
    pub next_sequence: u64,
}

/// Bounded, priority-ordered command queue.
///
/// Accepts commands via [`enqueue()`](CommandQueue::enqueue) and releases
/// them via [`dequeue_due()`](CommandQueue::dequeue_due).
#[derive(Clone, Debug)]
pub struct CommandQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
    next_sequence: u64,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl CommandQueue {
    /// Create an empty queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CommandQueue capacity must be at least 1");
        Self {
            entries: VecDeque::new(),
            capacity,
            next_sequence: 0,
        }
    }

    /// Validate and insert a command.
    ///
    /// Returns `Ok(true)` when accepted and `Ok(false)` when the queue is at
    /// capacity. Full is a backpressure signal, not an error: nothing is
    /// evicted and the caller decides what to do. A malformed command is an
    /// error and is never inserted.
    pub fn enqueue(&mut self, command: Command) -> Result<bool, CommandError> {
        command.validate()?;
        if self.entries.len() >= self.capacity {
            warn!(
                command_type = %command.kind,
                step = command.step.0,
                capacity = self.capacity,
                "command queue full, rejecting command"
            );
            return Ok(false);
        }
        let entry = QueueEntry {
            command,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        let key = entry.sort_key();
        let at = self.entries.partition_point(|e| e.sort_key() < key);
        self.entries.insert(at, entry);
        Ok(true)
    }

    /// Remove and return every command with `command.step <= step`, in
    /// `(step, priority, sequence)` order.
    pub fn dequeue_due(&mut self, step: Step) -> Vec<Command> {
        let due = self.entries.partition_point(|e| e.command.step <= step);
        self.entries.drain(..due).map(|e| e.command).collect()
    }

    /// Step of the earliest pending command.
    pub fn peek_next_step(&self) -> Option<Step> {
        self.entries.front().map(|e| e.command.step)
    }

    /// Pending entries in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Number of commands currently buffered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of commands this queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number the next accepted command will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Discard all pending commands. The sequence counter keeps counting.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Capture the queue contents and sequence counter.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.iter().cloned().collect(),
            next_sequence: self.next_sequence,
        }
    }

    /// Check that `snapshot` could be restored into this queue.
    pub fn validate_snapshot(&self, snapshot: &QueueSnapshot) -> Result<(), QueueRestoreError> {
        if snapshot.entries.len() > self.capacity {
            return Err(QueueRestoreError::OverCapacity {
                entries: snapshot.entries.len(),
                capacity: self.capacity,
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for (index, entry) in snapshot.entries.iter().enumerate() {
            entry
                .command
                .validate()
                .map_err(|reason| QueueRestoreError::InvalidCommand { index, reason })?;
            if entry.sequence >= snapshot.next_sequence {
                return Err(QueueRestoreError::SequenceOutOfRange {
                    index,
                    sequence: entry.sequence,
                    next_sequence: snapshot.next_sequence,
                });
            }
            if !seen.insert(entry.sequence) {
                return Err(QueueRestoreError::DuplicateSequence {
                    sequence: entry.sequence,
                });
            }
        }
        Ok(())
    }

    /// Replace the queue contents with `snapshot`.
    ///
    /// The snapshot is validated in full first; on error the queue is left
    /// unchanged.
    pub fn restore(&mut self, snapshot: QueueSnapshot) -> Result<(), QueueRestoreError> {
        self.validate_snapshot(&snapshot)?;
        let mut entries: Vec<QueueEntry> = snapshot.entries;
        entries.sort_by_key(QueueEntry::sort_key);
        self.entries = entries.into();
        self.next_sequence = snapshot.next_sequence;
        Ok(())
    }
}
