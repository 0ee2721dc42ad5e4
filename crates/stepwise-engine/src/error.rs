//! Error types for step execution and state restoration.

use std::error::Error;
use std::fmt;

use stepwise_core::{CommandError, Step};

/// Failure reported by a command handler or a system.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerError {
    /// The handler's logic failed.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The command payload did not have the shape the handler expects.
    InvalidPayload {
        /// Payload field that was missing or malformed.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`HandlerError::InvalidPayload`].
    pub fn invalid_payload(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "execution failed: {reason}"),
            Self::InvalidPayload { field, reason } => {
                write!(f, "invalid payload field '{field}': {reason}")
            }
        }
    }
}

impl Error for HandlerError {}

/// A step aborted. The runtime does not advance past a failed step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// No handler is registered for a due command's type.
    UnknownCommand {
        /// The unhandled command type.
        command_type: String,
        /// The step being executed.
        step: Step,
    },
    /// A command handler returned an error.
    HandlerFailed {
        /// The command type.
        command_type: String,
        /// The step being executed.
        step: Step,
        /// The handler's error.
        reason: HandlerError,
    },
    /// A system returned an error.
    SystemFailed {
        /// The system's name.
        name: String,
        /// The step being executed.
        step: Step,
        /// The system's error.
        reason: HandlerError,
    },
    /// A handler emitted a malformed follow-up command.
    InvalidFollowUp {
        /// The step being executed.
        step: Step,
        /// Why the follow-up was rejected.
        reason: CommandError,
    },
    /// The queue has no room for a handler's follow-up commands.
    FollowUpRejected {
        /// The step being executed.
        step: Step,
        /// Type of the first follow-up that did not fit.
        command_type: String,
        /// The queue's capacity.
        capacity: usize,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand { command_type, step } => {
                write!(f, "no handler registered for command '{command_type}' at step {step}")
            }
            Self::HandlerFailed {
                command_type,
                step,
                reason,
            } => write!(
                f,
                "handler for command '{command_type}' failed at step {step}: {reason}"
            ),
            Self::SystemFailed { name, step, reason } => {
                write!(f, "system '{name}' failed at step {step}: {reason}")
            }
            Self::InvalidFollowUp { step, reason } => {
                write!(f, "invalid follow-up command at step {step}: {reason}")
            }
            Self::FollowUpRejected {
                step,
                command_type,
                capacity,
            } => write!(
                f,
                "follow-up command '{command_type}' at step {step} does not fit \
                 the command queue (capacity {capacity})"
            ),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HandlerFailed { reason, .. } | Self::SystemFailed { reason, .. } => Some(reason),
            Self::InvalidFollowUp { reason, .. } => Some(reason),
            Self::UnknownCommand { .. } | Self::FollowUpRejected { .. } => None,
        }
    }
}

/// A queue snapshot could not be restored.
#[derive(Clone, Debug, PartialEq)]
pub enum QueueRestoreError {
    /// The snapshot holds more entries than the queue's capacity.
    OverCapacity {
        /// Entries in the snapshot.
        entries: usize,
        /// Capacity of the target queue.
        capacity: usize,
    },
    /// An entry's command failed validation.
    InvalidCommand {
        /// Index of the entry in the snapshot.
        index: usize,
        /// The validation failure.
        reason: CommandError,
    },
    /// An entry's sequence is not below the snapshot's `next_sequence`.
    SequenceOutOfRange {
        /// Index of the entry in the snapshot.
        index: usize,
        /// The entry's sequence.
        sequence: u64,
        /// The snapshot's next sequence.
        next_sequence: u64,
    },
    /// Two entries share a sequence number.
    DuplicateSequence {
        /// The repeated sequence.
        sequence: u64,
    },
}

impl fmt::Display for QueueRestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverCapacity { entries, capacity } => write!(
                f,
                "queue snapshot holds {entries} entries but capacity is {capacity}"
            ),
            Self::InvalidCommand { index, reason } => {
                write!(f, "queue snapshot entry {index} is invalid: {reason}")
            }
            Self::SequenceOutOfRange {
                index,
                sequence,
                next_sequence,
            } => write!(
                f,
                "queue snapshot entry {index} has sequence {sequence}, \
                 not below nextSequence {next_sequence}"
            ),
            Self::DuplicateSequence { sequence } => {
                write!(f, "queue snapshot repeats sequence {sequence}")
            }
        }
    }
}

impl Error for QueueRestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCommand { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// External state could not be restored from a captured section.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoreError {
    /// Section being restored (`resources`, `progression`, ...).
    pub section: String,
    /// What was wrong with it.
    pub reason: String,
}

impl RestoreError {
    /// Build a restore error for `section`.
    pub fn new(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot restore '{}': {}", self.section, self.reason)
    }
}

impl Error for RestoreError {}

/// An RNG or PRD snapshot was malformed.
#[derive(Clone, Debug, PartialEq)]
pub enum RngStateError {
    /// The stream position does not fit the recorded integer range.
    PositionOutOfRange {
        /// The rejected position.
        position: u128,
    },
    /// A PRD entry is malformed.
    InvalidPrdEntry {
        /// The PRD id.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl fmt::Display for RngStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionOutOfRange { position } => {
                write!(f, "rng position {position} exceeds the safe integer range")
            }
            Self::InvalidPrdEntry { id, reason } => write!(f, "invalid prd entry '{id}': {reason}"),
        }
    }
}

impl Error for RngStateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_display_names_command_and_step() {
        let err = StepError::HandlerFailed {
            command_type: "COLLECT".into(),
            step: Step(7),
            reason: HandlerError::failed("boom"),
        };
        assert_eq!(
            err.to_string(),
            "handler for command 'COLLECT' failed at step 7: execution failed: boom"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn restore_error_display() {
        let err = RestoreError::new("resources", "missing gold");
        assert_eq!(err.to_string(), "cannot restore 'resources': missing gold");
    }
}
