//! Command and priority types for the command queue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::id::Step;
use crate::value::Value;

/// Who issued a command. Also the deterministic tie-break rank within a step:
/// `Player < Automation < System`.
///
/// Serialized as `"PLAYER"`, `"AUTOMATION"`, `"SYSTEM"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandPriority {
    /// Issued directly by the player.
    Player,
    /// Issued by an automation rule.
    Automation,
    /// Issued by the engine itself.
    System,
}

impl CommandPriority {
    /// Ordering rank (0 = runs first).
    pub fn rank(self) -> u8 {
        match self {
            Self::Player => 0,
            Self::Automation => 1,
            Self::System => 2,
        }
    }
}

impl fmt::Display for CommandPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Player => "PLAYER",
            Self::Automation => "AUTOMATION",
            Self::System => "SYSTEM",
        })
    }
}

/// A request to mutate simulation state at a given step.
///
/// What a command *does* is decided by the handler registered for its
/// `type`; the core only validates, orders, records, and replays it.
///
/// # Examples
///
/// ```
/// use stepwise_core::{Command, CommandPriority, Step, Value};
///
/// let cmd = Command::new("COLLECT", CommandPriority::Player, Step(0))
///     .with_payload(Value::object([("amount", Value::from(5.0))]))
///     .with_timestamp(1_000.0);
///
/// assert!(cmd.validate().is_ok());
/// assert_eq!(cmd.step, Step(0));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Handler key. Must be non-empty.
    #[serde(rename = "type")]
    pub kind: String,
    /// Issuer class, used as the second ordering key.
    pub priority: CommandPriority,
    /// Restricted-JSON payload interpreted by the handler.
    pub payload: Value,
    /// Wall-clock issue time in milliseconds. Must be finite.
    pub timestamp: f64,
    /// Step at which the command becomes due.
    pub step: Step,
    /// Optional caller correlation id. Must be non-empty when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Command {
    /// A command with a `null` payload and zero timestamp.
    pub fn new(kind: impl Into<String>, priority: CommandPriority, step: Step) -> Self {
        Self {
            kind: kind.into(),
            priority,
            payload: Value::Null,
            timestamp: 0.0,
            step,
            request_id: None,
        }
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set the issue time in milliseconds.
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a correlation id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Check the command's shape and its payload against the restricted-JSON rules.
    pub fn validate(&self) -> Result<(), CommandError> {
        if self.kind.is_empty() {
            return Err(CommandError::EmptyType);
        }
        if !self.timestamp.is_finite() {
            return Err(CommandError::NonFiniteTimestamp {
                command_type: self.kind.clone(),
                timestamp: self.timestamp,
            });
        }
        if matches!(&self.request_id, Some(id) if id.is_empty()) {
            return Err(CommandError::EmptyRequestId {
                command_type: self.kind.clone(),
            });
        }
        self.payload
            .validate()
            .map_err(|reason| CommandError::InvalidPayload {
                command_type: self.kind.clone(),
                reason,
            })
    }
}
