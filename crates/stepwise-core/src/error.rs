//! Error types for value validation and command validation.
//!
//! Every variant names the offending field or JSON path so that a failure
//! deep inside a recorded payload is actionable without a debugger.

use std::error::Error;
use std::fmt;

/// A value could not be represented in the restricted-JSON model.
///
/// Returned by [`Value::validate`](crate::Value::validate), by the strict
/// serializer [`to_value`](crate::to_value), and by the canonical hasher.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueError {
    /// A number was NaN or infinite.
    NonFiniteNumber {
        /// JSON path of the offending value (e.g. `$.payload.amount`).
        path: String,
        /// The rejected number.
        value: f64,
    },
    /// An integer cannot be represented exactly as an IEEE-754 double.
    UnsafeInteger {
        /// JSON path of the offending value.
        path: String,
        /// Decimal rendering of the rejected integer.
        value: String,
    },
    /// A map key was not a string.
    NonStringKey {
        /// JSON path of the map holding the key.
        path: String,
    },
    /// The value kind has no restricted-JSON representation
    /// (byte strings, custom serializer errors, ...).
    Unsupported {
        /// JSON path of the offending value.
        path: String,
        /// Description of the unsupported kind.
        kind: String,
    },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteNumber { path, value } => {
                write!(f, "non-finite number {value} at {path}")
            }
            Self::UnsafeInteger { path, value } => {
                write!(f, "integer {value} at {path} is outside the safe integer range")
            }
            Self::NonStringKey { path } => write!(f, "non-string map key at {path}"),
            Self::Unsupported { path, kind } => {
                write!(f, "unsupported value at {path}: {kind}")
            }
        }
    }
}

impl Error for ValueError {}

impl serde::ser::Error for ValueError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Unsupported {
            path: "$".into(),
            kind: msg.to_string(),
        }
    }
}

/// A command failed shape validation.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// `type` was empty.
    EmptyType,
    /// `timestamp` was NaN or infinite.
    NonFiniteTimestamp {
        /// The command type.
        command_type: String,
        /// The rejected timestamp.
        timestamp: f64,
    },
    /// `requestId` was present but empty.
    EmptyRequestId {
        /// The command type.
        command_type: String,
    },
    /// The payload violates the restricted-JSON rules.
    InvalidPayload {
        /// The command type.
        command_type: String,
        /// What was wrong with the payload.
        reason: ValueError,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyType => write!(f, "command type must be a non-empty string"),
            Self::NonFiniteTimestamp {
                command_type,
                timestamp,
            } => write!(
                f,
                "command '{command_type}' has non-finite timestamp {timestamp}"
            ),
            Self::EmptyRequestId { command_type } => {
                write!(f, "command '{command_type}' has an empty requestId")
            }
            Self::InvalidPayload {
                command_type,
                reason,
            } => write!(f, "command '{command_type}' has an invalid payload: {reason}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPayload { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A content digest string did not have the `fnv1a-XXXXXXXX` shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestFormatError {
    /// The rejected hash string.
    pub hash: String,
}

impl fmt::Display for DigestFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed content digest '{}' (expected fnv1a- followed by 8 lowercase hex digits)",
            self.hash
        )
    }
}

impl Error for DigestFormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display_names_path() {
        let err = ValueError::NonFiniteNumber {
            path: "$.x".into(),
            value: f64::NAN,
        };
        assert_eq!(err.to_string(), "non-finite number NaN at $.x");
    }

    #[test]
    fn command_error_source_is_value_error() {
        let err = CommandError::InvalidPayload {
            command_type: "COLLECT".into(),
            reason: ValueError::NonStringKey { path: "$".into() },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("COLLECT"));
    }
}
