//! Error types shared across nudge crates

use thiserror::Error;

/// A time-of-day string that is not a well-formed 24-hour `HH:MM`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed time '{value}': {reason}")]
pub struct MalformedTimeError {
    pub value: String,
    pub reason: String,
}

impl MalformedTimeError {
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
