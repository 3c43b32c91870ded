//! Configuration validation

use crate::schema::{RawConfig, RawMessages};
use nudge_util::TimeOfDay;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid time format for {field} '{value}': {message}")]
    InvalidTimeFormat {
        field: String,
        value: String,
        message: String,
    },

    #[error("Invalid motivational placement '{0}': expected \"midpoint\" or HH:MM")]
    InvalidPlacement(String),

    #[error("Message {0} cannot be empty")]
    EmptyMessage(String),

    #[error("Motivational message list cannot be empty")]
    NoMotivationalMessages,

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.service.tick_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "tick_interval_seconds must be greater than 0".into(),
        ));
    }

    let defaults = &config.defaults;
    for (field, value) in [
        ("defaults.morning_time", &defaults.morning_time),
        ("defaults.evening_time", &defaults.evening_time),
        ("defaults.quiet_hours_start", &defaults.quiet_hours_start),
        ("defaults.quiet_hours_end", &defaults.quiet_hours_end),
    ] {
        if let Some(value) = value
            && let Err(e) = TimeOfDay::parse(value)
        {
            errors.push(ValidationError::InvalidTimeFormat {
                field: field.to_string(),
                value: value.clone(),
                message: e.reason,
            });
        }
    }

    if let Some(placement) = &config.policy.motivational_placement
        && parse_placement(placement).is_err()
    {
        errors.push(ValidationError::InvalidPlacement(placement.clone()));
    }

    errors.extend(validate_messages(&config.messages));

    errors
}

fn validate_messages(messages: &RawMessages) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, value) in [
        ("morning_title", &messages.morning_title),
        ("morning_body", &messages.morning_body),
        ("evening_title", &messages.evening_title),
        ("evening_body", &messages.evening_body),
        ("streak_title", &messages.streak_title),
        ("streak_body", &messages.streak_body),
        ("motivational_title", &messages.motivational_title),
        ("test_title", &messages.test_title),
        ("test_body", &messages.test_body),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(ValidationError::EmptyMessage(name.to_string()));
        }
    }

    if let Some(list) = &messages.motivational {
        if list.is_empty() {
            errors.push(ValidationError::NoMotivationalMessages);
        } else if list.iter().any(|m| m.trim().is_empty()) {
            errors.push(ValidationError::EmptyMessage("motivational".into()));
        }
    }

    errors
}

/// Parse a motivational placement: `None` for midpoint, `Some(time)` for a fixed time
pub fn parse_placement(s: &str) -> Result<Option<TimeOfDay>, String> {
    if s.eq_ignore_ascii_case("midpoint") {
        return Ok(None);
    }

    TimeOfDay::parse(s).map(Some).map_err(|e| e.to_string())
}
