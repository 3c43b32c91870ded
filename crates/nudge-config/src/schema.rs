//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// First-run notification settings
    #[serde(default)]
    pub defaults: RawDefaults,

    /// Reminder placement policy
    #[serde(default)]
    pub policy: RawPolicy,

    /// Notification text
    #[serde(default)]
    pub messages: RawMessages,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the settings database
    pub data_dir: Option<PathBuf>,

    /// JSON file holding the habit collection
    pub habits_file: Option<PathBuf>,

    /// How often the service checks for a date change
    pub tick_interval_seconds: Option<u64>,
}

/// Times used for the settings created on first run (HH:MM)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDefaults {
    pub morning_time: Option<String>,
    pub evening_time: Option<String>,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
}

/// Reminder placement policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPolicy {
    /// "midpoint" or a fixed "HH:MM"
    pub motivational_placement: Option<String>,
}

/// Notification text overrides
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMessages {
    pub morning_title: Option<String>,
    pub morning_body: Option<String>,
    pub evening_title: Option<String>,
    pub evening_body: Option<String>,
    /// Supports `{habit}` and `{streak}` placeholders
    pub streak_title: Option<String>,
    pub streak_body: Option<String>,
    pub motivational_title: Option<String>,
    pub motivational: Option<Vec<String>>,
    pub test_title: Option<String>,
    pub test_body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_schema() {
        let toml_str = r#"
            config_version = 1

            [service]
            data_dir = "/tmp/nudge"
            tick_interval_seconds = 30

            [defaults]
            morning_time = "07:30"
            quiet_hours_start = "23:00"

            [policy]
            motivational_placement = "13:00"

            [messages]
            streak_body = "Keep {habit} going: {streak} days"
            motivational = ["One step at a time", "Small wins add up"]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.tick_interval_seconds, Some(30));
        assert_eq!(config.defaults.morning_time.as_deref(), Some("07:30"));
        assert_eq!(config.policy.motivational_placement.as_deref(), Some("13:00"));
        assert_eq!(config.messages.motivational.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.data_dir.is_none());
        assert!(config.messages.motivational.is_none());
    }
}
