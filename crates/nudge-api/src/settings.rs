//! Notification settings and partial updates

use nudge_util::{MalformedTimeError, TimeOfDay};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User notification preferences.
///
/// Replaced as a whole on every change; never mutated in place by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    /// Master switch; when false nothing stays armed
    pub enabled: bool,
    pub morning_reminders: bool,
    pub evening_reminders: bool,
    pub streak_reminders: bool,
    pub motivational_messages: bool,
    pub morning_time: TimeOfDay,
    pub evening_time: TimeOfDay,
    /// Start of the suppression window, inclusive
    pub quiet_hours_start: TimeOfDay,
    /// End of the suppression window, exclusive; may be earlier than the start
    pub quiet_hours_end: TimeOfDay,
}

impl NotificationSettings {
    /// First-run settings: everything switched off behind the master switch
    pub fn first_run(
        morning_time: TimeOfDay,
        evening_time: TimeOfDay,
        quiet_hours_start: TimeOfDay,
        quiet_hours_end: TimeOfDay,
    ) -> Self {
        Self {
            enabled: false,
            morning_reminders: true,
            evening_reminders: true,
            streak_reminders: true,
            motivational_messages: false,
            morning_time,
            evening_time,
            quiet_hours_start,
            quiet_hours_end,
        }
    }

    /// Whether a time of day falls inside the configured quiet hours
    pub fn is_quiet(&self, time: TimeOfDay) -> bool {
        time.is_within(self.quiet_hours_start, self.quiet_hours_end)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self::first_run(
            TimeOfDay::new(8, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            TimeOfDay::new(20, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            TimeOfDay::new(22, 0).unwrap_or(TimeOfDay::MIDNIGHT),
            TimeOfDay::new(7, 0).unwrap_or(TimeOfDay::MIDNIGHT),
        )
    }
}

/// Errors building a patch from loosely-typed `field=value` input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Unknown settings field: {0}")]
    UnknownField(String),

    #[error("Invalid boolean '{value}' for field {field}")]
    InvalidBool { field: String, value: String },

    #[error("Expected field=value, got '{0}'")]
    MalformedPair(String),
}

/// A partial update to `NotificationSettings`.
///
/// Time fields hold the raw `HH:MM` text; they are validated when the patch is
/// applied so a malformed value refuses the whole update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub morning_reminders: Option<bool>,
    pub evening_reminders: Option<bool>,
    pub streak_reminders: Option<bool>,
    pub motivational_messages: Option<bool>,
    pub morning_time: Option<String>,
    pub evening_time: Option<String>,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
}

impl SettingsPatch {
    /// Build a patch from `(field, value)` pairs using the camelCase field names.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut patch = Self::default();
        for (field, value) in pairs {
            patch.set(field, value)?;
        }
        Ok(patch)
    }

    /// Build a patch from `field=value` strings, as typed on a command line
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self, PatchError> {
        let mut pairs = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (field, value) = assignment
                .split_once('=')
                .ok_or_else(|| PatchError::MalformedPair(assignment.to_string()))?;
            pairs.push((field.trim(), value.trim()));
        }
        Self::from_pairs(pairs)
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), PatchError> {
        let parse_bool = |value: &str| match value.to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            _ => Err(PatchError::InvalidBool {
                field: field.to_string(),
                value: value.to_string(),
            }),
        };

        match field {
            "enabled" => self.enabled = Some(parse_bool(value)?),
            "morningReminders" => self.morning_reminders = Some(parse_bool(value)?),
            "eveningReminders" => self.evening_reminders = Some(parse_bool(value)?),
            "streakReminders" => self.streak_reminders = Some(parse_bool(value)?),
            "motivationalMessages" => self.motivational_messages = Some(parse_bool(value)?),
            "morningTime" => self.morning_time = Some(value.to_string()),
            "eveningTime" => self.evening_time = Some(value.to_string()),
            "quietHoursStart" => self.quiet_hours_start = Some(value.to_string()),
            "quietHoursEnd" => self.quiet_hours_end = Some(value.to_string()),
            other => return Err(PatchError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produce the replacement settings, or refuse if any time is malformed
    pub fn apply(&self, base: &NotificationSettings) -> Result<NotificationSettings, MalformedTimeError> {
        let time = |raw: &Option<String>, current: TimeOfDay| match raw {
            Some(s) => TimeOfDay::parse(s),
            None => Ok(current),
        };

        Ok(NotificationSettings {
            enabled: self.enabled.unwrap_or(base.enabled),
            morning_reminders: self.morning_reminders.unwrap_or(base.morning_reminders),
            evening_reminders: self.evening_reminders.unwrap_or(base.evening_reminders),
            streak_reminders: self.streak_reminders.unwrap_or(base.streak_reminders),
            motivational_messages: self
                .motivational_messages
                .unwrap_or(base.motivational_messages),
            morning_time: time(&self.morning_time, base.morning_time)?,
            evening_time: time(&self.evening_time, base.evening_time)?,
            quiet_hours_start: time(&self.quiet_hours_start, base.quiet_hours_start)?,
            quiet_hours_end: time(&self.quiet_hours_end, base.quiet_hours_end)?,
        })
    }
}
