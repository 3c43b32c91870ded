//! Validated configuration structures

use crate::schema::{RawConfig, RawDefaults, RawMessages, RawServiceConfig};
use crate::validation::parse_placement;
use chrono::{Datelike, NaiveDate};
use nudge_api::{NotificationPayload, NotificationSettings};
use nudge_util::{TimeOfDay, default_data_dir};
use std::path::PathBuf;
use std::time::Duration;

/// Validated configuration ready for use by the core
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Service configuration
    pub service: ServiceConfig,

    /// Settings created on first run
    pub defaults: NotificationSettings,

    /// Reminder placement and text
    pub reminders: ReminderPolicyConfig,
}

impl EngineConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            defaults: convert_defaults(raw.defaults),
            reminders: ReminderPolicyConfig {
                motivational_placement: raw
                    .policy
                    .motivational_placement
                    .as_deref()
                    .and_then(|p| parse_placement(p).ok())
                    .map(|fixed| match fixed {
                        Some(time) => MotivationalPlacement::Fixed(time),
                        None => MotivationalPlacement::Midpoint,
                    })
                    .unwrap_or_default(),
                messages: MessageTemplates::from_raw(raw.messages),
            },
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub habits_file: PathBuf,
    pub tick_interval: Duration,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let data_dir = raw.data_dir.unwrap_or_else(default_data_dir);
        Self {
            habits_file: raw
                .habits_file
                .unwrap_or_else(|| data_dir.join("habits.json")),
            data_dir,
            tick_interval: Duration::from_secs(raw.tick_interval_seconds.unwrap_or(60)),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Where the daily motivational message is placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MotivationalPlacement {
    /// Halfway from the morning time to the evening time
    #[default]
    Midpoint,
    /// A fixed time of day
    Fixed(TimeOfDay),
}

impl MotivationalPlacement {
    pub fn resolve(&self, morning: TimeOfDay, evening: TimeOfDay) -> TimeOfDay {
        match self {
            MotivationalPlacement::Midpoint => morning.midpoint_towards(evening),
            MotivationalPlacement::Fixed(time) => *time,
        }
    }
}

/// Parameters of the reminder policy that are not user settings
#[derive(Debug, Clone, Default)]
pub struct ReminderPolicyConfig {
    pub motivational_placement: MotivationalPlacement,
    pub messages: MessageTemplates,
}

/// Notification text for each reminder category
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    pub morning: NotificationPayload,
    pub evening: NotificationPayload,
    /// `{habit}` and `{streak}` are substituted
    pub streak: NotificationPayload,
    pub motivational_title: String,
    /// Never empty
    pub motivational: Vec<String>,
    pub test: NotificationPayload,
}

impl MessageTemplates {
    fn from_raw(raw: RawMessages) -> Self {
        let defaults = Self::default();
        let payload = |title: Option<String>, body: Option<String>, fallback: NotificationPayload| {
            NotificationPayload {
                title: title.unwrap_or(fallback.title),
                body: body.unwrap_or(fallback.body),
            }
        };

        Self {
            morning: payload(raw.morning_title, raw.morning_body, defaults.morning),
            evening: payload(raw.evening_title, raw.evening_body, defaults.evening),
            streak: payload(raw.streak_title, raw.streak_body, defaults.streak),
            motivational_title: raw
                .motivational_title
                .unwrap_or(defaults.motivational_title),
            motivational: raw
                .motivational
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.motivational),
            test: payload(raw.test_title, raw.test_body, defaults.test),
        }
    }

    /// Streak protection text for one habit
    pub fn streak_for(&self, habit_name: &str, streak: u32) -> NotificationPayload {
        let render = |template: &str| {
            template
                .replace("{habit}", habit_name)
                .replace("{streak}", &streak.to_string())
        };
        NotificationPayload::new(render(&self.streak.title), render(&self.streak.body))
    }

    /// The motivational message for a date, rotating through the list by day of year
    pub fn motivational_for(&self, date: NaiveDate) -> NotificationPayload {
        let body = if self.motivational.is_empty() {
            String::new()
        } else {
            let index = date.ordinal0() as usize % self.motivational.len();
            self.motivational[index].clone()
        };
        NotificationPayload::new(self.motivational_title.clone(), body)
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            morning: NotificationPayload::new(
                "Good morning!",
                "Start your day strong. Check in on today's habits.",
            ),
            evening: NotificationPayload::new(
                "Evening check-in",
                "How did today go? Mark off the habits you completed.",
            ),
            streak: NotificationPayload::new(
                "Keep your streak alive",
                "You're on a {streak}-day {habit} streak. Don't break it today!",
            ),
            motivational_title: "A little motivation".into(),
            motivational: vec![
                "Small steps every day add up to big results.".into(),
                "Consistency beats intensity.".into(),
                "You don't have to be perfect, just keep showing up.".into(),
                "Every habit you complete is a vote for who you want to become.".into(),
                "Progress, not perfection.".into(),
            ],
            test: NotificationPayload::new(
                "Test notification",
                "Notifications are working.",
            ),
        }
    }
}

fn convert_defaults(raw: RawDefaults) -> NotificationSettings {
    let fallback = NotificationSettings::default();
    let time = |value: Option<String>, default: TimeOfDay| {
        value
            .and_then(|v| TimeOfDay::parse(&v).ok())
            .unwrap_or(default)
    };

    NotificationSettings::first_run(
        time(raw.morning_time, fallback.morning_time),
        time(raw.evening_time, fallback.evening_time),
        time(raw.quiet_hours_start, fallback.quiet_hours_start),
        time(raw.quiet_hours_end, fallback.quiet_hours_end),
    )
}
