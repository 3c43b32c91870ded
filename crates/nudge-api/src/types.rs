//! Shared types for habits, streaks and reminders

use chrono::{DateTime, Local, NaiveDate};
use nudge_util::{DaysOfWeek, HabitId, TimeOfDay};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How often a habit is meant to be completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frequency {
    /// Every calendar day
    #[default]
    Daily,
    /// Only on the given weekdays
    DaysOfWeek { days: DaysOfWeek },
    /// At least `times` completions per ISO week
    Weekly { times: u8 },
}

/// Read-only projection of a habit supplied by the habit collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitSummary {
    pub id: HabitId,
    pub name: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub completion_dates: BTreeSet<NaiveDate>,
    pub created_on: NaiveDate,
}

impl HabitSummary {
    pub fn new(id: impl Into<HabitId>, name: impl Into<String>, created_on: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            frequency: Frequency::Daily,
            completion_dates: BTreeSet::new(),
            created_on,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_completions(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.completion_dates.extend(dates);
        self
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completion_dates.contains(&date)
    }
}

/// Streak state of a single habit; computed on demand, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResult {
    /// Consecutive qualifying periods ending today or yesterday
    pub current_streak: u32,
    pub completed_today: bool,
    /// The streak survives only if the habit is completed before the day ends
    pub at_risk: bool,
}

/// Class of reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderCategory {
    Morning,
    Evening,
    Streak,
    Motivational,
    Test,
}

impl ReminderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
            Self::Streak => "streak",
            Self::Motivational => "motivational",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an armed reminder: at most one entry exists per key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReminderKey {
    pub category: ReminderCategory,
    pub habit_id: Option<HabitId>,
}

impl ReminderKey {
    pub fn new(category: ReminderCategory, habit_id: Option<HabitId>) -> Self {
        Self { category, habit_id }
    }

    pub fn daily(category: ReminderCategory) -> Self {
        Self::new(category, None)
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.habit_id {
            Some(id) => write!(f, "{}:{}", self.category, id),
            None => write!(f, "{}", self.category),
        }
    }
}

/// When a reminder fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum FireAt {
    /// Every day at the given local time
    Daily(TimeOfDay),
    /// Once, at an absolute instant
    Once(DateTime<Local>),
}

impl fmt::Display for FireAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FireAt::Daily(time) => write!(f, "daily at {}", time),
            FireAt::Once(at) => write!(f, "once at {}", at.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// Title and body shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A reminder the delivery backend has been (or should be) told to fire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedNotification {
    pub category: ReminderCategory,
    pub fire_at: FireAt,
    pub habit_id: Option<HabitId>,
    pub payload: NotificationPayload,
}

impl ArmedNotification {
    pub fn key(&self) -> ReminderKey {
        ReminderKey::new(self.category, self.habit_id.clone())
    }
}
