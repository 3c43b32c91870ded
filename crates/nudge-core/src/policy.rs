//! Reminder policy
//!
//! Maps (settings, now, habits with their streaks) to the set of reminders
//! that should be armed. Pure: no I/O, no clock reads.

use chrono::{DateTime, Local};
use nudge_api::{
    ArmedNotification, FireAt, HabitSummary, NotificationSettings, ReminderCategory, ReminderKey,
    StreakResult,
};
use nudge_config::ReminderPolicyConfig;
use std::collections::BTreeMap;

/// The reminders that should be armed, keyed by identity
pub type DesiredSchedule = BTreeMap<ReminderKey, ArmedNotification>;

/// A habit paired with its streak as of the current date
#[derive(Debug, Clone, Copy)]
pub struct HabitStreak<'a> {
    pub habit: &'a HabitSummary,
    pub streak: StreakResult,
}

/// Decides which reminders to arm
#[derive(Debug, Clone, Default)]
pub struct ReminderPolicy {
    config: ReminderPolicyConfig,
}

impl ReminderPolicy {
    pub fn new(config: ReminderPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReminderPolicyConfig {
        &self.config
    }

    /// Compute the desired schedule.
    ///
    /// A reminder whose fire time falls in quiet hours is dropped, not moved.
    /// Same-day one-shots whose time has already passed are dropped too.
    pub fn desired(
        &self,
        settings: &NotificationSettings,
        now: &DateTime<Local>,
        habits: &[HabitStreak<'_>],
    ) -> DesiredSchedule {
        let mut schedule = DesiredSchedule::new();
        if !settings.enabled {
            return schedule;
        }

        let messages = &self.config.messages;
        let mut insert = |notification: ArmedNotification| {
            schedule.insert(notification.key(), notification);
        };

        if settings.morning_reminders && !settings.is_quiet(settings.morning_time) {
            insert(ArmedNotification {
                category: ReminderCategory::Morning,
                fire_at: FireAt::Daily(settings.morning_time),
                habit_id: None,
                payload: messages.morning.clone(),
            });
        }

        if settings.evening_reminders && !settings.is_quiet(settings.evening_time) {
            insert(ArmedNotification {
                category: ReminderCategory::Evening,
                fire_at: FireAt::Daily(settings.evening_time),
                habit_id: None,
                payload: messages.evening.clone(),
            });
        }

        if settings.streak_reminders
            && !settings.is_quiet(settings.evening_time)
            && let Some(at) = settings.evening_time.on(now.date_naive())
            && at > *now
        {
            for entry in habits.iter().filter(|h| h.streak.at_risk) {
                insert(ArmedNotification {
                    category: ReminderCategory::Streak,
                    fire_at: FireAt::Once(at),
                    habit_id: Some(entry.habit.id.clone()),
                    payload: messages.streak_for(&entry.habit.name, entry.streak.current_streak),
                });
            }
        }

        if settings.motivational_messages {
            let placement = self
                .config
                .motivational_placement
                .resolve(settings.morning_time, settings.evening_time);

            if !settings.is_quiet(placement)
                && let Some(at) = placement.next_occurrence(now)
            {
                insert(ArmedNotification {
                    category: ReminderCategory::Motivational,
                    fire_at: FireAt::Once(at),
                    habit_id: None,
                    payload: messages.motivational_for(at.date_naive()),
                });
            }
        }

        schedule
    }
}
