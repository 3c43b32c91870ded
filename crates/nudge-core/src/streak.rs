//! Streak calculation
//!
//! Pure functions over a habit's completion history. The caller supplies
//! `today`; nothing here reads a clock.

use chrono::{Datelike, Days, NaiveDate};
use nudge_api::{Frequency, HabitSummary, StreakResult};

/// Compute the current streak of a habit as of `today`.
///
/// A habit not yet completed today keeps its streak (counted up to yesterday)
/// until the day has fully elapsed.
pub fn compute_streak(habit: &HabitSummary, today: NaiveDate) -> StreakResult {
    let completed_today = habit.is_completed_on(today);

    match habit.frequency {
        Frequency::Daily => day_streak(habit, today, completed_today, |_| true),
        Frequency::DaysOfWeek { days } => {
            day_streak(habit, today, completed_today, |d| days.contains(d.weekday()))
        }
        Frequency::Weekly { times } => week_streak(habit, today, completed_today, times),
    }
}

/// Earliest date the backward walk may visit
fn walk_floor(habit: &HabitSummary) -> Option<NaiveDate> {
    let earliest = *habit.completion_dates.iter().next()?;
    Some(earliest.min(habit.created_on))
}

fn day_streak(
    habit: &HabitSummary,
    today: NaiveDate,
    completed_today: bool,
    qualifies: impl Fn(NaiveDate) -> bool,
) -> StreakResult {
    let Some(floor) = walk_floor(habit) else {
        return StreakResult::default();
    };

    let mut cursor = if completed_today {
        Some(today)
    } else {
        today.pred_opt()
    };

    let mut streak = 0;
    while let Some(day) = cursor {
        if day < floor {
            break;
        }
        // Unscheduled days neither count nor break the streak
        if qualifies(day) {
            if !habit.is_completed_on(day) {
                break;
            }
            streak += 1;
        }
        cursor = day.pred_opt();
    }

    StreakResult {
        current_streak: streak,
        completed_today,
        at_risk: !completed_today && streak > 0 && qualifies(today),
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

fn week_streak(
    habit: &HabitSummary,
    today: NaiveDate,
    completed_today: bool,
    times: u8,
) -> StreakResult {
    let Some(floor) = walk_floor(habit) else {
        return StreakResult::default();
    };

    let required = times.max(1) as usize;
    let floor_week = week_start(floor);

    // Completions dated after today are ignored
    let satisfied = |start: NaiveDate| {
        let end = start
            .checked_add_days(Days::new(6))
            .unwrap_or(start)
            .min(today);
        habit.completion_dates.range(start..=end).count() >= required
    };

    let this_week = week_start(today);
    let this_week_done = satisfied(this_week);

    let mut cursor = if this_week_done {
        Some(this_week)
    } else {
        this_week.checked_sub_days(Days::new(7))
    };

    let mut streak = 0;
    while let Some(start) = cursor {
        if start < floor_week || !satisfied(start) {
            break;
        }
        streak += 1;
        cursor = start.checked_sub_days(Days::new(7));
    }

    StreakResult {
        current_streak: streak,
        completed_today,
        at_risk: !this_week_done && streak > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_util::DaysOfWeek;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn days_back(today: NaiveDate, range: std::ops::RangeInclusive<u64>) -> Vec<NaiveDate> {
        range
            .map(|n| today.checked_sub_days(Days::new(n)).unwrap())
            .collect()
    }

    fn habit(created_on: NaiveDate) -> HabitSummary {
        HabitSummary::new("stretch", "Stretch", created_on)
    }

    #[test]
    fn seven_days_including_today() {
        let today = date(2025, 6, 15);
        let h = habit(date(2025, 1, 1)).with_completions(days_back(today, 0..=6));

        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 7);
        assert!(result.completed_today);
        assert!(!result.at_risk);
    }

    #[test]
    fn six_days_pending_today_is_at_risk() {
        let today = date(2025, 6, 15);
        let h = habit(date(2025, 1, 1)).with_completions(days_back(today, 1..=6));

        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 6);
        assert!(!result.completed_today);
        assert!(result.at_risk);
    }

    #[test]
    fn no_completions() {
        let today = date(2025, 6, 15);
        let result = compute_streak(&habit(today), today);
        assert_eq!(result, StreakResult::default());
    }

    #[test]
    fn gap_stops_the_walk() {
        let today = date(2025, 6, 15);
        let mut dates = days_back(today, 0..=2);
        dates.extend(days_back(today, 4..=10));
        let h = habit(date(2025, 1, 1)).with_completions(dates);

        assert_eq!(compute_streak(&h, today).current_streak, 3);
    }

    #[test]
    fn missed_yesterday_breaks_streak() {
        let today = date(2025, 6, 15);
        let h = habit(date(2025, 1, 1)).with_completions(days_back(today, 2..=5));

        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 0);
        assert!(!result.at_risk);
    }

    #[test]
    fn only_today_completed() {
        let today = date(2025, 6, 15);
        let h = habit(today).with_completions([today]);

        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 1);
        assert!(result.completed_today);
    }

    #[test]
    fn future_completions_do_not_count() {
        let today = date(2025, 6, 15);
        let h = habit(date(2025, 1, 1)).with_completions([date(2025, 6, 16), date(2025, 6, 17)]);

        assert_eq!(compute_streak(&h, today).current_streak, 0);
    }

    #[test]
    fn weekday_habit_skips_weekends() {
        // 2025-06-16 is a Monday
        let monday = date(2025, 6, 16);
        let h = habit(date(2025, 1, 1))
            .with_frequency(Frequency::DaysOfWeek {
                days: DaysOfWeek::WEEKDAYS,
            })
            .with_completions([
                date(2025, 6, 11), // Wed
                date(2025, 6, 12), // Thu
                date(2025, 6, 13), // Fri
            ]);

        // Monday not done yet: weekend is skipped, Wed-Fri count
        let result = compute_streak(&h, monday);
        assert_eq!(result.current_streak, 3);
        assert!(result.at_risk);

        // On Sunday nothing is due, so the streak is not at risk
        let sunday = date(2025, 6, 15);
        let result = compute_streak(&h, sunday);
        assert_eq!(result.current_streak, 3);
        assert!(!result.at_risk);
    }

    #[test]
    fn empty_day_mask_terminates() {
        let today = date(2025, 6, 15);
        let h = habit(date(2025, 6, 1))
            .with_frequency(Frequency::DaysOfWeek {
                days: DaysOfWeek::NONE,
            })
            .with_completions([date(2025, 6, 10)]);

        assert_eq!(compute_streak(&h, today).current_streak, 0);
    }

    #[test]
    fn weekly_streak_counts_satisfied_weeks() {
        // Weeks starting Mon 2025-06-02, 06-09; today is Wed 2025-06-18
        let today = date(2025, 6, 18);
        let h = habit(date(2025, 5, 1))
            .with_frequency(Frequency::Weekly { times: 2 })
            .with_completions([
                date(2025, 6, 2),
                date(2025, 6, 4),
                date(2025, 6, 10),
                date(2025, 6, 14),
                date(2025, 6, 17),
            ]);

        // Current week has 1 of 2, so counting starts last week
        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 2);
        assert!(!result.completed_today);
        assert!(result.at_risk);

        // A second completion this week satisfies it
        let h = h.with_completions([today]);
        let result = compute_streak(&h, today);
        assert_eq!(result.current_streak, 3);
        assert!(result.completed_today);
        assert!(!result.at_risk);
    }

    #[test]
    fn weekly_streak_breaks_on_short_week() {
        let today = date(2025, 6, 18);
        let h = habit(date(2025, 5, 1))
            .with_frequency(Frequency::Weekly { times: 2 })
            .with_completions([date(2025, 6, 2), date(2025, 6, 4), date(2025, 6, 10)]);

        assert_eq!(compute_streak(&h, today).current_streak, 0);
    }
}
