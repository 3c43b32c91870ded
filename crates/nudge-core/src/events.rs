//! Outcomes reported by the scheduler

use chrono::NaiveDate;
use nudge_api::{ReminderCategory, ReminderKey};
use nudge_host_api::DeliveryError;
use std::fmt;

/// Delivery operation attempted for one reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOp {
    Arm,
    Cancel,
}

impl fmt::Display for DeliveryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOp::Arm => f.write_str("arm"),
            DeliveryOp::Cancel => f.write_str("cancel"),
        }
    }
}

/// A single reminder the delivery backend refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub key: ReminderKey,
    pub op: DeliveryOp,
    pub error: DeliveryError,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Local date the pass ran for
    pub date: NaiveDate,
    pub armed: Vec<ReminderKey>,
    pub cancelled: Vec<ReminderKey>,
    /// Entries already armed with identical content
    pub unchanged: usize,
    pub failures: Vec<EntryFailure>,
}

impl RecomputeReport {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            armed: Vec::new(),
            cancelled: Vec::new(),
            unchanged: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether the pass changed anything on the delivery backend
    pub fn is_noop(&self) -> bool {
        self.armed.is_empty() && self.cancelled.is_empty() && self.failures.is_empty()
    }

    pub fn permission_denied(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_permission_denied())
    }

    /// Categories with at least one failed entry, deduplicated
    pub fn failed_categories(&self) -> Vec<ReminderCategory> {
        let mut categories: Vec<_> = self.failures.iter().map(|f| f.key.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// Outcome of a recompute request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// This caller ran the pass (plus any passes requested meanwhile)
    Completed(RecomputeReport),
    /// Another caller was running passes; carries the report of the pass
    /// that served this request
    Coalesced(RecomputeReport),
}

impl RecomputeOutcome {
    pub fn report(&self) -> &RecomputeReport {
        match self {
            RecomputeOutcome::Completed(report) | RecomputeOutcome::Coalesced(report) => report,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        matches!(self, RecomputeOutcome::Coalesced(_))
    }
}

/// Some reminders could not be armed or cancelled; the rest were applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub failures: Vec<EntryFailure>,
}

impl From<&RecomputeReport> for PartialFailure {
    fn from(report: &RecomputeReport) -> Self {
        Self {
            failures: report.failures.clone(),
        }
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} reminder(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, " [{} {}: {}]", failure.op, failure.key, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_util::HabitId;

    #[test]
    fn failed_categories_are_deduplicated() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut report = RecomputeReport::new(date);
        for habit in ["a", "b"] {
            report.failures.push(EntryFailure {
                key: ReminderKey::new(ReminderCategory::Streak, Some(HabitId::new(habit))),
                op: DeliveryOp::Arm,
                error: DeliveryError::Rejected("nope".into()),
            });
        }
        report.failures.push(EntryFailure {
            key: ReminderKey::daily(ReminderCategory::Evening),
            op: DeliveryOp::Arm,
            error: DeliveryError::PermissionDenied,
        });

        assert_eq!(
            report.failed_categories(),
            vec![ReminderCategory::Evening, ReminderCategory::Streak]
        );
        assert!(report.permission_denied());
        assert!(!report.is_success());

        let partial = PartialFailure::from(&report);
        assert!(partial.to_string().starts_with("3 reminder(s) failed"));
        assert!(partial.to_string().contains("arm streak:a"));
    }
}
