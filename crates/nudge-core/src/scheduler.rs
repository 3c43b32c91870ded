//! Notification scheduler
//!
//! Owns the set of currently armed reminders and reconciles it against the
//! policy's desired schedule. Only the difference is sent to the delivery
//! backend, so repeated recomputes with unchanged inputs issue no calls.
//!
//! Recompute requests never run concurrently. A request arriving while a pass
//! is in flight is recorded in a single pending slot (latest wins); the running
//! caller runs one more pass and the waiting caller receives that pass's report.
//! Every pass reads the settings from the shared `SettingsStore` when it starts.

use chrono::{DateTime, Local, NaiveDate};
use nudge_api::{
    ArmedNotification, FireAt, NotificationPayload, NotificationSettings, ReminderCategory,
    ReminderKey,
};
use nudge_host_api::{
    DeliveryError, DeliveryHandle, DeliveryResult, HabitSource, NotificationDelivery,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    DeliveryOp, EntryFailure, HabitStreak, RecomputeOutcome, RecomputeReport, ReminderPolicy,
    SettingsStore, compute_streak,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An armed reminder and the handle needed to cancel it
#[derive(Debug, Clone)]
struct ArmedEntry {
    notification: ArmedNotification,
    handle: DeliveryHandle,
}

#[derive(Debug, Default)]
struct SchedulerState {
    armed: BTreeMap<ReminderKey, ArmedEntry>,
}

/// Recompute requests and the progress of the passes serving them
#[derive(Debug, Default)]
struct RequestQueue {
    /// Latest request not yet picked up by a pass
    pending: Option<DateTime<Local>>,
    /// Sequence number of the latest request
    requested: u64,
    /// Latest request covered by a finished pass
    served: u64,
    /// Some caller is running passes
    running: bool,
    last_report: Option<RecomputeReport>,
}

enum Claim {
    Run(DateTime<Local>, u64),
    Served(RecomputeReport),
    Wait,
}

/// Clears the running flag if the running caller is dropped mid-pass
struct RunningGuard<'a> {
    requests: &'a watch::Sender<RequestQueue>,
    finished: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.requests.send_modify(|q| q.running = false);
        }
    }
}

/// Reconciles armed reminders with the reminder policy
pub struct Scheduler {
    delivery: Arc<dyn NotificationDelivery>,
    habits: Arc<dyn HabitSource>,
    policy: ReminderPolicy,
    settings: Arc<SettingsStore>,
    requests: watch::Sender<RequestQueue>,
    last_recompute_date: Mutex<Option<NaiveDate>>,
    state: tokio::sync::Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        delivery: Arc<dyn NotificationDelivery>,
        habits: Arc<dyn HabitSource>,
        policy: ReminderPolicy,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let (requests, _) = watch::channel(RequestQueue::default());
        Self {
            delivery,
            habits,
            policy,
            settings,
            requests,
            last_recompute_date: Mutex::new(None),
            state: tokio::sync::Mutex::new(SchedulerState::default()),
        }
    }

    /// Settings the next pass will use
    pub fn settings(&self) -> NotificationSettings {
        self.settings.get()
    }

    /// Reconcile after the settings store changed
    pub async fn on_settings_changed(&self, now: DateTime<Local>) -> RecomputeOutcome {
        debug!(enabled = self.settings.get().enabled, "Settings changed");
        self.recompute(now).await
    }

    /// Reconcile for a new local date
    pub async fn on_date_rolled(&self, now: DateTime<Local>) -> RecomputeOutcome {
        info!(date = %now.date_naive(), "Local date changed, recomputing reminders");
        self.recompute(now).await
    }

    /// Whether `now` falls on a different local date than the last completed pass
    pub fn needs_date_roll(&self, now: &DateTime<Local>) -> bool {
        *lock(&self.last_recompute_date) != Some(now.date_naive())
    }

    /// Request a reconciliation pass.
    ///
    /// If another caller is already running passes, waits for the pass that
    /// picks up this request and returns its report as `Coalesced`.
    pub async fn recompute(&self, now: DateTime<Local>) -> RecomputeOutcome {
        let mut progress = self.requests.subscribe();
        let mut seq = 0;
        self.requests.send_if_modified(|q| {
            q.requested += 1;
            seq = q.requested;
            q.pending = Some(now);
            false
        });

        loop {
            match self.claim(seq, now) {
                Claim::Run(at, covers) => {
                    return RecomputeOutcome::Completed(self.run_passes(at, covers).await);
                }
                Claim::Served(report) => return RecomputeOutcome::Coalesced(report),
                Claim::Wait => {
                    debug!(seq, "Recompute already in flight, request coalesced");
                    // The sender lives in `self`, so the channel cannot close here
                    let _ = progress.wait_for(|q| q.served >= seq || !q.running).await;
                }
            }
        }
    }

    /// Fire a notification immediately, bypassing the policy and the armed set
    pub async fn send_immediate(
        &self,
        category: ReminderCategory,
        payload: &NotificationPayload,
    ) -> DeliveryResult<()> {
        match self.delivery.send_now(payload).await {
            Ok(()) => {
                info!(%category, title = %payload.title, "Notification sent");
                Ok(())
            }
            Err(e) => {
                warn!(%category, error = %e, "Immediate notification failed");
                Err(e)
            }
        }
    }

    /// Snapshot of the armed set; waits for any in-flight pass
    pub async fn armed(&self) -> Vec<ArmedNotification> {
        let state = self.state.lock().await;
        state
            .armed
            .values()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    /// Decide whether this request is already served, must wait, or runs now
    fn claim(&self, seq: u64, now: DateTime<Local>) -> Claim {
        let mut claim = Claim::Wait;
        self.requests.send_if_modified(|q| {
            if q.served >= seq
                && let Some(report) = &q.last_report
            {
                claim = Claim::Served(report.clone());
            } else if !q.running {
                q.running = true;
                // A dropped runner may have taken this request without serving it
                claim = Claim::Run(q.pending.take().unwrap_or(now), q.requested);
            }
            false
        });
        claim
    }

    /// Run passes until no request is pending, then release the running flag
    async fn run_passes(&self, mut now: DateTime<Local>, mut covers: u64) -> RecomputeReport {
        let mut running = RunningGuard {
            requests: &self.requests,
            finished: false,
        };
        let mut state = self.state.lock().await;

        loop {
            let report = self.run_pass(&mut state, now).await;

            let mut next = None;
            self.requests.send_modify(|q| {
                q.served = covers;
                q.last_report = Some(report.clone());
                match q.pending.take() {
                    Some(at) => next = Some((at, q.requested)),
                    None => q.running = false,
                }
            });

            match next {
                Some((at, requested)) => {
                    now = at;
                    covers = requested;
                }
                None => {
                    running.finished = true;
                    return report;
                }
            }
        }
    }

    async fn run_pass(&self, state: &mut SchedulerState, now: DateTime<Local>) -> RecomputeReport {
        let settings = self.settings();
        let habits = self.habits.list_habits();
        let today = now.date_naive();

        let streaks: Vec<HabitStreak<'_>> = habits
            .iter()
            .map(|habit| HabitStreak {
                habit,
                streak: compute_streak(habit, today),
            })
            .collect();
        let desired = self.policy.desired(&settings, &now, &streaks);

        let mut report = RecomputeReport::new(today);

        // Cancel entries that are no longer wanted or whose content changed
        let stale: Vec<ReminderKey> = state
            .armed
            .iter()
            .filter(|(key, entry)| desired.get(*key) != Some(&entry.notification))
            .map(|(key, _)| key.clone())
            .collect();

        for key in stale {
            let Some(handle) = state.armed.get(&key).map(|e| e.handle.clone()) else {
                continue;
            };
            match self.delivery.cancel(&handle).await {
                Ok(()) => {
                    debug!(%key, "Reminder cancelled");
                    state.armed.remove(&key);
                    report.cancelled.push(key);
                }
                Err(DeliveryError::HandleNotFound) => {
                    debug!(%key, "Reminder already gone from delivery backend");
                    state.armed.remove(&key);
                    report.cancelled.push(key);
                }
                Err(e) => {
                    warn!(%key, error = %e, "Failed to cancel reminder");
                    report.failures.push(EntryFailure {
                        key,
                        op: DeliveryOp::Cancel,
                        error: e,
                    });
                }
            }
        }

        for (key, notification) in desired {
            match state.armed.get(&key) {
                Some(entry) if entry.notification == notification => {
                    report.unchanged += 1;
                    continue;
                }
                // Stale entry whose cancel failed; never arm a second one
                Some(_) => continue,
                None => {}
            }

            let result = match notification.fire_at {
                FireAt::Daily(time) => {
                    self.delivery
                        .schedule_recurring_daily(time, &notification.payload)
                        .await
                }
                FireAt::Once(at) => self.delivery.schedule_once(at, &notification.payload).await,
            };

            match result {
                Ok(handle) => {
                    debug!(%key, fire_at = %notification.fire_at, "Reminder armed");
                    state.armed.insert(
                        key.clone(),
                        ArmedEntry {
                            notification,
                            handle,
                        },
                    );
                    report.armed.push(key);
                }
                Err(e) => {
                    warn!(%key, error = %e, "Failed to arm reminder");
                    report.failures.push(EntryFailure {
                        key,
                        op: DeliveryOp::Arm,
                        error: e,
                    });
                }
            }
        }

        *lock(&self.last_recompute_date) = Some(today);

        info!(
            %today,
            armed = report.armed.len(),
            cancelled = report.cancelled.len(),
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "Reminders recomputed"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use nudge_api::{HabitSummary, SettingsPatch};
    use nudge_host_api::{DeliveryCall, MockDelivery, StaticHabits};
    use nudge_store::MemoryStore;
    use nudge_util::HabitId;
    use std::time::Duration;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    fn enabled() -> NotificationSettings {
        NotificationSettings {
            enabled: true,
            ..Default::default()
        }
    }

    struct Fixture {
        delivery: Arc<MockDelivery>,
        habits: Arc<StaticHabits>,
        settings: Arc<SettingsStore>,
        scheduler: Scheduler,
    }

    impl Fixture {
        fn new(habits: Vec<HabitSummary>) -> Self {
            let delivery = Arc::new(MockDelivery::new());
            let habits = Arc::new(StaticHabits::new(habits));
            let settings =
                Arc::new(SettingsStore::load(Arc::new(MemoryStore::new()), &enabled()).unwrap());
            let scheduler = Scheduler::new(
                delivery.clone(),
                habits.clone(),
                ReminderPolicy::default(),
                settings.clone(),
            );
            Self {
                delivery,
                habits,
                settings,
                scheduler,
            }
        }

        fn set(&self, pairs: &[(&str, &str)]) {
            let patch = SettingsPatch::from_pairs(pairs.iter().copied()).unwrap();
            self.settings.update(&patch).unwrap();
        }

        async fn change(&self, pairs: &[(&str, &str)], now: DateTime<Local>) -> RecomputeReport {
            self.set(pairs);
            report(self.scheduler.on_settings_changed(now).await)
        }
    }

    fn reading_habit() -> HabitSummary {
        let created = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        HabitSummary::new("read", "Read", created).with_completions(
            (10..=14).map(|d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap()),
        )
    }

    fn report(outcome: RecomputeOutcome) -> RecomputeReport {
        match outcome {
            RecomputeOutcome::Completed(report) => report,
            RecomputeOutcome::Coalesced(_) => panic!("expected a completed pass"),
        }
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let f = Fixture::new(vec![reading_habit()]);
        let now = at(15, 9, 0);

        let first = report(f.scheduler.recompute(now).await);
        assert_eq!(first.armed.len(), 3);
        let calls = f.delivery.call_count();

        let second = report(f.scheduler.recompute(now).await);
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 3);
        assert_eq!(f.delivery.call_count(), calls);
    }

    #[tokio::test]
    async fn disabling_cancels_everything() {
        let f = Fixture::new(vec![reading_habit()]);
        let now = at(15, 9, 0);
        f.scheduler.recompute(now).await;
        assert_eq!(f.delivery.scheduled().len(), 3);

        let result = f.change(&[("enabled", "false")], now).await;
        assert_eq!(result.cancelled.len(), 3);
        assert!(f.delivery.scheduled().is_empty());
        assert!(f.scheduler.armed().await.is_empty());
    }

    #[tokio::test]
    async fn changed_time_cancels_then_rearms() {
        let f = Fixture::new(vec![]);
        let now = at(15, 9, 0);
        f.scheduler.recompute(now).await;
        f.delivery.clear_calls();

        let result = f
            .change(&[("morningTime", "06:30"), ("quietHoursEnd", "06:00")], now)
            .await;
        assert_eq!(result.cancelled.len(), 1);
        assert_eq!(result.armed.len(), 1);
        assert_eq!(result.unchanged, 1);

        let calls = f.delivery.calls();
        assert!(matches!(calls[0], DeliveryCall::Cancel { .. }));
        assert!(matches!(calls[1], DeliveryCall::ScheduleDaily { .. }));
    }

    #[tokio::test]
    async fn failed_arm_is_retried_next_pass() {
        let f = Fixture::new(vec![]);
        f.delivery.fail_title("Evening check-in");
        let now = at(15, 9, 0);

        let first = report(f.scheduler.recompute(now).await);
        assert_eq!(first.armed, vec![ReminderKey::daily(ReminderCategory::Morning)]);
        assert_eq!(first.failed_categories(), vec![ReminderCategory::Evening]);

        f.delivery.clear_failures();
        let second = report(f.scheduler.recompute(now).await);
        assert_eq!(second.armed, vec![ReminderKey::daily(ReminderCategory::Evening)]);
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn failed_cancel_keeps_entry() {
        let f = Fixture::new(vec![]);
        let now = at(15, 9, 0);
        f.scheduler.recompute(now).await;

        f.delivery
            .fail_cancel
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let result = f.change(&[("enabled", "false")], now).await;
        assert_eq!(result.failures.len(), 2);
        assert_eq!(f.scheduler.armed().await.len(), 2);

        f.delivery.clear_failures();
        let result = report(f.scheduler.recompute(now).await);
        assert_eq!(result.cancelled.len(), 2);
        assert!(f.scheduler.armed().await.is_empty());
    }

    #[tokio::test]
    async fn completing_habit_withdraws_streak_reminder() {
        let f = Fixture::new(vec![reading_habit()]);
        let now = at(15, 9, 0);
        f.scheduler.recompute(now).await;
        let streak_key = ReminderKey::new(ReminderCategory::Streak, Some(HabitId::new("read")));
        assert!(f.scheduler.armed().await.iter().any(|a| a.key() == streak_key));

        f.habits.complete(&HabitId::new("read"), now.date_naive());
        let result = report(f.scheduler.recompute(at(15, 10, 0)).await);
        assert_eq!(result.cancelled, vec![streak_key]);
        assert_eq!(f.delivery.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn date_roll_detection() {
        let f = Fixture::new(vec![]);
        let now = at(15, 23, 59);
        assert!(f.scheduler.needs_date_roll(&now));

        f.scheduler.recompute(now).await;
        assert!(!f.scheduler.needs_date_roll(&now));
        assert!(f.scheduler.needs_date_roll(&at(16, 0, 1)));
    }

    #[tokio::test]
    async fn concurrent_requests_coalesce() {
        let f = Fixture::new(vec![]);
        f.scheduler.recompute(at(15, 9, 0)).await;
        f.delivery.set_call_delay(Some(Duration::from_millis(20)));

        let (first, second) = tokio::join!(
            async {
                f.set(&[("motivationalMessages", "true")]);
                f.scheduler.on_settings_changed(at(15, 9, 5)).await
            },
            async {
                f.set(&[("morningReminders", "false")]);
                f.scheduler.on_settings_changed(at(15, 9, 6)).await
            },
        );

        // The running caller picked up the second request and ran it last
        assert!(!first.is_coalesced());
        assert!(second.is_coalesced());
        assert_eq!(first, RecomputeOutcome::Completed(second.report().clone()));
        assert_eq!(
            second.report().cancelled,
            vec![ReminderKey::daily(ReminderCategory::Morning)]
        );

        let mut categories: Vec<_> = f
            .scheduler
            .armed()
            .await
            .iter()
            .map(|a| a.category)
            .collect();
        categories.sort();
        assert_eq!(
            categories,
            vec![ReminderCategory::Evening, ReminderCategory::Motivational]
        );
    }

    #[tokio::test]
    async fn armed_snapshot_does_not_swallow_requests() {
        let f = Fixture::new(vec![]);
        let now = at(15, 9, 0);
        f.delivery.set_call_delay(Some(Duration::from_millis(20)));

        // The snapshot queues on the armed set while the first pass runs
        let (outcome, _) = tokio::join!(
            async {
                f.scheduler.recompute(now).await;
                f.set(&[("enabled", "false")]);
                f.scheduler.on_settings_changed(now).await
            },
            f.scheduler.armed(),
        );

        assert!(!outcome.is_coalesced());
        assert_eq!(outcome.report().cancelled.len(), 2);
        assert!(f.scheduler.armed().await.is_empty());
        assert!(f.delivery.scheduled().is_empty());
    }

    #[tokio::test]
    async fn send_immediate_bypasses_policy() {
        let f = Fixture::new(vec![]);
        f.change(&[("enabled", "false")], at(15, 23, 0)).await;

        let payload = NotificationPayload::new("Test", "hello");
        f.scheduler
            .send_immediate(ReminderCategory::Test, &payload)
            .await
            .unwrap();
        assert_eq!(f.delivery.sent(), vec![payload]);
        assert!(f.scheduler.armed().await.is_empty());
    }
}
