//! Mock collaborators for testing

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use nudge_api::{FireAt, HabitSummary, NotificationPayload};
use nudge_util::{HabitId, HandleId, TimeOfDay};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{
    DeliveryError, DeliveryHandle, DeliveryHandlePayload, DeliveryResult, HabitSource,
    NotificationDelivery,
};

/// A call observed by the mock delivery backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryCall {
    ScheduleDaily {
        time: TimeOfDay,
        payload: NotificationPayload,
    },
    ScheduleOnce {
        at: DateTime<Local>,
        payload: NotificationPayload,
    },
    Cancel {
        handle: HandleId,
    },
    SendNow {
        payload: NotificationPayload,
    },
}

/// Notification scheduled on the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockScheduled {
    pub fire_at: FireAt,
    pub payload: NotificationPayload,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock delivery backend for unit/integration testing
pub struct MockDelivery {
    next_id: AtomicU64,
    calls: Mutex<Vec<DeliveryCall>>,
    scheduled: Mutex<HashMap<HandleId, MockScheduled>>,
    sent: Mutex<Vec<NotificationPayload>>,

    /// Schedule calls whose payload title is in this set fail
    pub fail_titles: Mutex<HashSet<String>>,

    /// Configure every schedule call to fail
    pub fail_schedule: AtomicBool,

    /// Configure cancel to fail
    pub fail_cancel: AtomicBool,

    /// Configure send_now to fail
    pub fail_send: AtomicBool,

    /// Permission state; when false every call fails with PermissionDenied
    pub permission_granted: AtomicBool,

    /// Artificial latency for every call
    pub call_delay: Mutex<Option<Duration>>,

    /// Time the user takes to answer the permission prompt
    pub permission_delay: Mutex<Option<Duration>>,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            scheduled: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            fail_titles: Mutex::new(HashSet::new()),
            fail_schedule: AtomicBool::new(false),
            fail_cancel: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            permission_granted: AtomicBool::new(true),
            call_delay: Mutex::new(None),
            permission_delay: Mutex::new(None),
        }
    }

    /// Make scheduling fail for payloads with this title
    pub fn fail_title(&self, title: impl Into<String>) {
        lock(&self.fail_titles).insert(title.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.fail_titles).clear();
        self.fail_schedule.store(false, Ordering::SeqCst);
        self.fail_cancel.store(false, Ordering::SeqCst);
        self.fail_send.store(false, Ordering::SeqCst);
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_call_delay(&self, delay: Option<Duration>) {
        *lock(&self.call_delay) = delay;
    }

    pub fn set_permission_delay(&self, delay: Option<Duration>) {
        *lock(&self.permission_delay) = delay;
    }

    /// All calls observed so far
    pub fn calls(&self) -> Vec<DeliveryCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Notifications currently scheduled (not cancelled)
    pub fn scheduled(&self) -> Vec<MockScheduled> {
        lock(&self.scheduled).values().cloned().collect()
    }

    /// Payloads fired through send_now
    pub fn sent(&self) -> Vec<NotificationPayload> {
        lock(&self.sent).clone()
    }

    fn record(&self, call: DeliveryCall) {
        lock(&self.calls).push(call);
    }

    async fn delay(&self) {
        let delay = *lock(&self.call_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_permission(&self) -> DeliveryResult<()> {
        if self.permission_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeliveryError::PermissionDenied)
        }
    }

    fn check_schedule(&self, payload: &NotificationPayload) -> DeliveryResult<()> {
        self.check_permission()?;
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected("Mock schedule failure".into()));
        }
        if lock(&self.fail_titles).contains(&payload.title) {
            return Err(DeliveryError::Rejected(format!(
                "Mock schedule failure for '{}'",
                payload.title
            )));
        }
        Ok(())
    }

    fn arm(&self, fire_at: FireAt, payload: &NotificationPayload) -> DeliveryHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = DeliveryHandle::new(DeliveryHandlePayload::Mock { id });
        lock(&self.scheduled).insert(
            handle.id,
            MockScheduled {
                fire_at,
                payload: payload.clone(),
            },
        );
        handle
    }
}

impl Default for MockDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDelivery for MockDelivery {
    async fn schedule_recurring_daily(
        &self,
        time: TimeOfDay,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle> {
        self.delay().await;
        self.record(DeliveryCall::ScheduleDaily {
            time,
            payload: payload.clone(),
        });
        self.check_schedule(payload)?;
        Ok(self.arm(FireAt::Daily(time), payload))
    }

    async fn schedule_once(
        &self,
        at: DateTime<Local>,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle> {
        self.delay().await;
        self.record(DeliveryCall::ScheduleOnce {
            at,
            payload: payload.clone(),
        });
        self.check_schedule(payload)?;
        Ok(self.arm(FireAt::Once(at), payload))
    }

    async fn cancel(&self, handle: &DeliveryHandle) -> DeliveryResult<()> {
        self.delay().await;
        self.record(DeliveryCall::Cancel { handle: handle.id });
        self.check_permission()?;
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected("Mock cancel failure".into()));
        }

        match lock(&self.scheduled).remove(&handle.id) {
            Some(_) => Ok(()),
            None => Err(DeliveryError::HandleNotFound),
        }
    }

    async fn send_now(&self, payload: &NotificationPayload) -> DeliveryResult<()> {
        self.delay().await;
        self.record(DeliveryCall::SendNow {
            payload: payload.clone(),
        });
        self.check_permission()?;
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected("Mock send failure".into()));
        }
        lock(&self.sent).push(payload.clone());
        Ok(())
    }

    async fn request_permission(&self) -> bool {
        let delay = *lock(&self.permission_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.permission_granted.load(Ordering::SeqCst)
    }
}

/// In-memory habit collection for testing
#[derive(Debug, Default)]
pub struct StaticHabits {
    habits: Mutex<Vec<HabitSummary>>,
}

impl StaticHabits {
    pub fn new(habits: Vec<HabitSummary>) -> Self {
        Self {
            habits: Mutex::new(habits),
        }
    }

    pub fn set_habits(&self, habits: Vec<HabitSummary>) {
        *lock(&self.habits) = habits;
    }

    /// Mark a habit complete on a date
    pub fn complete(&self, habit_id: &HabitId, date: NaiveDate) {
        if let Some(habit) = lock(&self.habits).iter_mut().find(|h| &h.id == habit_id) {
            habit.completion_dates.insert(date);
        }
    }
}

impl HabitSource for StaticHabits {
    fn list_habits(&self) -> Vec<HabitSummary> {
        lock(&self.habits).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(title: &str) -> NotificationPayload {
        NotificationPayload::new(title, "body")
    }

    #[tokio::test]
    async fn mock_schedule_and_cancel() {
        let delivery = MockDelivery::new();
        let time = TimeOfDay::new(8, 0).unwrap();

        let handle = delivery
            .schedule_recurring_daily(time, &payload("Morning"))
            .await
            .unwrap();
        assert_eq!(delivery.scheduled().len(), 1);

        delivery.cancel(&handle).await.unwrap();
        assert!(delivery.scheduled().is_empty());
        assert_eq!(delivery.call_count(), 2);

        // Cancelling twice fails
        assert_eq!(
            delivery.cancel(&handle).await,
            Err(DeliveryError::HandleNotFound)
        );
    }

    #[tokio::test]
    async fn mock_title_failure() {
        let delivery = MockDelivery::new();
        delivery.fail_title("Evening");
        let at = Local.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();

        assert!(delivery.schedule_once(at, &payload("Evening")).await.is_err());
        assert!(delivery.schedule_once(at, &payload("Streak")).await.is_ok());
        assert_eq!(delivery.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn mock_permission_denied() {
        let delivery = MockDelivery::new();
        delivery.set_permission(false);

        assert!(!delivery.request_permission().await);
        assert_eq!(
            delivery.send_now(&payload("Test")).await,
            Err(DeliveryError::PermissionDenied)
        );
        assert!(delivery.sent().is_empty());
    }

    #[test]
    fn static_habits_complete() {
        let created = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let habits = StaticHabits::new(vec![HabitSummary::new("read", "Read", created)]);

        habits.complete(&HabitId::new("read"), created);
        assert!(habits.list_habits()[0].is_completed_on(created));
    }
}
