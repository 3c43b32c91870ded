//! In-process timer delivery backend

use async_trait::async_trait;
use chrono::{DateTime, Local};
use nudge_api::NotificationPayload;
use nudge_host_api::{
    DeliveryError, DeliveryHandle, DeliveryHandlePayload, DeliveryResult, NotificationDelivery,
};
use nudge_util::{HandleId, TimeOfDay};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A notification that reached the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub payload: NotificationPayload,
    pub delivered_at: DateTime<Local>,
}

type TimerMap = Arc<Mutex<HashMap<HandleId, JoinHandle<()>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn until(at: DateTime<Local>) -> std::time::Duration {
    (at - nudge_util::now()).to_std().unwrap_or_default()
}

/// Delivery backend that fires notifications from tokio timer tasks.
///
/// Fired notifications are logged and sent to the channel returned by
/// [`LocalDelivery::subscribe`]. Must be used from within a tokio runtime.
pub struct LocalDelivery {
    next_timer: AtomicU64,
    timers: TimerMap,
    event_tx: mpsc::UnboundedSender<DeliveredNotification>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<DeliveredNotification>>>,
}

impl LocalDelivery {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            next_timer: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Take the receiver of delivered notifications (only once)
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<DeliveredNotification>> {
        lock(&self.event_rx).take()
    }

    /// Number of timers still pending
    pub fn pending_count(&self) -> usize {
        lock(&self.timers).len()
    }

    fn new_handle(&self) -> DeliveryHandle {
        let timer = self.next_timer.fetch_add(1, Ordering::SeqCst);
        DeliveryHandle::new(DeliveryHandlePayload::Local { timer })
    }

    fn register(&self, handle: &DeliveryHandle, task: JoinHandle<()>) {
        lock(&self.timers).insert(handle.id, task);
    }
}

impl Default for LocalDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalDelivery {
    fn drop(&mut self) {
        for (_, task) in lock(&self.timers).drain() {
            task.abort();
        }
    }
}

fn deliver(tx: &mpsc::UnboundedSender<DeliveredNotification>, payload: &NotificationPayload) {
    info!(title = %payload.title, body = %payload.body, "Notification delivered");
    let event = DeliveredNotification {
        payload: payload.clone(),
        delivered_at: nudge_util::now(),
    };
    if tx.send(event).is_err() {
        debug!("No subscriber for delivered notifications");
    }
}

#[async_trait]
impl NotificationDelivery for LocalDelivery {
    async fn schedule_recurring_daily(
        &self,
        time: TimeOfDay,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle> {
        let handle = self.new_handle();
        let tx = self.event_tx.clone();
        let payload = payload.clone();

        let task = tokio::spawn(async move {
            loop {
                let Some(next) = time.next_occurrence(&nudge_util::now()) else {
                    warn!(%time, "No next occurrence for daily reminder, stopping timer");
                    return;
                };
                tokio::time::sleep(until(next)).await;
                deliver(&tx, &payload);
            }
        });
        self.register(&handle, task);

        debug!(handle = %handle.id, %time, "Daily timer started");
        Ok(handle)
    }

    async fn schedule_once(
        &self,
        at: DateTime<Local>,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle> {
        if at <= nudge_util::now() {
            return Err(DeliveryError::Rejected(format!(
                "fire time {} is in the past",
                at.format("%Y-%m-%d %H:%M")
            )));
        }

        let handle = self.new_handle();
        let id = handle.id;
        let tx = self.event_tx.clone();
        let timers = self.timers.clone();
        let payload = payload.clone();

        // Hold the map lock while spawning so the task cannot remove itself
        // before it is registered
        let mut map = lock(&self.timers);
        let task = tokio::spawn(async move {
            tokio::time::sleep(until(at)).await;
            deliver(&tx, &payload);
            lock(&timers).remove(&id);
        });
        map.insert(id, task);
        drop(map);

        debug!(handle = %id, at = %at.format("%Y-%m-%d %H:%M"), "One-shot timer started");
        Ok(handle)
    }

    async fn cancel(&self, handle: &DeliveryHandle) -> DeliveryResult<()> {
        match lock(&self.timers).remove(&handle.id) {
            Some(task) => {
                task.abort();
                debug!(handle = %handle.id, "Timer cancelled");
                Ok(())
            }
            None => Err(DeliveryError::HandleNotFound),
        }
    }

    async fn send_now(&self, payload: &NotificationPayload) -> DeliveryResult<()> {
        deliver(&self.event_tx, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(title: &str) -> NotificationPayload {
        NotificationPayload::new(title, "body")
    }

    #[tokio::test]
    async fn send_now_reaches_subscriber() {
        let delivery = LocalDelivery::new();
        let mut rx = delivery.subscribe().unwrap();
        assert!(delivery.subscribe().is_none());

        delivery.send_now(&payload("Test")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.payload.title, "Test");
    }

    #[tokio::test]
    async fn once_fires_and_clears_itself() {
        let delivery = LocalDelivery::new();
        let mut rx = delivery.subscribe().unwrap();
        let at = nudge_util::now() + chrono::Duration::milliseconds(50);

        delivery.schedule_once(at, &payload("Soon")).await.unwrap();
        assert_eq!(delivery.pending_count(), 1);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload.title, "Soon");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(delivery.pending_count(), 0);
    }

    #[tokio::test]
    async fn once_in_the_past_is_rejected() {
        let delivery = LocalDelivery::new();
        let at = nudge_util::now() - chrono::Duration::minutes(1);
        assert!(matches!(
            delivery.schedule_once(at, &payload("Late")).await,
            Err(DeliveryError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn cancel_stops_timer() {
        let delivery = LocalDelivery::new();
        let mut rx = delivery.subscribe().unwrap();
        let at = nudge_util::now() + chrono::Duration::milliseconds(50);

        let handle = delivery.schedule_once(at, &payload("Never")).await.unwrap();
        delivery.cancel(&handle).await.unwrap();
        assert_eq!(delivery.cancel(&handle).await, Err(DeliveryError::HandleNotFound));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn daily_timer_is_pending_until_cancelled() {
        let delivery = LocalDelivery::new();
        let time = TimeOfDay::new(3, 0).unwrap();

        let handle = delivery
            .schedule_recurring_daily(time, &payload("Daily"))
            .await
            .unwrap();
        assert_eq!(delivery.pending_count(), 1);

        delivery.cancel(&handle).await.unwrap();
        assert_eq!(delivery.pending_count(), 0);
    }
}
