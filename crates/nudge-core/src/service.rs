//! Notification service façade

use nudge_api::{
    ArmedNotification, HabitSummary, NotificationSettings, ReminderCategory, SettingsPatch,
    StreakResult,
};
use nudge_config::{EngineConfig, MessageTemplates};
use nudge_host_api::{DeliveryResult, HabitSource, NotificationDelivery};
use nudge_store::KeyValueStore;
use nudge_util::HabitId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    Clock, PartialFailure, RecomputeOutcome, ReminderPolicy, Scheduler, ServiceError,
    ServiceResult, SettingsStore, compute_streak,
};

/// Entry point used by the binary and by embedders
pub struct NotificationService {
    settings: Arc<SettingsStore>,
    scheduler: Scheduler,
    delivery: Arc<dyn NotificationDelivery>,
    habits: Arc<dyn HabitSource>,
    clock: Arc<dyn Clock>,
    messages: MessageTemplates,
}

impl NotificationService {
    /// Load persisted settings and arm the initial schedule.
    ///
    /// Delivery failures during the initial pass are logged, not returned;
    /// they are retried on the next recompute.
    pub async fn load(
        config: &EngineConfig,
        store: Arc<dyn KeyValueStore>,
        delivery: Arc<dyn NotificationDelivery>,
        habits: Arc<dyn HabitSource>,
        clock: Arc<dyn Clock>,
    ) -> ServiceResult<Self> {
        let settings = Arc::new(SettingsStore::load(store, &config.defaults)?);
        let scheduler = Scheduler::new(
            delivery.clone(),
            habits.clone(),
            ReminderPolicy::new(config.reminders.clone()),
            settings.clone(),
        );

        let service = Self {
            settings,
            scheduler,
            delivery,
            habits,
            clock,
            messages: config.reminders.messages.clone(),
        };

        let initial = service.recompute().await;
        let report = initial.report();
        if !report.is_success() {
            warn!(
                failed = ?report.failed_categories(),
                "Some reminders could not be armed at startup"
            );
        }

        info!(
            enabled = service.settings.get().enabled,
            "Notification service loaded"
        );
        Ok(service)
    }

    pub fn get_settings(&self) -> NotificationSettings {
        self.settings.get()
    }

    /// Apply a partial settings update and reconcile the armed set.
    ///
    /// The new settings take effect even when an error is returned for a
    /// storage, permission or partial delivery failure. The reconciliation
    /// pass reads the settings current when it starts, not this update's copy.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> ServiceResult<RecomputeOutcome> {
        let change = self.settings.update(patch)?;

        let mut permission_denied = false;
        if change.was_enabled() && !self.delivery.request_permission().await {
            warn!("Notification permission denied by the user");
            permission_denied = true;
        }

        let outcome = self.scheduler.on_settings_changed(self.clock.now()).await;

        if let Some(e) = change.storage_error {
            return Err(ServiceError::Storage(e));
        }

        let report = outcome.report();
        if permission_denied || report.permission_denied() {
            return Err(ServiceError::PermissionDenied);
        }
        if !report.is_success() {
            return Err(ServiceError::Delivery(PartialFailure::from(report)));
        }

        Ok(outcome)
    }

    /// Pick up settings written by another process and reconcile if they changed
    pub async fn reload_settings(&self) -> ServiceResult<Option<RecomputeOutcome>> {
        let Some(settings) = self.settings.reload()? else {
            return Ok(None);
        };
        info!(enabled = settings.enabled, "Notification settings reloaded");
        Ok(Some(self.scheduler.on_settings_changed(self.clock.now()).await))
    }

    /// Streak of one habit as of the current local date
    pub fn get_streak(&self, habit_id: &HabitId) -> ServiceResult<StreakResult> {
        let today = self.clock.now().date_naive();
        self.habits
            .list_habits()
            .iter()
            .find(|h| &h.id == habit_id)
            .map(|h| compute_streak(h, today))
            .ok_or_else(|| ServiceError::HabitNotFound(habit_id.clone()))
    }

    /// Streaks of every habit in the collection
    pub fn streaks(&self) -> Vec<(HabitSummary, StreakResult)> {
        let today = self.clock.now().date_naive();
        self.habits
            .list_habits()
            .into_iter()
            .map(|h| {
                let streak = compute_streak(&h, today);
                (h, streak)
            })
            .collect()
    }

    /// Fire the test notification now, regardless of settings
    pub async fn test_fire(&self) -> DeliveryResult<()> {
        self.scheduler
            .send_immediate(ReminderCategory::Test, &self.messages.test)
            .await
    }

    /// Reconcile with the current time (e.g. after a habit completion)
    pub async fn recompute(&self) -> RecomputeOutcome {
        self.scheduler.recompute(self.clock.now()).await
    }

    /// Periodic check; recomputes when the local date has changed
    pub async fn tick(&self) -> Option<RecomputeOutcome> {
        let now = self.clock.now();
        if self.scheduler.needs_date_roll(&now) {
            Some(self.scheduler.on_date_rolled(now).await)
        } else {
            None
        }
    }

    /// Currently armed reminders
    pub async fn armed(&self) -> Vec<ArmedNotification> {
        self.scheduler.armed().await
    }
}
