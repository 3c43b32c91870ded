//! Collaborator traits

use async_trait::async_trait;
use chrono::{DateTime, Local};
use nudge_api::{HabitSummary, NotificationPayload};
use nudge_util::TimeOfDay;
use thiserror::Error;

use crate::DeliveryHandle;

/// Errors from delivery operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Rejected by delivery backend: {0}")]
    Rejected(String),

    #[error("Unknown delivery handle")]
    HandleNotFound,

    #[error("Delivery backend unavailable: {0}")]
    Unavailable(String),
}

impl DeliveryError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeliveryError::PermissionDenied)
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Notification delivery primitive - implemented by platform backends
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    /// Fire every day at the given local time
    async fn schedule_recurring_daily(
        &self,
        time: TimeOfDay,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle>;

    /// Fire once at an absolute instant
    async fn schedule_once(
        &self,
        at: DateTime<Local>,
        payload: &NotificationPayload,
    ) -> DeliveryResult<DeliveryHandle>;

    /// Cancel a previously scheduled notification
    async fn cancel(&self, handle: &DeliveryHandle) -> DeliveryResult<()>;

    /// Fire immediately
    async fn send_now(&self, payload: &NotificationPayload) -> DeliveryResult<()>;

    /// Ask the user for permission to post notifications
    async fn request_permission(&self) -> bool {
        true
    }
}

/// Synchronous snapshot of the habit collection
pub trait HabitSource: Send + Sync {
    fn list_habits(&self) -> Vec<HabitSummary>;
}
