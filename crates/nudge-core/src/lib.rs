//! Reminder scheduling core for nudge
//!
//! This crate contains:
//! - Streak calculation over a habit's completion history
//! - The reminder policy (settings + time + streaks -> desired reminders)
//! - The scheduler that reconciles armed reminders with the delivery backend
//! - The settings store and the `NotificationService` façade

mod clock;
mod events;
mod policy;
mod scheduler;
mod service;
mod settings;
mod streak;

pub use clock::*;
pub use events::*;
pub use policy::*;
pub use scheduler::*;
pub use service::*;
pub use settings::*;
pub use streak::*;

use nudge_api::PatchError;
use nudge_store::StoreError;
use nudge_util::{HabitId, MalformedTimeError};
use thiserror::Error;

/// Errors surfaced by the notification service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    MalformedTime(#[from] MalformedTimeError),

    #[error("Unknown settings field: {0}")]
    UnknownField(String),

    #[error("Invalid settings value: {0}")]
    InvalidValue(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("{0}")]
    Delivery(PartialFailure),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Habit not found: {0}")]
    HabitNotFound(HabitId),
}

impl From<PatchError> for ServiceError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::UnknownField(field) => ServiceError::UnknownField(field),
            other => ServiceError::InvalidValue(other.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
