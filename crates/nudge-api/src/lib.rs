//! Domain types for nudge
//!
//! This crate defines the values exchanged between the scheduling core and
//! its collaborators:
//! - Notification settings and partial updates
//! - Habit summaries and streak results
//! - Reminder categories, keys and armed notifications

mod settings;
mod types;

pub use settings::*;
pub use types::*;

/// Persistence key under which `NotificationSettings` are stored
pub const SETTINGS_KEY: &str = "notification_settings";
