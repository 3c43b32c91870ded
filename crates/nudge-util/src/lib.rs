//! Shared utilities for nudge
//!
//! This crate provides:
//! - ID types (HabitId, HandleId)
//! - Time utilities (HH:MM time of day, circular windows, mock wall clock)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
