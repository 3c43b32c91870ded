//! Local platform backend for nudge
//!
//! Provides:
//! - A delivery backend firing notifications from in-process tokio timers
//! - A habit source reading a JSON file on every snapshot

mod adapter;
mod habits;

pub use adapter::*;
pub use habits::*;
