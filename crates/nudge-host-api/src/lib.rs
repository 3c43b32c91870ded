//! Platform collaborator interfaces for nudge
//!
//! This crate defines the boundary between the scheduling core and the
//! platform: the notification delivery primitive (with its permission gate)
//! and the habit collection. It contains no platform code itself.

mod handle;
mod mock;
mod traits;

pub use handle::*;
pub use mock::*;
pub use traits::*;
