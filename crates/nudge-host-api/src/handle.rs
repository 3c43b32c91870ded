//! Delivery handle abstraction

use nudge_util::HandleId;
use serde::{Deserialize, Serialize};

/// Opaque handle to a scheduled notification
///
/// Created by the delivery backend when a notification is scheduled and
/// handed back to it to cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryHandle {
    pub id: HandleId,

    /// Backend-specific payload (opaque to core)
    payload: DeliveryHandlePayload,
}

impl DeliveryHandle {
    pub fn new(payload: DeliveryHandlePayload) -> Self {
        Self {
            id: HandleId::new(),
            payload,
        }
    }

    pub fn payload(&self) -> &DeliveryHandlePayload {
        &self.payload
    }
}

/// Backend-specific handle payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DeliveryHandlePayload {
    /// In-process timer task
    Local { timer: u64 },

    /// Mock for testing
    Mock { id: u64 },
}
