//! Property record — the durable form of a saved property.

use serde::{Deserialize, Serialize};

use crate::property::Property;
use crate::request::{ChangeRequest, RequestItem};
use crate::time::{Timestamp, now};

/// Saved item values of one property, keyed by `(device, property)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub device: String,
    pub property: String,
    pub items: Vec<RequestItem>,
    pub saved_at: Timestamp,
}

impl PropertyRecord {
    /// Capture the current writable values of `property`.
    #[must_use]
    pub fn capture(property: &Property) -> Self {
        let request = property.to_request();
        Self {
            device: request.device,
            property: request.property,
            items: request.items,
            saved_at: now(),
        }
    }

    /// Replay the record as a change request.
    #[must_use]
    pub fn into_request(self) -> ChangeRequest {
        ChangeRequest {
            device: self.device,
            property: self.property,
            items: self.items,
        }
    }
}
