//! Notifications — the define/update/delete messages produced for clients.

use serde::{Deserialize, Serialize};

use crate::id::ClientId;
use crate::property::Property;
use crate::time::{Timestamp, now};

/// The three property lifecycle verbs a client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Define,
    Update,
    Delete,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Define => f.write_str("define"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Who a definition is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// Every connected client.
    All,
    /// A single client, typically the one that asked to enumerate.
    One(ClientId),
}

/// A snapshot of a property together with the verb that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub property: Property,
    /// Human-readable annotation; never used for control flow.
    pub message: Option<String>,
    pub timestamp: Timestamp,
}

impl Notification {
    #[must_use]
    pub fn new(kind: NotificationKind, property: Property, message: Option<String>) -> Self {
        Self {
            kind,
            property,
            message,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &str {
        &self.property.device
    }

    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property.name
    }
}
