//! Device lifecycle — `Detached → Attached → (Connected ↔ Disconnected) → Detached`.

use serde::{Deserialize, Serialize};

/// Where a device stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceLifecycle {
    #[default]
    Detached,
    Attached,
    Connected,
    Disconnected,
}

impl DeviceLifecycle {
    /// Whether attach has to allocate the device context.
    #[must_use]
    pub fn needs_allocation(self) -> bool {
        matches!(self, Self::Detached)
    }

    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Transition for a connect or disconnect request. A detached device
    /// stays detached.
    #[must_use]
    pub fn with_connection(self, connected: bool) -> Self {
        match (self, connected) {
            (Self::Detached, _) => Self::Detached,
            (_, true) => Self::Connected,
            (_, false) => Self::Disconnected,
        }
    }
}
