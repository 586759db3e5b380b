//! Property state — progress/outcome of the most recent operation on a property.

use serde::{Deserialize, Serialize};

/// Status of the most recent operation on a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyState {
    #[default]
    Idle,
    Ok,
    Busy,
    Alert,
}

impl PropertyState {
    /// Whether an operation is still in progress.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl std::fmt::Display for PropertyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Ok => f.write_str("ok"),
            Self::Busy => f.write_str("busy"),
            Self::Alert => f.write_str("alert"),
        }
    }
}
