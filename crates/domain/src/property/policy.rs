//! Access and selection policies attached to a property.

use serde::{Deserialize, Serialize};

/// Who may write a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadOnly,
    #[default]
    ReadWrite,
    WriteOnly,
}

impl Permission {
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Selection constraint among the items of a switch property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRule {
    /// Exactly one item is on.
    OneOfMany,
    /// Zero or one item is on.
    AtMostOne,
    /// Any subset of items is on.
    AnyOfMany,
}

impl SwitchRule {
    /// Whether turning one item on turns every other item off.
    #[must_use]
    pub fn is_exclusive(self) -> bool {
        !matches!(self, Self::AnyOfMany)
    }
}

/// What happens to an inbound number outside its item's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Store the nearest bound.
    #[default]
    Clamp,
    /// Refuse the whole request, leaving every item untouched.
    Reject,
}
