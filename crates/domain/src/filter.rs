//! Property filter — selects properties by device and property name.

use serde::{Deserialize, Serialize};

use crate::property::Property;

/// Name-based property selector.
///
/// An absent part matches everything, so [`PropertyFilter::any`] selects
/// every property of every device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub device: Option<String>,
    pub property: Option<String>,
}

impl PropertyFilter {
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Every property of one device.
    #[must_use]
    pub fn device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            property: None,
        }
    }

    /// One property of one device.
    #[must_use]
    pub fn property(device: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            property: Some(property.into()),
        }
    }

    #[must_use]
    pub fn matches_device(&self, device: &str) -> bool {
        self.device.as_deref().is_none_or(|d| d.is_empty() || d == device)
    }

    #[must_use]
    pub fn matches(&self, property: &Property) -> bool {
        self.matches_device(&property.device)
            && self
                .property
                .as_deref()
                .is_none_or(|p| p.is_empty() || p == property.name)
    }
}
