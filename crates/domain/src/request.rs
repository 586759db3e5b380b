//! Change request — the inbound values a client asks a device to apply.

use serde::{Deserialize, Serialize};

use crate::property::Property;

/// A client-supplied value for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestValue {
    Switch(bool),
    Number(f64),
    Text(String),
}

/// One named value inside a [`ChangeRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub name: String,
    pub value: RequestValue,
}

/// A request to change the item values of one property.
///
/// Targets are addressed by device and property name only. Items are
/// matched to the authoritative property by name; unknown names and values
/// of the wrong kind are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub device: String,
    pub property: String,
    #[serde(default)]
    pub items: Vec<RequestItem>,
}

impl ChangeRequest {
    #[must_use]
    pub fn new(device: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            property: property.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn item(mut self, name: impl Into<String>, value: RequestValue) -> Self {
        self.items.push(RequestItem {
            name: name.into(),
            value,
        });
        self
    }

    #[must_use]
    pub fn number(self, name: impl Into<String>, value: f64) -> Self {
        self.item(name, RequestValue::Number(value))
    }

    #[must_use]
    pub fn switch(self, name: impl Into<String>, value: bool) -> Self {
        self.item(name, RequestValue::Switch(value))
    }

    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.item(name, RequestValue::Text(value.into()))
    }

    /// Whether this request addresses `property` (device and name only).
    #[must_use]
    pub fn targets(&self, property: &Property) -> bool {
        self.device == property.device && self.property == property.name
    }

    /// The requested switch value for `item`, if any.
    #[must_use]
    pub fn switch_value(&self, item: &str) -> Option<bool> {
        self.items.iter().rev().find_map(|it| match it.value {
            RequestValue::Switch(on) if it.name == item => Some(on),
            _ => None,
        })
    }
}
