//! Item — a single leaf value inside a [`Property`](crate::property::Property).

use serde::{Deserialize, Serialize};

use crate::error::{BusError, ValidationError};
use crate::property::PropertyState;

/// The kind of value an item (and its owning property) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Number,
    Switch,
    Light,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Number => f.write_str("number"),
            Self::Switch => f.write_str("switch"),
            Self::Light => f.write_str("light"),
        }
    }
}

/// A bounded numeric value.
///
/// `min <= value <= max` holds after construction and after every
/// [`Item::set_number`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
}

impl Number {
    /// Whether `value` lies inside `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The typed value held by an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemValue {
    Text { value: String },
    Number(Number),
    Switch { value: bool },
    Light { value: PropertyState },
}

impl ItemValue {
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Text { .. } => ItemKind::Text,
            Self::Number(_) => ItemKind::Number,
            Self::Switch { .. } => ItemKind::Switch,
            Self::Light { .. } => ItemKind::Light,
        }
    }
}

/// A named leaf value with display metadata.
///
/// The kind of an item is fixed at construction; setters for another kind
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub label: String,
    value: ItemValue,
}

impl Item {
    #[must_use]
    pub fn text(name: impl Into<String>, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value: ItemValue::Text {
                value: value.into(),
            },
        }
    }

    /// Create a numeric item; the initial value is clamped into `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBounds`] when `min > max` or either
    /// bound is not a number.
    pub fn number(
        name: impl Into<String>,
        label: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        value: f64,
    ) -> Result<Self, BusError> {
        let name = name.into();
        if min.is_nan() || max.is_nan() || min > max {
            return Err(ValidationError::InvalidBounds { item: name, min, max }.into());
        }
        Ok(Self {
            name,
            label: label.into(),
            value: ItemValue::Number(Number {
                min,
                max,
                step,
                value: value.clamp(min, max),
            }),
        })
    }

    #[must_use]
    pub fn switch(name: impl Into<String>, label: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value: ItemValue::Switch { value },
        }
    }

    #[must_use]
    pub fn light(name: impl Into<String>, label: impl Into<String>, value: PropertyState) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value: ItemValue::Light { value },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.value.kind()
    }

    #[must_use]
    pub fn value(&self) -> &ItemValue {
        &self.value
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ItemValue::Text { value } => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<&Number> {
        match &self.value {
            ItemValue::Number(number) => Some(number),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_switch(&self) -> Option<bool> {
        match self.value {
            ItemValue::Switch { value } => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_light(&self) -> Option<PropertyState> {
        match self.value {
            ItemValue::Light { value } => Some(value),
            _ => None,
        }
    }

    /// Replace a text value. Returns `false` when this is not a text item.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match &mut self.value {
            ItemValue::Text { value } => {
                *value = text.into();
                true
            }
            _ => false,
        }
    }

    /// Store a numeric value clamped into `[min, max]`.
    ///
    /// Returns `false` (and leaves the item untouched) when this is not a
    /// number item or `value` is NaN.
    pub fn set_number(&mut self, value: f64) -> bool {
        match &mut self.value {
            ItemValue::Number(number) if !value.is_nan() => {
                number.value = value.clamp(number.min, number.max);
                true
            }
            _ => false,
        }
    }

    /// Replace a switch value. Returns `false` when this is not a switch item.
    pub fn set_switch(&mut self, on: bool) -> bool {
        match &mut self.value {
            ItemValue::Switch { value } => {
                *value = on;
                true
            }
            _ => false,
        }
    }

    /// Replace a light value. Returns `false` when this is not a light item.
    pub fn set_light(&mut self, state: PropertyState) -> bool {
        match &mut self.value {
            ItemValue::Light { value } => {
                *value = state;
                true
            }
            _ => false,
        }
    }
}
