//! Property — a named, ordered set of items owned by one device.
//!
//! A property is created with a declared item capacity and a kind. Items are
//! appended during the owning device's attach; after that the item set is
//! fixed and only values and state change.

mod policy;
mod state;

pub use policy::{Permission, RangePolicy, SwitchRule};
pub use state::PropertyState;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, PermissionDeniedError, ValidationError};
use crate::item::{Item, ItemKind};
use crate::request::{ChangeRequest, RequestItem, RequestValue};

/// One observable/controllable aspect of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub device: String,
    pub name: String,
    pub group: String,
    pub label: String,
    pub state: PropertyState,
    pub permission: Permission,
    pub rule: Option<SwitchRule>,
    pub range_policy: RangePolicy,
    /// Presentation hint only; hidden properties are defined and updated like
    /// any other.
    pub hidden: bool,
    kind: ItemKind,
    capacity: usize,
    items: Vec<Item>,
}

impl Property {
    #[must_use]
    pub fn builder() -> PropertyBuilder {
        PropertyBuilder::default()
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Mutable access to one item. The item's kind cannot be changed through it.
    pub fn item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.name == name)
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn number_value(&self, item: &str) -> Option<f64> {
        self.item(item).and_then(Item::as_number).map(|n| n.value)
    }

    #[must_use]
    pub fn switch_value(&self, item: &str) -> Option<bool> {
        self.item(item).and_then(Item::as_switch)
    }

    #[must_use]
    pub fn text_value(&self, item: &str) -> Option<&str> {
        self.item(item).and_then(Item::as_text)
    }

    /// Append a leaf item until the declared capacity is reached.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CapacityExceeded`] once the property is
    /// full, [`ValidationError::KindMismatch`] when the item kind differs from
    /// the property kind, and [`ValidationError::DuplicateItem`] when the name
    /// is already taken.
    pub fn append_item(&mut self, item: Item) -> Result<&mut Self, BusError> {
        if self.items.len() >= self.capacity {
            return Err(ValidationError::CapacityExceeded {
                property: self.name.clone(),
                capacity: self.capacity,
            }
            .into());
        }
        if item.kind() != self.kind {
            return Err(ValidationError::KindMismatch {
                property: self.name.clone(),
                item: item.name,
            }
            .into());
        }
        if self.item(&item.name).is_some() {
            return Err(ValidationError::DuplicateItem {
                property: self.name.clone(),
                item: item.name,
            }
            .into());
        }
        if item.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.items.push(item);
        Ok(self)
    }

    /// Copy inbound values from `request` into this property.
    ///
    /// Items are matched by name; unknown names and values of another kind
    /// are skipped. Numbers follow the property's [`RangePolicy`]. Switch
    /// values honour the property's [`SwitchRule`]: for exclusive rules the
    /// last item turned on wins, and a one-of-many property never ends with
    /// every item off.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PermissionDenied`] when `validate_permission` is set
    /// and the property is read-only, or [`ValidationError::OutOfRange`] under
    /// the reject policy. In both cases no value is modified.
    pub fn copy_values(
        &mut self,
        request: &ChangeRequest,
        validate_permission: bool,
    ) -> Result<(), BusError> {
        if validate_permission && !self.permission.is_writable() {
            return Err(PermissionDeniedError {
                device: self.device.clone(),
                property: self.name.clone(),
            }
            .into());
        }
        if self.range_policy == RangePolicy::Reject {
            self.check_ranges(&request.items)?;
        }

        let switches_before: Vec<bool> = self.items.iter().filter_map(Item::as_switch).collect();
        for RequestItem { name, value } in &request.items {
            match value {
                RequestValue::Text(text) => {
                    if let Some(item) = self.item_mut(name) {
                        item.set_text(text.clone());
                    }
                }
                RequestValue::Number(number) => {
                    if let Some(item) = self.item_mut(name) {
                        item.set_number(*number);
                    }
                }
                RequestValue::Switch(on) => self.apply_switch(name, *on),
            }
        }
        if self.rule == Some(SwitchRule::OneOfMany)
            && !self.items.is_empty()
            && !self.items.iter().any(|item| item.as_switch() == Some(true))
        {
            for (item, before) in self.items.iter_mut().zip(switches_before) {
                item.set_switch(before);
            }
        }
        Ok(())
    }

    /// Build a request carrying every writable value of this property.
    ///
    /// Light items are status indicators and are not included.
    #[must_use]
    pub fn to_request(&self) -> ChangeRequest {
        let items = self
            .items
            .iter()
            .filter_map(|item| {
                let value = if let Some(text) = item.as_text() {
                    RequestValue::Text(text.to_string())
                } else if let Some(number) = item.as_number() {
                    RequestValue::Number(number.value)
                } else {
                    RequestValue::Switch(item.as_switch()?)
                };
                Some(RequestItem {
                    name: item.name.clone(),
                    value,
                })
            })
            .collect();
        ChangeRequest {
            device: self.device.clone(),
            property: self.name.clone(),
            items,
        }
    }

    fn check_ranges(&self, items: &[RequestItem]) -> Result<(), BusError> {
        for RequestItem { name, value } in items {
            let RequestValue::Number(value) = value else {
                continue;
            };
            if let Some(number) = self.item(name).and_then(Item::as_number) {
                if !value.is_nan() && !number.contains(*value) {
                    return Err(ValidationError::OutOfRange {
                        item: name.clone(),
                        value: *value,
                        min: number.min,
                        max: number.max,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn apply_switch(&mut self, name: &str, on: bool) {
        if self.item(name).and_then(Item::as_switch).is_none() {
            return;
        }
        let exclusive = self.rule.is_some_and(SwitchRule::is_exclusive);
        for item in &mut self.items {
            if item.name == name {
                item.set_switch(on);
            } else if exclusive && on {
                item.set_switch(false);
            }
        }
    }
}

/// Step-by-step builder for the header of a [`Property`].
#[derive(Debug, Default)]
pub struct PropertyBuilder {
    device: Option<String>,
    name: Option<String>,
    group: Option<String>,
    label: Option<String>,
    state: PropertyState,
    permission: Permission,
    rule: Option<SwitchRule>,
    range_policy: RangePolicy,
    hidden: bool,
    kind: Option<ItemKind>,
    capacity: usize,
}

impl PropertyBuilder {
    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: PropertyState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Mark the property as a switch property with the given rule.
    #[must_use]
    pub fn switch(mut self, rule: SwitchRule) -> Self {
        self.kind = Some(ItemKind::Switch);
        self.rule = Some(rule);
        self
    }

    #[must_use]
    pub fn range_policy(mut self, policy: RangePolicy) -> Self {
        self.range_policy = policy;
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Number of items the property will hold.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Consume the builder and return an empty property shell.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when the device or property name
    /// is missing, and [`ValidationError::MissingRule`] for a switch property
    /// without a rule.
    pub fn build(self) -> Result<Property, BusError> {
        let device = self.device.unwrap_or_default();
        let name = self.name.unwrap_or_default();
        if device.is_empty() || name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let kind = self.kind.unwrap_or(ItemKind::Text);
        if kind == ItemKind::Switch && self.rule.is_none() {
            return Err(ValidationError::MissingRule(name).into());
        }
        let label = self.label.unwrap_or_else(|| name.clone());
        Ok(Property {
            device,
            group: self.group.unwrap_or_default(),
            label,
            name,
            state: self.state,
            permission: self.permission,
            rule: self.rule,
            range_policy: self.range_policy,
            hidden: self.hidden,
            kind,
            capacity: self.capacity,
            items: Vec::with_capacity(self.capacity),
        })
    }
}
