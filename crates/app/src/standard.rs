//! Standard properties every hardware device carries: `CONNECTION` and
//! `CONFIG`.

use std::sync::Arc;

use propbus_domain::error::BusError;
use propbus_domain::item::Item;
use propbus_domain::property::{Permission, Property, PropertyState, SwitchRule};
use propbus_domain::request::ChangeRequest;

use crate::bus::{DeviceContext, PropertyCell};

pub const CONNECTION: &str = "CONNECTION";
pub const CONNECTED: &str = "CONNECTED";
pub const DISCONNECTED: &str = "DISCONNECTED";

pub const CONFIG: &str = "CONFIG";
pub const CONFIG_LOAD: &str = "LOAD";
pub const CONFIG_SAVE: &str = "SAVE";

pub const MAIN_GROUP: &str = "Main";

/// `CONNECTION` and `CONFIG` cells of one device. Both are always defined
/// while the device is attached, connected or not.
#[derive(Debug, Clone)]
pub struct StandardProperties {
    pub connection: Arc<PropertyCell>,
    pub config: Arc<PropertyCell>,
}

impl StandardProperties {
    /// Build both properties for `device`, disconnected.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `device` is empty.
    pub fn new(device: &str) -> Result<Self, BusError> {
        let mut connection = Property::builder()
            .device(device)
            .name(CONNECTION)
            .group(MAIN_GROUP)
            .label("Connection status")
            .permission(Permission::ReadWrite)
            .state(PropertyState::Ok)
            .switch(SwitchRule::OneOfMany)
            .capacity(2)
            .build()?;
        connection
            .append_item(Item::switch(CONNECTED, "Connected", false))?
            .append_item(Item::switch(DISCONNECTED, "Disconnected", true))?;

        let mut config = Property::builder()
            .device(device)
            .name(CONFIG)
            .group(MAIN_GROUP)
            .label("Configuration control")
            .permission(Permission::ReadWrite)
            .state(PropertyState::Ok)
            .switch(SwitchRule::AtMostOne)
            .capacity(2)
            .build()?;
        config
            .append_item(Item::switch(CONFIG_LOAD, "Load", false))?
            .append_item(Item::switch(CONFIG_SAVE, "Save", false))?;

        Ok(Self {
            connection: PropertyCell::new(connection),
            config: PropertyCell::new(config),
        })
    }

    #[must_use]
    pub fn cells(&self) -> [Arc<PropertyCell>; 2] {
        [Arc::clone(&self.connection), Arc::clone(&self.config)]
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection
            .read(|p| p.switch_value(CONNECTED))
            .unwrap_or(false)
    }

    /// Copy a connection request into `CONNECTION` without broadcasting and
    /// return whether the device should now be connected.
    ///
    /// # Errors
    ///
    /// Propagates [`Property::copy_values`] errors.
    pub fn set_connection(&self, request: &ChangeRequest) -> Result<bool, BusError> {
        self.connection.write(|p| p.copy_values(request, false))?;
        Ok(self.is_connected())
    }

    /// Settle `CONNECTION` in `OK` and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] when the cell belongs to another
    /// device.
    pub fn finish_connection(&self, ctx: &DeviceContext) -> Result<(), BusError> {
        ctx.set_state(&self.connection, PropertyState::Ok, None)
    }

    /// Handle a `CONFIG` request against the device's saveable properties.
    ///
    /// `SAVE` persists each saveable property and `LOAD` restores and
    /// broadcasts it. Each saveable property's change gate is held while it
    /// is read or written. Afterwards the switch resets; the property settles
    /// in `OK`, or `ALERT` when the store failed.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for cells of another device. Store
    /// failures are reported through the property state instead.
    pub async fn apply_config(
        &self,
        ctx: &DeviceContext,
        request: &ChangeRequest,
        saveable: &[Arc<PropertyCell>],
    ) -> Result<(), BusError> {
        self.config.write(|p| p.copy_values(request, false))?;
        let (load, save) = self.config.read(|p| {
            (
                p.switch_value(CONFIG_LOAD).unwrap_or(false),
                p.switch_value(CONFIG_SAVE).unwrap_or(false),
            )
        });

        let mut failure = None;
        for cell in saveable {
            let _gate = cell.lock_change().await;
            let result = if save {
                ctx.save(cell).await
            } else if load {
                ctx.load(cell).await.map(|_| ())
            } else {
                Ok(())
            };
            if let Err(err) = result {
                tracing::warn!(
                    device = %ctx.device_name(),
                    property = %cell.name(),
                    error = %err,
                    "config operation failed"
                );
                failure.get_or_insert_with(|| format!("{} failed: {err}", cell.name()));
            }
        }

        let state = if failure.is_some() {
            PropertyState::Alert
        } else {
            PropertyState::Ok
        };
        ctx.modify(&self.config, failure.as_deref(), |p| {
            for item in p.items_mut() {
                item.set_switch(false);
            }
            p.state = state;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_disconnected() {
        let standard = StandardProperties::new("d").unwrap();
        assert!(!standard.is_connected());
        assert_eq!(
            standard.connection.read(|p| p.switch_value(DISCONNECTED)),
            Some(true)
        );
    }

    #[test]
    fn should_connect_and_turn_disconnected_off() {
        let standard = StandardProperties::new("d").unwrap();
        let request = ChangeRequest::new("d", CONNECTION).switch(CONNECTED, true);
        assert!(standard.set_connection(&request).unwrap());
        assert_eq!(
            standard.connection.read(|p| p.switch_value(DISCONNECTED)),
            Some(false)
        );
    }

    #[test]
    fn should_keep_one_connection_item_on() {
        let standard = StandardProperties::new("d").unwrap();
        let request = ChangeRequest::new("d", CONNECTION).switch(DISCONNECTED, false);
        assert!(!standard.set_connection(&request).unwrap());
        assert_eq!(
            standard.connection.read(|p| p.switch_value(DISCONNECTED)),
            Some(true)
        );
    }

    #[test]
    fn should_expose_config_as_at_most_one() {
        let standard = StandardProperties::new("d").unwrap();
        let rule = standard.config.read(|p| p.rule);
        assert_eq!(rule, Some(SwitchRule::AtMostOne));
        assert_eq!(standard.cells().len(), 2);
    }
}
