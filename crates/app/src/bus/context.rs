//! Device context — the bus surface a device uses from its lifecycle
//! operations.

use propbus_domain::error::BusError;
use propbus_domain::notification::{NotificationKind, Recipient};
use propbus_domain::property::{Property, PropertyState};
use propbus_domain::record::PropertyRecord;

use super::{Bus, PropertyCell};

/// Handle passed to [`Device`](crate::ports::Device) operations.
///
/// Every notification helper checks that the cell belongs to the calling
/// device; addressing another device's property is a programming error and
/// fails with [`BusError::Precondition`].
#[derive(Clone)]
pub struct DeviceContext {
    bus: Bus,
    device: String,
}

impl DeviceContext {
    pub(crate) fn new(bus: Bus, device: &str) -> Self {
        Self {
            bus,
            device: device.to_string(),
        }
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Define `cell` to `recipient` and record the interest.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell.
    pub fn define(
        &self,
        cell: &PropertyCell,
        recipient: Recipient,
        message: Option<&str>,
    ) -> Result<(), BusError> {
        self.owns(cell)?;
        self.bus
            .fan_out(cell, NotificationKind::Define, recipient, message);
        Ok(())
    }

    /// Broadcast the current value of `cell` to interested clients.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell.
    pub fn update(&self, cell: &PropertyCell, message: Option<&str>) -> Result<(), BusError> {
        self.owns(cell)?;
        self.bus
            .fan_out(cell, NotificationKind::Update, Recipient::All, message);
        Ok(())
    }

    /// Tell interested clients that `cell` is gone.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell.
    pub fn delete(&self, cell: &PropertyCell, message: Option<&str>) -> Result<(), BusError> {
        self.owns(cell)?;
        self.bus
            .fan_out(cell, NotificationKind::Delete, Recipient::All, message);
        Ok(())
    }

    /// Mutate `cell` and broadcast the result.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell.
    pub fn modify<R>(
        &self,
        cell: &PropertyCell,
        message: Option<&str>,
        f: impl FnOnce(&mut Property) -> R,
    ) -> Result<R, BusError> {
        self.owns(cell)?;
        let result = cell.write(f);
        self.bus
            .fan_out(cell, NotificationKind::Update, Recipient::All, message);
        Ok(result)
    }

    /// Set the state of `cell` and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell.
    pub fn set_state(
        &self,
        cell: &PropertyCell,
        state: PropertyState,
        message: Option<&str>,
    ) -> Result<(), BusError> {
        self.modify(cell, message, |p| p.state = state)
    }

    /// Persist the current item values of `cell`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell or the store's
    /// error.
    pub async fn save(&self, cell: &PropertyCell) -> Result<(), BusError> {
        self.owns(cell)?;
        let record = cell.read(PropertyRecord::capture);
        self.bus.store().save(record).await?;
        tracing::debug!(device = %self.device, property = %cell.name(), "property saved");
        Ok(())
    }

    /// Restore previously saved values into `cell` and broadcast them if the
    /// property is defined.
    ///
    /// Returns `false` when nothing was saved for this property.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Precondition`] for a foreign cell or the store's
    /// error.
    pub async fn load(&self, cell: &PropertyCell) -> Result<bool, BusError> {
        self.owns(cell)?;
        let Some(record) = self.bus.store().load(&self.device, cell.name()).await? else {
            return Ok(false);
        };
        let request = record.into_request();
        self.modify(cell, None, |p| p.copy_values(&request, false))??;
        tracing::debug!(device = %self.device, property = %cell.name(), "property loaded");
        Ok(true)
    }

    /// Load the saved record of a property without applying it.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn saved(&self, property: &str) -> Result<Option<PropertyRecord>, BusError> {
        self.bus.store().load(&self.device, property).await
    }

    fn owns(&self, cell: &PropertyCell) -> Result<(), BusError> {
        if cell.device() == self.device {
            Ok(())
        } else {
            Err(BusError::Precondition("property belongs to another device"))
        }
    }
}
