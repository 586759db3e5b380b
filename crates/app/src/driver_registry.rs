//! Driver Registry — a pseudo-device exposing every installable driver
//! module as a toggle.
//!
//! The single `DRIVERS` switch property (any-of-many) has one item per
//! module of the bus's [`DriverTable`]. Switching an item calls the module's
//! enable entry point; the resulting enablement set is persisted so the next
//! start restores it.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use propbus_domain::error::BusError;
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::item::Item;
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::Recipient;
use propbus_domain::property::{Permission, Property, PropertyState, SwitchRule};
use propbus_domain::request::{ChangeRequest, RequestItem, RequestValue};

use crate::bus::{DeviceContext, PropertyCell};
use crate::drivers::DriverTable;
use crate::ports::{ChangeOutcome, Device};
use crate::standard::MAIN_GROUP;

pub const DRIVERS: &str = "DRIVERS";

pub struct DriverRegistry {
    name: String,
    drivers: Arc<DriverTable>,
    lifecycle: Mutex<DeviceLifecycle>,
    property: Mutex<Option<Arc<PropertyCell>>>,
}

impl DriverRegistry {
    /// Create a registry device called `name` over the bus's driver table.
    #[must_use]
    pub fn new(name: impl Into<String>, drivers: Arc<DriverTable>) -> Self {
        Self {
            name: name.into(),
            drivers,
            lifecycle: Mutex::new(DeviceLifecycle::Detached),
            property: Mutex::new(None),
        }
    }

    fn cell(&self) -> Option<Arc<PropertyCell>> {
        self.property
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn build_property(&self) -> Result<Property, BusError> {
        let entries = self.drivers.entries();
        let mut property = Property::builder()
            .device(&self.name)
            .name(DRIVERS)
            .group(MAIN_GROUP)
            .label("Active drivers")
            .permission(Permission::ReadWrite)
            .switch(SwitchRule::AnyOfMany)
            .capacity(entries.len())
            .build()?;
        for entry in entries {
            property.append_item(Item::switch(
                entry.name(),
                entry.name(),
                entry.default_enabled(),
            ))?;
        }
        Ok(property)
    }

    /// Run a request through the module enable path, then settle, broadcast
    /// and persist the actual enablement set.
    ///
    /// A module whose enable call fails keeps its previous state and the
    /// property goes `ALERT`. Afterwards every item is set from the table.
    /// Persistence failures are reported as `ALERT` too.
    async fn apply(
        &self,
        ctx: &DeviceContext,
        cell: &PropertyCell,
        request: &ChangeRequest,
    ) -> Result<(), BusError> {
        cell.write(|p| p.copy_values(request, false))?;

        let mut failed = Vec::new();
        for RequestItem { name, value } in &request.items {
            let RequestValue::Switch(enabled) = *value else {
                continue;
            };
            if self.drivers.get(name).is_none() {
                tracing::debug!(driver = %name, "unknown driver item ignored");
                continue;
            }
            if let Err(err) = self.drivers.set_enabled(ctx.bus(), name, enabled).await {
                tracing::warn!(driver = %name, enabled, error = %err, "driver toggle failed");
                failed.push(name.as_str());
            }
        }

        // Items always mirror the table, whatever the request said.
        cell.write(|p| {
            for entry in self.drivers.entries() {
                if let Some(item) = p.item_mut(entry.name()) {
                    item.set_switch(entry.is_enabled());
                }
            }
        });

        let message = (!failed.is_empty()).then(|| format!("failed to toggle {}", failed.join(", ")));
        let state = if message.is_some() {
            PropertyState::Alert
        } else {
            PropertyState::Ok
        };
        ctx.set_state(cell, state, message.as_deref())?;

        if let Err(err) = ctx.save(cell).await {
            tracing::warn!(error = %err, "failed to persist driver enablement");
            ctx.set_state(cell, PropertyState::Alert, Some("failed to persist drivers"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Device for DriverRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> DeviceLifecycle {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn properties(&self) -> Vec<Arc<PropertyCell>> {
        self.cell().into_iter().collect()
    }

    #[tracing::instrument(skip_all, fields(device = %self.name))]
    async fn attach(&self, ctx: &DeviceContext, version: u32) -> Result<(), BusError> {
        if !self.lifecycle().needs_allocation() {
            return Ok(());
        }
        let cell = PropertyCell::new(self.build_property()?);
        *self.property.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&cell));
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) = DeviceLifecycle::Connected;
        tracing::debug!(version, drivers = self.drivers.entries().len(), "registry attached");

        // Saved values are layered over the defaults so modules missing from
        // an older record still go through the enable path.
        match ctx.saved(DRIVERS).await {
            Ok(Some(record)) => {
                tracing::info!("restoring saved driver enablement");
                cell.write(|p| p.copy_values(&record.into_request(), false))?;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "failed to load driver enablement, using defaults");
            }
        }
        let request = cell.read(Property::to_request);

        let _gate = cell.lock_change().await;
        self.apply(ctx, &cell, &request).await
    }

    async fn enumerate(
        &self,
        ctx: &DeviceContext,
        recipient: Recipient,
        filter: &PropertyFilter,
    ) -> Result<(), BusError> {
        let Some(cell) = self.cell() else {
            return Ok(());
        };
        if cell.read(|p| filter.matches(p)) {
            ctx.define(&cell, recipient, None)?;
        }
        Ok(())
    }

    async fn change(
        &self,
        ctx: &DeviceContext,
        _client: Option<ClientId>,
        request: &ChangeRequest,
    ) -> Result<ChangeOutcome, BusError> {
        let Some(cell) = self.cell() else {
            return Err(BusError::Precondition("registry is not attached"));
        };
        if !cell.read(|p| request.targets(p)) {
            return Ok(ChangeOutcome::NoMatch);
        }
        self.apply(ctx, &cell, request).await?;
        Ok(ChangeOutcome::Handled)
    }

    async fn detach(&self, ctx: &DeviceContext) -> Result<(), BusError> {
        let cell = self
            .property
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cell) = cell {
            ctx.delete(&cell, None)?;
        }
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) = DeviceLifecycle::Detached;
        Ok(())
    }
}
