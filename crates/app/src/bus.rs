//! The bus — registry and dispatcher connecting devices and clients.
//!
//! Devices are routed by name, change requests are serialized per property,
//! and notifications are fanned out only to clients that received the
//! property's definition.

mod cell;
mod context;

pub use cell::PropertyCell;
pub use context::DeviceContext;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use propbus_domain::error::{BusError, NotFoundError, PermissionDeniedError, ValidationError};
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::notification::{Notification, NotificationKind, Recipient};
use propbus_domain::request::ChangeRequest;
use tokio::sync::mpsc;

use crate::drivers::DriverTable;
use crate::monitor::NotificationMonitor;
use crate::ports::{ChangeOutcome, ClientSink, Device, PropertyStore};

/// Interface version handed to devices on attach.
pub const BUS_VERSION: u32 = 0x0200;

const MONITOR_CAPACITY: usize = 256;

/// Shared handle to the property bus. Cheap to clone.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

struct Inner {
    devices: RwLock<Vec<Arc<dyn Device>>>,
    clients: RwLock<HashMap<ClientId, Arc<dyn ClientSink>>>,
    store: Arc<dyn PropertyStore>,
    drivers: Arc<DriverTable>,
    monitor: NotificationMonitor,
}

impl Bus {
    /// Create a bus persisting into `store` and owning the driver table.
    #[must_use]
    pub fn new(store: Arc<dyn PropertyStore>, drivers: DriverTable) -> Self {
        Self {
            inner: Arc::new(Inner {
                devices: RwLock::new(Vec::new()),
                clients: RwLock::new(HashMap::new()),
                store,
                drivers: Arc::new(drivers),
                monitor: NotificationMonitor::new(MONITOR_CAPACITY),
            }),
        }
    }

    /// The process-wide table of installable driver modules.
    #[must_use]
    pub fn drivers(&self) -> Arc<DriverTable> {
        Arc::clone(&self.inner.drivers)
    }

    /// Observer feed receiving a copy of every notification produced.
    #[must_use]
    pub fn monitor(&self) -> &NotificationMonitor {
        &self.inner.monitor
    }

    pub(crate) fn store(&self) -> &dyn PropertyStore {
        self.inner.store.as_ref()
    }

    // ── Clients ────────────────────────────────────────────────────

    /// Register a client. It receives nothing until it enumerates.
    pub fn connect(&self, sink: Arc<dyn ClientSink>) -> ClientId {
        let id = ClientId::new();
        self.inner
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sink);
        tracing::info!(client = %id, "client connected");
        id
    }

    /// Register a client backed by an unbounded channel.
    pub fn connect_channel(&self) -> (ClientId, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.connect(Arc::new(tx)), rx)
    }

    /// Remove a client and drop it from every property's interest set.
    ///
    /// Returns `false` when the client was not connected.
    pub fn disconnect(&self, client: ClientId) -> bool {
        let removed = self
            .inner
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&client)
            .is_some();
        if removed {
            for device in self.devices() {
                for cell in device.properties() {
                    cell.forget_client(client);
                }
            }
            tracing::info!(client = %client, "client disconnected");
        }
        removed
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.inner
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_connected(&self, client: ClientId) -> bool {
        self.inner
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&client)
    }

    // ── Devices ────────────────────────────────────────────────────

    /// Names of attached devices in attach order.
    #[must_use]
    pub fn device_names(&self) -> Vec<String> {
        self.devices().iter().map(|d| d.name().to_string()).collect()
    }

    #[must_use]
    pub fn device(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices().into_iter().find(|d| d.name() == name)
    }

    #[must_use]
    pub fn has_device(&self, name: &str) -> bool {
        self.device(name).is_some()
    }

    fn devices(&self) -> Vec<Arc<dyn Device>> {
        self.inner
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach a device, register it, and define its properties to every
    /// connected client.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateDevice`] when the name is taken, or
    /// the error of the device's attach. A failed attach is cleaned up with
    /// the device's detach before returning.
    #[tracing::instrument(skip_all, fields(device = %device.name()))]
    pub async fn attach_device(&self, device: Arc<dyn Device>) -> Result<(), BusError> {
        let name = device.name().to_string();
        if self.has_device(&name) {
            return Err(ValidationError::DuplicateDevice(name).into());
        }

        let ctx = self.context(&name);
        if let Err(err) = device.attach(&ctx, BUS_VERSION).await {
            tracing::error!(error = %err, "device attach failed");
            if let Err(cleanup) = device.detach(&ctx).await {
                tracing::warn!(error = %cleanup, "cleanup after failed attach failed");
            }
            return Err(err);
        }

        let duplicate = {
            let mut devices = self
                .inner
                .devices
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if devices.iter().any(|d| d.name() == name) {
                true
            } else {
                devices.push(Arc::clone(&device));
                false
            }
        };
        if duplicate {
            device.detach(&ctx).await?;
            return Err(ValidationError::DuplicateDevice(name).into());
        }

        tracing::info!("device attached");
        device
            .enumerate(&ctx, Recipient::All, &PropertyFilter::any())
            .await
    }

    /// Detach a device and make sure every client that knew one of its
    /// properties receives exactly one delete for it.
    ///
    /// Returns `false` when no device with that name is attached.
    ///
    /// # Errors
    ///
    /// Returns the error of the device's detach. The device is unregistered
    /// regardless.
    #[tracing::instrument(skip(self))]
    pub async fn detach_device(&self, name: &str) -> Result<bool, BusError> {
        let device = {
            let mut devices = self
                .inner
                .devices
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match devices.iter().position(|d| d.name() == name) {
                Some(index) => devices.remove(index),
                None => return Ok(false),
            }
        };

        let cells = device.properties();
        let ctx = self.context(name);
        let result = device.detach(&ctx).await;
        for cell in &cells {
            self.fan_out(cell, NotificationKind::Delete, Recipient::All, None);
        }
        tracing::info!("device detached");
        result.map(|()| true)
    }

    /// Detach every device in reverse attach order.
    ///
    /// # Errors
    ///
    /// Returns the first detach error after attempting all devices.
    pub async fn detach_all(&self) -> Result<(), BusError> {
        let mut first_error = None;
        for name in self.device_names().into_iter().rev() {
            if let Err(err) = self.detach_device(&name).await {
                tracing::warn!(device = %name, error = %err, "detach failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Ask every matching device to define its properties to `client`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotFound`] for an unknown client. Device failures
    /// are logged and do not stop enumeration of other devices.
    #[tracing::instrument(skip(self))]
    pub async fn enumerate(&self, client: ClientId, filter: &PropertyFilter) -> Result<(), BusError> {
        if !self.is_connected(client) {
            return Err(unknown_client(client));
        }
        for device in self.devices() {
            if !filter.matches_device(device.name()) {
                continue;
            }
            let ctx = self.context(device.name());
            if let Err(err) = device.enumerate(&ctx, Recipient::One(client), filter).await {
                tracing::warn!(device = %device.name(), error = %err, "enumerate failed");
            }
        }
        Ok(())
    }

    /// Route a change request to the owning device.
    ///
    /// The target property's change gate is held for the whole call, so at
    /// most one change per property is in flight. Unknown devices and
    /// properties are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PermissionDenied`] for a read-only target,
    /// [`BusError::NotFound`] for an unknown client, or the device handler's
    /// error.
    #[tracing::instrument(skip(self, request), fields(device = %request.device, property = %request.property))]
    pub async fn change(
        &self,
        client: ClientId,
        request: &ChangeRequest,
    ) -> Result<ChangeOutcome, BusError> {
        if !self.is_connected(client) {
            return Err(unknown_client(client));
        }
        let Some(device) = self.device(&request.device) else {
            tracing::debug!("no such device");
            return Ok(ChangeOutcome::NoMatch);
        };
        let Some(cell) = device
            .properties()
            .into_iter()
            .find(|cell| cell.name() == request.property)
        else {
            tracing::debug!("no such property");
            return Ok(ChangeOutcome::NoMatch);
        };
        if !cell.read(|p| p.permission.is_writable()) {
            tracing::warn!("write to read-only property refused");
            return Err(PermissionDeniedError {
                device: request.device.clone(),
                property: request.property.clone(),
            }
            .into());
        }

        let _gate = cell.lock_change().await;
        let ctx = self.context(device.name());
        let outcome = device.change(&ctx, Some(client), request).await?;
        tracing::debug!(?outcome, "change processed");
        Ok(outcome)
    }

    pub(crate) fn context(&self, device: &str) -> DeviceContext {
        DeviceContext::new(self.clone(), device)
    }

    // ── Fan-out ────────────────────────────────────────────────────

    /// Deliver one notification about `cell` as a single step.
    ///
    /// - `Define` marks the recipients as interested and delivers to them.
    /// - `Update` delivers to interested clients only.
    /// - `Delete` delivers to interested clients, then forgets them.
    ///
    /// Updates and deletes of an undefined property are dropped.
    pub(crate) fn fan_out(
        &self,
        cell: &PropertyCell,
        kind: NotificationKind,
        recipient: Recipient,
        message: Option<&str>,
    ) {
        let mut slot = cell.slot();
        let clients = self
            .inner
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let targets: Vec<ClientId> = match kind {
            NotificationKind::Define => {
                let targets: Vec<ClientId> = match recipient {
                    Recipient::All => clients.keys().copied().collect(),
                    Recipient::One(id) => clients.contains_key(&id).then_some(id).into_iter().collect(),
                };
                slot.defined = true;
                slot.interested.extend(targets.iter().copied());
                targets
            }
            NotificationKind::Update | NotificationKind::Delete => {
                if !slot.defined {
                    return;
                }
                slot.interested.iter().copied().collect()
            }
        };

        let notification =
            Notification::new(kind, slot.property.clone(), message.map(str::to_owned));
        for id in &targets {
            let Some(sink) = clients.get(id) else {
                continue;
            };
            if sink.deliver(notification.clone()).is_err() {
                tracing::debug!(client = %id, "client sink closed");
            }
        }
        if kind == NotificationKind::Delete {
            slot.defined = false;
            slot.interested.clear();
        }
        tracing::trace!(
            %kind,
            device = %cell.device(),
            property = %cell.name(),
            recipients = targets.len(),
            "notification fanned out"
        );
        self.inner.monitor.publish(notification);
    }
}

fn unknown_client(client: ClientId) -> BusError {
    NotFoundError {
        kind: "client",
        name: client.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests;
