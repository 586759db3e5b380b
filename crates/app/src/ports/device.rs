//! Device port — the four lifecycle operations a driver exposes to the bus.

use std::sync::Arc;

use async_trait::async_trait;
use propbus_domain::error::BusError;
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::Recipient;
use propbus_domain::request::ChangeRequest;

use crate::bus::{DeviceContext, PropertyCell};

/// Result of routing a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A handler accepted the request.
    Handled,
    /// Nothing declared by the device matches the request.
    NoMatch,
}

/// A named entity owning a set of properties.
///
/// The bus calls the lifecycle methods in order:
///
/// 1. [`attach`](Self::attach) — allocate the context and construct properties
/// 2. [`enumerate`](Self::enumerate) / [`change`](Self::change) — any number
///    of times, possibly concurrently for different properties
/// 3. [`detach`](Self::detach) — release every property
///
/// A change is only forwarded after the bus has taken the target property's
/// change gate, so handlers never race on the same property.
#[async_trait]
pub trait Device: Send + Sync {
    /// Unique device name.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn lifecycle(&self) -> DeviceLifecycle;

    /// Every property currently allocated by this device.
    fn properties(&self) -> Vec<Arc<PropertyCell>>;

    /// Allocate the device context and construct its properties.
    ///
    /// Attaching an already attached device is a successful no-op. On error,
    /// partially constructed properties stay in place until
    /// [`detach`](Self::detach) is called.
    async fn attach(&self, ctx: &DeviceContext, version: u32) -> Result<(), BusError>;

    /// Define every visible property matching `filter` to `recipient`.
    async fn enumerate(
        &self,
        ctx: &DeviceContext,
        recipient: Recipient,
        filter: &PropertyFilter,
    ) -> Result<(), BusError>;

    /// Validate and apply a change request.
    async fn change(
        &self,
        ctx: &DeviceContext,
        client: Option<ClientId>,
        request: &ChangeRequest,
    ) -> Result<ChangeOutcome, BusError>;

    /// Release every property.
    async fn detach(&self, ctx: &DeviceContext) -> Result<(), BusError>;
}
