//! Driver module port — an installable unit of hardware support.

use async_trait::async_trait;
use propbus_domain::error::BusError;

use crate::bus::Bus;

/// A driver module that can be switched on and off at runtime.
///
/// Enabling a module typically attaches its devices to the bus; disabling
/// detaches them. Both directions must be idempotent.
#[async_trait]
pub trait DriverModule: Send + Sync {
    /// Display name, also used as the item name in the registry property.
    fn name(&self) -> &str;

    /// Enable or disable the module.
    async fn enable(&self, bus: &Bus, enabled: bool) -> Result<(), BusError>;
}
