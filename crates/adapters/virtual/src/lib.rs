//! # propbus-adapter-virtual
//!
//! Simulator driver modules that exercise the property bus without any
//! hardware attached.
//!
//! ## Provided modules
//!
//! | Module | Device | Behaviour |
//! |--------|--------|-----------|
//! | `gps_simulator` | GPS Simulator | Site coordinates with longitude wrapped into `[0, 360)`, restored from saved config on attach |
//! | `focuser_simulator` | Focuser Simulator | Absolute moves that stay `BUSY` for the travel time, rejecting out-of-range targets |
//!
//! ## Dependency rule
//!
//! Depends on `propbus-app` (port traits) and `propbus-domain` only.

mod devices;

use std::sync::Arc;

use async_trait::async_trait;
use propbus_app::bus::Bus;
use propbus_app::ports::{Device, DriverModule};
use propbus_domain::error::BusError;

pub use devices::{FocuserDevice, GpsDevice, focuser, gps};

pub const GPS_SIMULATOR: &str = "gps_simulator";
pub const GPS_DEVICE: &str = "GPS Simulator";
pub const FOCUSER_SIMULATOR: &str = "focuser_simulator";
pub const FOCUSER_DEVICE: &str = "Focuser Simulator";

type DeviceFactory = Box<dyn Fn() -> Arc<dyn Device> + Send + Sync>;

/// A driver module owning one simulated device.
///
/// Enabling attaches a fresh device; disabling detaches it. Both are no-ops
/// when the device is already in the requested state.
pub struct SimulatorDriver {
    name: String,
    device: String,
    make: DeviceFactory,
}

impl SimulatorDriver {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        device: impl Into<String>,
        make: impl Fn() -> Arc<dyn Device> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            make: Box::new(make),
        }
    }

    /// GPS simulator restoring its saved coordinates on attach.
    #[must_use]
    pub fn gps() -> Self {
        Self::new(GPS_SIMULATOR, GPS_DEVICE, || {
            Arc::new(GpsDevice::new(GPS_DEVICE).with_load_config(true))
        })
    }

    #[must_use]
    pub fn focuser() -> Self {
        Self::new(FOCUSER_SIMULATOR, FOCUSER_DEVICE, || {
            Arc::new(FocuserDevice::new(FOCUSER_DEVICE))
        })
    }

    /// Name of the device this module attaches.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device
    }
}

#[async_trait]
impl DriverModule for SimulatorDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enable(&self, bus: &Bus, enabled: bool) -> Result<(), BusError> {
        if enabled {
            if bus.has_device(&self.device) {
                return Ok(());
            }
            bus.attach_device((self.make)()).await
        } else {
            bus.detach_device(&self.device).await.map(|_| ())
        }
    }
}

/// Every simulator module shipped by this crate.
#[must_use]
pub fn simulators() -> Vec<Arc<dyn DriverModule>> {
    vec![
        Arc::new(SimulatorDriver::gps()),
        Arc::new(SimulatorDriver::focuser()),
    ]
}
