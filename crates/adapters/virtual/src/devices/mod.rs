//! Simulated devices — GPS and focuser.
//!
//! Both follow the same visibility rule: `CONNECTION` and `CONFIG` are
//! defined as soon as the device is attached, the device's own properties
//! only while it is connected.

pub mod focuser;
pub mod gps;

pub use focuser::FocuserDevice;
pub use gps::GpsDevice;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use propbus_app::bus::{DeviceContext, PropertyCell};
use propbus_app::standard::StandardProperties;
use propbus_domain::error::BusError;
use propbus_domain::filter::PropertyFilter;
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::Recipient;
use propbus_domain::request::ChangeRequest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Define every cell matching `filter` to `recipient`.
fn define_matching<'a>(
    ctx: &DeviceContext,
    cells: impl IntoIterator<Item = &'a Arc<PropertyCell>>,
    recipient: Recipient,
    filter: &PropertyFilter,
) -> Result<(), BusError> {
    for cell in cells {
        if cell.read(|p| filter.matches(p)) {
            ctx.define(cell, recipient, None)?;
        }
    }
    Ok(())
}

/// Apply a `CONNECTION` request: define the device properties to every
/// client on connect, delete them on disconnect, then settle `CONNECTION`.
///
/// Returns whether the device is now connected.
fn change_connection(
    ctx: &DeviceContext,
    standard: &StandardProperties,
    lifecycle: &Mutex<DeviceLifecycle>,
    domain: &[Arc<PropertyCell>],
    request: &ChangeRequest,
) -> Result<bool, BusError> {
    let connected = standard.set_connection(request)?;
    {
        let mut state = lock(lifecycle);
        *state = state.with_connection(connected);
    }
    for cell in domain {
        if connected {
            ctx.define(cell, Recipient::All, None)?;
        } else {
            ctx.delete(cell, None)?;
        }
    }
    standard.finish_connection(ctx)?;
    tracing::info!(device = %ctx.device_name(), connected, "connection changed");
    Ok(connected)
}

/// Delete and release every property of a device.
fn release_all(ctx: &DeviceContext, cells: &[Arc<PropertyCell>]) -> Result<(), BusError> {
    for cell in cells {
        ctx.delete(cell, None)?;
    }
    Ok(())
}
