//! Port definitions — traits at the boundaries of the bus.
//!
//! Ports are defined here (in `app`) so that both the bus and the adapter
//! crates can depend on them without creating circular dependencies.

pub mod client;
pub mod device;
pub mod driver;
pub mod store;

pub use client::{ClientSink, DeliveryError};
pub use device::{ChangeOutcome, Device};
pub use driver::DriverModule;
pub use store::PropertyStore;
