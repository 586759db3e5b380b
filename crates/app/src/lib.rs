//! # propbus-app
//!
//! Application layer — the bus itself and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `Device` — attach / enumerate / change / detach lifecycle of a driver
//!   - `ClientSink` — where a client's notifications are delivered
//!   - `PropertyStore` — save and load property values
//!   - `DriverModule` — an installable unit that can be enabled at runtime
//! - Provide the **bus**: device/client routing, per-property change
//!   serialization, and define/update/delete fan-out
//! - Provide shared building blocks for devices: standard `CONNECTION` and
//!   `CONFIG` properties, ordered dispatch tables
//! - Provide the **driver table** and the **Driver Registry** pseudo-device
//! - Provide **in-process infrastructure** that doesn't need IO (notification
//!   monitor, in-memory store)
//!
//! ## Dependency rule
//! Depends on `propbus-domain` only (plus `tokio::sync` for channels and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bus;
pub mod dispatch;
pub mod driver_registry;
pub mod drivers;
pub mod monitor;
pub mod ports;
pub mod standard;
pub mod store;
