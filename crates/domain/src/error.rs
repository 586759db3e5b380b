//! Error types shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`BusError`]
//! via `#[from]`. Routing mismatches are not errors: a change request that
//! targets nothing is reported as a no-op outcome, never through this type.

use std::error::Error as StdError;

/// Base error for every bus, device, and store operation.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// A property, item, or device could not be constructed as declared.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A write was attempted on a read-only property.
    #[error("permission denied")]
    PermissionDenied(#[from] PermissionDeniedError),

    /// A required device/context reference was absent.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    /// A named thing does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The persistence store failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),

    /// A driver module failed to enable or disable.
    #[error("driver error")]
    Driver(#[source] Box<dyn StdError + Send + Sync>),
}

/// Construction and value validation failures.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("property {property} accepts at most {capacity} items")]
    CapacityExceeded { property: String, capacity: usize },

    #[error("item {item} already exists in property {property}")]
    DuplicateItem { property: String, item: String },

    #[error("item {item} does not match the kind of property {property}")]
    KindMismatch { property: String, item: String },

    #[error("switch property {0} requires a rule")]
    MissingRule(String),

    #[error("number item {item} has min {min} above max {max}")]
    InvalidBounds { item: String, min: f64, max: f64 },

    #[error("value {value} of item {item} is outside [{min}, {max}]")]
    OutOfRange {
        item: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("device {0} is already attached")]
    DuplicateDevice(String),

    #[error("driver {0} is registered twice")]
    DuplicateDriver(String),
}

/// A write attempted on a read-only property.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("property {device}.{property} is read-only")]
pub struct PermissionDeniedError {
    pub device: String,
    pub property: String,
}

/// A lookup by name that found nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{kind} {name} not found")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub name: String,
}
