//! # propbus-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `PropertyStore` port defined in `propbus-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between property records and database rows
//!
//! ## Dependency rule
//! Depends on `propbus-app` (for port traits) and `propbus-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod pool;
mod property_store;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use property_store::SqlitePropertyStore;
