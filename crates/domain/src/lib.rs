//! # propbus-domain
//!
//! Pure domain model for the propbus device-property bus.
//!
//! ## Responsibilities
//! - Foundational types: client identifiers, error conventions, timestamps
//! - Define **Items** (typed leaf values with bounds) and **Properties**
//!   (named, grouped, ordered item sets with state, permission, and rule)
//! - Define **Change requests** and the name-based **filters** used for routing
//! - Define **Notifications** (define/update/delete) and their recipients
//! - Define the device **lifecycle** and the durable **property record**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod filter;
pub mod item;
pub mod lifecycle;
pub mod notification;
pub mod property;
pub mod record;
pub mod request;
