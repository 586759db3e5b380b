//! Persistence port — durable storage for saved property values.

use std::sync::Arc;

use async_trait::async_trait;
use propbus_domain::error::BusError;
use propbus_domain::record::PropertyRecord;

/// Stores saved item values keyed by `(device name, property name)`.
///
/// Saving a record replaces any previous record under the same key.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Persist a record, replacing the previous one for the same key.
    async fn save(&self, record: PropertyRecord) -> Result<(), BusError>;

    /// Load the record saved for `(device, property)`, if any.
    async fn load(&self, device: &str, property: &str)
    -> Result<Option<PropertyRecord>, BusError>;

    /// Whether a record exists for `(device, property)`.
    async fn exists(&self, device: &str, property: &str) -> Result<bool, BusError> {
        Ok(self.load(device, property).await?.is_some())
    }
}

#[async_trait]
impl<T: PropertyStore + ?Sized> PropertyStore for Arc<T> {
    async fn save(&self, record: PropertyRecord) -> Result<(), BusError> {
        (**self).save(record).await
    }

    async fn load(
        &self,
        device: &str,
        property: &str,
    ) -> Result<Option<PropertyRecord>, BusError> {
        (**self).load(device, property).await
    }

    async fn exists(&self, device: &str, property: &str) -> Result<bool, BusError> {
        (**self).exists(device, property).await
    }
}
