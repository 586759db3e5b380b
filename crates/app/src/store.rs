//! In-memory property store, used when no durable store is configured and
//! in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use propbus_domain::error::BusError;
use propbus_domain::record::PropertyRecord;

use crate::ports::PropertyStore;

#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    records: Mutex<HashMap<(String, String), PropertyRecord>>,
}

impl InMemoryPropertyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn save(&self, record: PropertyRecord) -> Result<(), BusError> {
        let key = (record.device.clone(), record.property.clone());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
        Ok(())
    }

    async fn load(
        &self,
        device: &str,
        property: &str,
    ) -> Result<Option<PropertyRecord>, BusError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(device.to_string(), property.to_string()))
            .cloned())
    }
}
