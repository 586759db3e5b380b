//! Property cell — the authoritative copy of one property plus its
//! subscription bookkeeping.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use propbus_domain::id::ClientId;
use propbus_domain::property::{Property, PropertyState};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

/// Shared home of a property.
///
/// Two locks guard a cell:
/// - the **slot** lock (short, synchronous) covers the item values, the
///   defined flag, and the set of interested clients. Fan-out happens while
///   it is held, so every client observes the same sequence of snapshots.
/// - the **change gate** (async) serializes change requests for this
///   property. It may be held across long device I/O without blocking
///   enumeration or changes of other properties.
pub struct PropertyCell {
    device: String,
    name: String,
    slot: Mutex<Slot>,
    gate: AsyncMutex<()>,
}

pub(crate) struct Slot {
    pub(crate) property: Property,
    pub(crate) defined: bool,
    pub(crate) interested: BTreeSet<ClientId>,
}

impl PropertyCell {
    #[must_use]
    pub fn new(property: Property) -> Arc<Self> {
        Arc::new(Self {
            device: property.device.clone(),
            name: property.name.clone(),
            slot: Mutex::new(Slot {
                property,
                defined: false,
                interested: BTreeSet::new(),
            }),
            gate: AsyncMutex::new(()),
        })
    }

    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone the current property value.
    #[must_use]
    pub fn snapshot(&self) -> Property {
        self.slot().property.clone()
    }

    /// Read the property without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&Property) -> R) -> R {
        f(&self.slot().property)
    }

    /// Mutate the property without notifying anyone.
    ///
    /// Item count and kinds cannot change through this; only values and
    /// header fields.
    pub fn write<R>(&self, f: impl FnOnce(&mut Property) -> R) -> R {
        f(&mut self.slot().property)
    }

    #[must_use]
    pub fn state(&self) -> PropertyState {
        self.slot().property.state
    }

    /// Whether clients currently know about this property.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.slot().defined
    }

    /// Clients that received a definition and have not seen a delete since.
    #[must_use]
    pub fn interested(&self) -> Vec<ClientId> {
        self.slot().interested.iter().copied().collect()
    }

    /// Wait for exclusive change access to this property.
    pub async fn lock_change(&self) -> AsyncMutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub(crate) fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn forget_client(&self, client: ClientId) {
        self.slot().interested.remove(&client);
    }
}

impl std::fmt::Debug for PropertyCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCell")
            .field("device", &self.device)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
