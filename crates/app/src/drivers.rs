//! Driver table — the explicit, bus-owned list of installable driver modules.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use propbus_domain::error::{BusError, NotFoundError, ValidationError};

use crate::bus::Bus;
use crate::ports::DriverModule;

/// One installable module and its enablement.
pub struct DriverEntry {
    module: Arc<dyn DriverModule>,
    default_enabled: bool,
    enabled: AtomicBool,
}

impl DriverEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Whether the module belongs to the core set enabled on first start.
    #[must_use]
    pub fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    /// Whether the last successful enable call switched the module on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverEntry")
            .field("name", &self.name())
            .field("default_enabled", &self.default_enabled)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Ordered set of driver modules, fixed at construction.
#[derive(Debug, Default)]
pub struct DriverTable {
    entries: Vec<DriverEntry>,
}

impl DriverTable {
    #[must_use]
    pub fn builder() -> DriverTableBuilder {
        DriverTableBuilder::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[DriverEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DriverEntry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// Names of the modules currently enabled.
    #[must_use]
    pub fn enabled(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_enabled())
            .map(DriverEntry::name)
            .collect()
    }

    /// Enable or disable the module called `name`.
    ///
    /// The recorded flag only changes when the module call succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotFound`] for an unknown module, or the module's
    /// own error.
    #[tracing::instrument(skip(self, bus))]
    pub async fn set_enabled(&self, bus: &Bus, name: &str, enabled: bool) -> Result<(), BusError> {
        let entry = self.get(name).ok_or_else(|| NotFoundError {
            kind: "driver",
            name: name.to_string(),
        })?;
        entry.module.enable(bus, enabled).await?;
        entry.enabled.store(enabled, Ordering::Release);
        tracing::info!(enabled, "driver toggled");
        Ok(())
    }
}

#[derive(Default)]
pub struct DriverTableBuilder {
    entries: Vec<(Arc<dyn DriverModule>, bool)>,
}

impl DriverTableBuilder {
    /// Register a module. `default_enabled` places it in the core set.
    #[must_use]
    pub fn driver(mut self, module: Arc<dyn DriverModule>, default_enabled: bool) -> Self {
        self.entries.push((module, default_enabled));
        self
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateDriver`] when two modules share a
    /// name, or [`ValidationError::EmptyName`] for an unnamed module.
    pub fn build(self) -> Result<DriverTable, BusError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.entries.len());
        for (module, default_enabled) in self.entries {
            let name = module.name().to_string();
            if name.is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
            if !seen.insert(name.clone()) {
                return Err(ValidationError::DuplicateDriver(name).into());
            }
            entries.push(DriverEntry {
                module,
                default_enabled,
                enabled: AtomicBool::new(false),
            });
        }
        Ok(DriverTable { entries })
    }
}
