//! propbusd — property bus daemon.
//!
//! Composition root: builds the `SQLite` property store, registers the
//! driver modules, attaches the Driver Registry and runs until Ctrl-C.

mod config;

use std::sync::Arc;

use anyhow::Context;
use propbus_adapter_storage_sqlite_sqlx::SqlitePropertyStore;
use propbus_adapter_virtual::simulators;
use propbus_app::bus::Bus;
use propbus_app::driver_registry::DriverRegistry;
use propbus_app::drivers::DriverTable;
use propbus_domain::notification::Notification;
use tokio_stream::{Stream, StreamExt};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db = propbus_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open property database")?;
    let store = Arc::new(SqlitePropertyStore::new(db.pool().clone()));

    let mut drivers = DriverTable::builder();
    for module in simulators() {
        drivers = drivers.driver(module, config.drivers.enable_simulators);
    }
    let drivers = drivers.build().context("invalid driver table")?;

    let bus = Bus::new(store, drivers);
    let monitor = tokio::spawn(log_notifications(bus.monitor().stream()));

    bus.attach_device(Arc::new(DriverRegistry::new(
        config.server.name.clone(),
        bus.drivers(),
    )))
    .await
    .context("failed to attach the driver registry")?;

    let table = bus.drivers();
    tracing::info!(
        server = %config.server.name,
        drivers = ?table.enabled(),
        devices = ?bus.device_names(),
        "propbusd ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    let detached = bus.detach_all().await;
    monitor.abort();
    detached.context("failed to detach devices")?;
    Ok(())
}

async fn log_notifications(stream: impl Stream<Item = Notification>) {
    tokio::pin!(stream);
    while let Some(notification) = stream.next().await {
        tracing::debug!(
            kind = %notification.kind,
            device = %notification.device(),
            property = %notification.property_name(),
            state = %notification.property.state,
            message = notification.message.as_deref().unwrap_or_default(),
            "notification"
        );
    }
}
