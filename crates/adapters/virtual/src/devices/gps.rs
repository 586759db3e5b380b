//! GPS simulator — a fixed site location with a settable position.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use propbus_app::bus::{DeviceContext, PropertyCell};
use propbus_app::dispatch::DispatchTable;
use propbus_app::ports::{ChangeOutcome, Device};
use propbus_app::standard::{CONFIG, CONNECTED, CONNECTION, MAIN_GROUP, StandardProperties};
use propbus_domain::error::BusError;
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::item::{Item, ItemKind};
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::Recipient;
use propbus_domain::property::{Permission, Property, PropertyState};
use propbus_domain::request::ChangeRequest;
use propbus_domain::time::now;

use super::{change_connection, define_matching, lock, release_all};

pub const GPS_INFO: &str = "GPS_INFO";
pub const GEOGRAPHIC_COORDINATES: &str = "GEOGRAPHIC_COORDINATES";
pub const GPS_UTC_TIME: &str = "GPS_UTC_TIME";

pub const LATITUDE: &str = "LATITUDE";
pub const LONGITUDE: &str = "LONGITUDE";
pub const ELEVATION: &str = "ELEVATION";

const SITE_GROUP: &str = "Site";

#[derive(Debug, Clone, Copy)]
enum Route {
    Connection,
    Coordinates,
    Config,
}

struct GpsProperties {
    standard: StandardProperties,
    info: Arc<PropertyCell>,
    coordinates: Arc<PropertyCell>,
    utc_time: Arc<PropertyCell>,
    routes: DispatchTable<Route>,
}

impl GpsProperties {
    fn new(device: &str) -> Result<Self, BusError> {
        let mut info = Property::builder()
            .device(device)
            .name(GPS_INFO)
            .group(MAIN_GROUP)
            .label("Info")
            .permission(Permission::ReadOnly)
            .kind(ItemKind::Text)
            .capacity(3)
            .build()?;
        info.append_item(Item::text("VENDOR", "Vendor", "propbus"))?
            .append_item(Item::text("MODEL", "Model", "GPS Simulator"))?
            .append_item(Item::text("FIRMWARE", "Firmware", "N/A"))?;

        let mut coordinates = Property::builder()
            .device(device)
            .name(GEOGRAPHIC_COORDINATES)
            .group(SITE_GROUP)
            .label("Location")
            .permission(Permission::ReadWrite)
            .kind(ItemKind::Number)
            .capacity(3)
            .build()?;
        coordinates
            .append_item(Item::number(
                LATITUDE,
                "Latitude (-90 to +90° +N)",
                -90.0,
                90.0,
                0.0,
                0.0,
            )?)?
            .append_item(Item::number(
                LONGITUDE,
                "Longitude (0 to 360° +E)",
                -180.0,
                360.0,
                0.0,
                0.0,
            )?)?
            .append_item(Item::number(ELEVATION, "Elevation (m)", 0.0, 8000.0, 0.0, 0.0)?)?;

        let mut utc_time = Property::builder()
            .device(device)
            .name(GPS_UTC_TIME)
            .group(SITE_GROUP)
            .label("UTC time")
            .permission(Permission::ReadOnly)
            .kind(ItemKind::Text)
            .hidden(true)
            .capacity(2)
            .build()?;
        utc_time
            .append_item(Item::text("UTC", "UTC Time", "0000-00-00T00:00:00"))?
            .append_item(Item::text("OFFSET", "UTC Offset", "0"))?;

        Ok(Self {
            standard: StandardProperties::new(device)?,
            info: PropertyCell::new(info),
            coordinates: PropertyCell::new(coordinates),
            utc_time: PropertyCell::new(utc_time),
            routes: DispatchTable::new()
                .route(CONNECTION, Route::Connection)
                .route(GEOGRAPHIC_COORDINATES, Route::Coordinates)
                .route(CONFIG, Route::Config),
        })
    }

    fn domain(&self) -> [Arc<PropertyCell>; 3] {
        [
            Arc::clone(&self.info),
            Arc::clone(&self.coordinates),
            Arc::clone(&self.utc_time),
        ]
    }

    fn all(&self) -> Vec<Arc<PropertyCell>> {
        let mut cells = self.standard.cells().to_vec();
        cells.extend(self.domain());
        cells
    }
}

/// A GPS receiver reporting a site location.
///
/// Longitude is stored in `[0, 360)`: negative inputs are wrapped east.
pub struct GpsDevice {
    name: String,
    load_config: bool,
    lifecycle: Mutex<DeviceLifecycle>,
    properties: Mutex<Option<Arc<GpsProperties>>>,
}

impl GpsDevice {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            load_config: false,
            lifecycle: Mutex::new(DeviceLifecycle::Detached),
            properties: Mutex::new(None),
        }
    }

    /// Restore saved coordinates on attach.
    #[must_use]
    pub fn with_load_config(mut self, load: bool) -> Self {
        self.load_config = load;
        self
    }

    fn props(&self) -> Option<Arc<GpsProperties>> {
        lock(&self.properties).clone()
    }

    fn change_coordinates(
        ctx: &DeviceContext,
        props: &GpsProperties,
        request: &ChangeRequest,
    ) -> Result<(), BusError> {
        ctx.modify(&props.coordinates, None, |p| -> Result<(), BusError> {
            p.copy_values(request, true)?;
            if let Some(item) = p.item_mut(LONGITUDE)
                && let Some(longitude) = item.as_number().map(|n| n.value)
            {
                item.set_number(normalize_longitude(longitude));
            }
            p.state = PropertyState::Ok;
            Ok(())
        })?
    }

    fn refresh_clock(props: &GpsProperties) {
        let stamp = now().format("%Y-%m-%dT%H:%M:%S").to_string();
        props.utc_time.write(|p| {
            if let Some(item) = p.item_mut("UTC") {
                item.set_text(stamp);
            }
            p.state = PropertyState::Ok;
        });
    }
}

/// Wrap a longitude into `[0, 360)`.
fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = longitude.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to the modulus itself.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[async_trait]
impl Device for GpsDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> DeviceLifecycle {
        *lock(&self.lifecycle)
    }

    fn properties(&self) -> Vec<Arc<PropertyCell>> {
        self.props().map(|props| props.all()).unwrap_or_default()
    }

    #[tracing::instrument(skip_all, fields(device = %self.name))]
    async fn attach(&self, ctx: &DeviceContext, version: u32) -> Result<(), BusError> {
        if !self.lifecycle().needs_allocation() {
            return Ok(());
        }
        let props = Arc::new(GpsProperties::new(&self.name)?);
        *lock(&self.properties) = Some(Arc::clone(&props));
        *lock(&self.lifecycle) = DeviceLifecycle::Attached;

        if self.load_config {
            match ctx.load(&props.coordinates).await {
                Ok(true) => tracing::debug!("saved coordinates restored"),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "failed to restore coordinates");
                    props.coordinates.write(|p| p.state = PropertyState::Alert);
                }
            }
        }
        tracing::info!(version, "gps attached");
        Ok(())
    }

    async fn enumerate(
        &self,
        ctx: &DeviceContext,
        recipient: Recipient,
        filter: &PropertyFilter,
    ) -> Result<(), BusError> {
        let Some(props) = self.props() else {
            return Ok(());
        };
        define_matching(ctx, &props.standard.cells(), recipient, filter)?;
        if self.lifecycle().is_connected() {
            define_matching(ctx, &props.domain(), recipient, filter)?;
        }
        Ok(())
    }

    async fn change(
        &self,
        ctx: &DeviceContext,
        _client: Option<ClientId>,
        request: &ChangeRequest,
    ) -> Result<ChangeOutcome, BusError> {
        let props = self
            .props()
            .ok_or(BusError::Precondition("gps device is not attached"))?;
        let Some(route) = props.routes.resolve(&request.property) else {
            return Ok(ChangeOutcome::NoMatch);
        };
        match route {
            Route::Connection => {
                if request.switch_value(CONNECTED) == Some(true) {
                    Self::refresh_clock(&props);
                }
                change_connection(
                    ctx,
                    &props.standard,
                    &self.lifecycle,
                    &props.domain(),
                    request,
                )?;
            }
            Route::Coordinates => {
                if !self.lifecycle().is_connected() {
                    return Ok(ChangeOutcome::NoMatch);
                }
                Self::change_coordinates(ctx, &props, request)?;
            }
            Route::Config => {
                let saveable = [Arc::clone(&props.coordinates)];
                props.standard.apply_config(ctx, request, &saveable).await?;
            }
        }
        Ok(ChangeOutcome::Handled)
    }

    async fn detach(&self, ctx: &DeviceContext) -> Result<(), BusError> {
        let props = lock(&self.properties).take();
        if let Some(props) = props {
            release_all(ctx, &props.all())?;
        }
        *lock(&self.lifecycle) = DeviceLifecycle::Detached;
        tracing::info!(device = %self.name, "gps detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::{bus, bus_with, drain, names};
    use propbus_app::ports::PropertyStore;
    use propbus_app::store::InMemoryPropertyStore;
    use propbus_domain::notification::NotificationKind;

    const NAME: &str = "GPS Simulator";

    async fn connected_gps() -> (propbus_app::bus::Bus, ClientId, Arc<GpsDevice>) {
        let bus = bus();
        let gps = Arc::new(GpsDevice::new(NAME));
        bus.attach_device(gps.clone()).await.unwrap();
        let (client, _rx) = bus.connect_channel();
        let connect = ChangeRequest::new(NAME, CONNECTION).switch(CONNECTED, true);
        bus.change(client, &connect).await.unwrap();
        (bus, client, gps)
    }

    fn coordinates(gps: &GpsDevice) -> (f64, f64, f64) {
        gps.props().unwrap().coordinates.read(|p| {
            (
                p.number_value(LATITUDE).unwrap(),
                p.number_value(LONGITUDE).unwrap(),
                p.number_value(ELEVATION).unwrap(),
            )
        })
    }

    #[tokio::test]
    async fn should_normalize_longitude_into_full_circle() {
        let (bus, client, gps) = connected_gps().await;

        for (input, expected) in [
            (-30.0, 330.0),
            (10.0, 10.0),
            (359.0, 359.0),
            (360.0, 0.0),
            (-1e-20, 0.0),
        ] {
            let request = ChangeRequest::new(NAME, GEOGRAPHIC_COORDINATES).number(LONGITUDE, input);
            bus.change(client, &request).await.unwrap();
            assert_eq!(coordinates(&gps).1, expected, "input {input}");
        }
    }

    #[test]
    fn should_keep_wrapped_longitude_below_full_turn() {
        for input in [-1e-20, -f64::EPSILON, -360.0, 720.0] {
            let wrapped = normalize_longitude(input);
            assert!((0.0..360.0).contains(&wrapped), "input {input} -> {wrapped}");
        }
    }

    #[tokio::test]
    async fn should_clamp_latitude_and_elevation() {
        let (bus, client, gps) = connected_gps().await;

        let request = ChangeRequest::new(NAME, GEOGRAPHIC_COORDINATES)
            .number(LATITUDE, 120.0)
            .number(ELEVATION, -5.0);
        bus.change(client, &request).await.unwrap();

        let (lat, _, elev) = coordinates(&gps);
        assert_eq!(lat, 90.0);
        assert_eq!(elev, 0.0);
        assert_eq!(gps.props().unwrap().coordinates.state(), PropertyState::Ok);
    }

    #[tokio::test]
    async fn should_define_only_standard_properties_while_disconnected() {
        let bus = bus();
        bus.attach_device(Arc::new(GpsDevice::new(NAME))).await.unwrap();
        let (client, mut rx) = bus.connect_channel();

        bus.enumerate(client, &PropertyFilter::any()).await.unwrap();

        let mut defined = names(&drain(&mut rx), NotificationKind::Define);
        defined.sort();
        assert_eq!(defined, [CONFIG, CONNECTION]);
    }

    #[tokio::test]
    async fn should_define_and_delete_domain_properties_on_connection_toggle() {
        let bus = bus();
        bus.attach_device(Arc::new(GpsDevice::new(NAME))).await.unwrap();
        let (client, mut rx) = bus.connect_channel();
        bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
        drain(&mut rx);

        let connect = ChangeRequest::new(NAME, CONNECTION).switch(CONNECTED, true);
        bus.change(client, &connect).await.unwrap();
        let seen = drain(&mut rx);
        assert_eq!(
            names(&seen, NotificationKind::Define),
            [GPS_INFO, GEOGRAPHIC_COORDINATES, GPS_UTC_TIME]
        );
        assert_eq!(names(&seen, NotificationKind::Update), [CONNECTION]);
        let utc = seen
            .iter()
            .find(|n| n.property_name() == GPS_UTC_TIME)
            .unwrap();
        assert!(utc.property.hidden);
        assert_ne!(utc.property.text_value("UTC"), Some("0000-00-00T00:00:00"));

        let disconnect = ChangeRequest::new(NAME, CONNECTION).switch(CONNECTED, false);
        bus.change(client, &disconnect).await.unwrap();
        let seen = drain(&mut rx);
        assert_eq!(
            names(&seen, NotificationKind::Delete),
            [GPS_INFO, GEOGRAPHIC_COORDINATES, GPS_UTC_TIME]
        );
    }

    #[tokio::test]
    async fn should_ignore_coordinates_while_disconnected() {
        let bus = bus();
        let gps = Arc::new(GpsDevice::new(NAME));
        bus.attach_device(gps.clone()).await.unwrap();
        let (client, _rx) = bus.connect_channel();

        let request = ChangeRequest::new(NAME, GEOGRAPHIC_COORDINATES).number(LATITUDE, 10.0);
        let outcome = bus.change(client, &request).await.unwrap();

        assert_eq!(outcome, ChangeOutcome::NoMatch);
        assert_eq!(coordinates(&gps).0, 0.0);
    }

    #[tokio::test]
    async fn should_deny_writes_to_gps_info() {
        let (bus, client, _gps) = connected_gps().await;

        let request = ChangeRequest::new(NAME, GPS_INFO).text("VENDOR", "other");
        let result = bus.change(client, &request).await;

        assert!(matches!(result, Err(BusError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn should_restore_saved_coordinates_after_reattach() {
        let store = Arc::new(InMemoryPropertyStore::new());
        let bus = bus_with(store.clone());
        bus.attach_device(Arc::new(GpsDevice::new(NAME).with_load_config(true)))
            .await
            .unwrap();
        let (client, _rx) = bus.connect_channel();
        let connect = ChangeRequest::new(NAME, CONNECTION).switch(CONNECTED, true);
        bus.change(client, &connect).await.unwrap();
        let request = ChangeRequest::new(NAME, GEOGRAPHIC_COORDINATES)
            .number(LATITUDE, 10.0)
            .number(LONGITUDE, 20.0)
            .number(ELEVATION, 100.0);
        bus.change(client, &request).await.unwrap();
        let save = ChangeRequest::new(NAME, CONFIG).switch("SAVE", true);
        bus.change(client, &save).await.unwrap();

        bus.detach_device(NAME).await.unwrap();
        let gps = Arc::new(GpsDevice::new(NAME).with_load_config(true));
        bus.attach_device(gps.clone()).await.unwrap();

        assert_eq!(coordinates(&gps), (10.0, 20.0, 100.0));
        assert!(store.exists(NAME, GEOGRAPHIC_COORDINATES).await.unwrap());
        assert!(!store.exists(NAME, GPS_INFO).await.unwrap());
    }

    #[tokio::test]
    async fn should_reset_config_switch_after_save() {
        let (bus, client, gps) = connected_gps().await;

        let save = ChangeRequest::new(NAME, CONFIG).switch("SAVE", true);
        bus.change(client, &save).await.unwrap();

        let config = &gps.props().unwrap().standard.config;
        assert_eq!(config.read(|p| p.switch_value("SAVE")), Some(false));
        assert_eq!(config.state(), PropertyState::Ok);
    }

    #[tokio::test]
    async fn should_release_every_property_on_detach() {
        let (bus, _client, gps) = connected_gps().await;

        bus.detach_device(NAME).await.unwrap();

        assert!(gps.properties().is_empty());
        assert_eq!(gps.lifecycle(), DeviceLifecycle::Detached);
    }
}
