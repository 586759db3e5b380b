//! Focuser simulator — absolute moves that take time to complete.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use propbus_app::bus::{DeviceContext, PropertyCell};
use propbus_app::dispatch::DispatchTable;
use propbus_app::ports::{ChangeOutcome, Device};
use propbus_app::standard::{CONFIG, CONNECTION, StandardProperties};
use propbus_domain::error::BusError;
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::item::{Item, ItemKind};
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::Recipient;
use propbus_domain::property::{Permission, Property, PropertyState, RangePolicy};
use propbus_domain::request::ChangeRequest;

use super::{change_connection, define_matching, lock, release_all};

pub const FOCUSER_POSITION: &str = "FOCUSER_POSITION";
pub const FOCUSER_SPEED: &str = "FOCUSER_SPEED";

pub const POSITION: &str = "POSITION";
pub const SPEED: &str = "SPEED";

const FOCUSER_GROUP: &str = "Focuser";
const DEFAULT_MOVE_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
enum Route {
    Connection,
    Position,
    Speed,
    Config,
}

struct FocuserProperties {
    standard: StandardProperties,
    position: Arc<PropertyCell>,
    speed: Arc<PropertyCell>,
    routes: DispatchTable<Route>,
}

impl FocuserProperties {
    fn new(device: &str) -> Result<Self, BusError> {
        let mut position = Property::builder()
            .device(device)
            .name(FOCUSER_POSITION)
            .group(FOCUSER_GROUP)
            .label("Absolute position")
            .permission(Permission::ReadWrite)
            .kind(ItemKind::Number)
            .range_policy(RangePolicy::Reject)
            .capacity(1)
            .build()?;
        position.append_item(Item::number(POSITION, "Position", 0.0, 10000.0, 1.0, 0.0)?)?;

        let mut speed = Property::builder()
            .device(device)
            .name(FOCUSER_SPEED)
            .group(FOCUSER_GROUP)
            .label("Speed")
            .permission(Permission::ReadWrite)
            .kind(ItemKind::Number)
            .capacity(1)
            .build()?;
        speed.append_item(Item::number(SPEED, "Speed", 1.0, 10.0, 1.0, 1.0)?)?;

        Ok(Self {
            standard: StandardProperties::new(device)?,
            position: PropertyCell::new(position),
            speed: PropertyCell::new(speed),
            routes: DispatchTable::new()
                .route(CONNECTION, Route::Connection)
                .route(FOCUSER_POSITION, Route::Position)
                .route(FOCUSER_SPEED, Route::Speed)
                .route(CONFIG, Route::Config),
        })
    }

    fn domain(&self) -> [Arc<PropertyCell>; 2] {
        [Arc::clone(&self.position), Arc::clone(&self.speed)]
    }

    fn all(&self) -> Vec<Arc<PropertyCell>> {
        let mut cells = self.standard.cells().to_vec();
        cells.extend(self.domain());
        cells
    }
}

/// A motorized focuser.
///
/// A position change is validated up front; targets outside the travel
/// range put the property in `ALERT` without moving. Accepted moves go
/// `BUSY` for the simulated travel time and end `OK`. Speed changes are
/// served while a move is in flight.
pub struct FocuserDevice {
    name: String,
    move_duration: Duration,
    lifecycle: Mutex<DeviceLifecycle>,
    properties: Mutex<Option<Arc<FocuserProperties>>>,
}

impl FocuserDevice {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            move_duration: DEFAULT_MOVE_DURATION,
            lifecycle: Mutex::new(DeviceLifecycle::Detached),
            properties: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_move_duration(mut self, duration: Duration) -> Self {
        self.move_duration = duration;
        self
    }

    fn props(&self) -> Option<Arc<FocuserProperties>> {
        lock(&self.properties).clone()
    }

    async fn move_to(
        &self,
        ctx: &DeviceContext,
        cell: &PropertyCell,
        request: &ChangeRequest,
    ) -> Result<(), BusError> {
        let mut target = cell.snapshot();
        if let Err(err) = target.copy_values(request, true) {
            let message = match &err {
                BusError::Validation(inner) => inner.to_string(),
                other => other.to_string(),
            };
            tracing::debug!(device = %self.name, %message, "move refused");
            return ctx.set_state(cell, PropertyState::Alert, Some(&message));
        }

        ctx.set_state(cell, PropertyState::Busy, Some("moving"))?;
        tokio::time::sleep(self.move_duration).await;
        ctx.modify(cell, None, |p| -> Result<(), BusError> {
            p.copy_values(request, false)?;
            p.state = PropertyState::Ok;
            Ok(())
        })?
    }
}

#[async_trait]
impl Device for FocuserDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> DeviceLifecycle {
        *lock(&self.lifecycle)
    }

    fn properties(&self) -> Vec<Arc<PropertyCell>> {
        self.props().map(|props| props.all()).unwrap_or_default()
    }

    async fn attach(&self, _ctx: &DeviceContext, version: u32) -> Result<(), BusError> {
        if !self.lifecycle().needs_allocation() {
            return Ok(());
        }
        let props = Arc::new(FocuserProperties::new(&self.name)?);
        *lock(&self.properties) = Some(props);
        *lock(&self.lifecycle) = DeviceLifecycle::Attached;
        tracing::info!(device = %self.name, version, "focuser attached");
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
            .ok_or(BusError::Precondition("focuser is not attached"))?;
        let Some(route) = props.routes.resolve(&request.property) else {
            return Ok(ChangeOutcome::NoMatch);
        };
        let connected = self.lifecycle().is_connected();
        match route {
            Route::Connection => {
                change_connection(
                    ctx,
                    &props.standard,
                    &self.lifecycle,
                    &props.domain(),
                    request,
                )?;
            }
            Route::Position if connected => self.move_to(ctx, &props.position, request).await?,
            Route::Speed if connected => {
                ctx.modify(&props.speed, None, |p| -> Result<(), BusError> {
                    p.copy_values(request, true)?;
                    p.state = PropertyState::Ok;
                    Ok(())
                })??;
            }
            Route::Position | Route::Speed => return Ok(ChangeOutcome::NoMatch),
            Route::Config => {
                let saveable = [Arc::clone(&props.speed)];
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
        Ok(())
    }
}
