use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use propbus_domain::error::{BusError, ValidationError};
use propbus_domain::filter::PropertyFilter;
use propbus_domain::id::ClientId;
use propbus_domain::item::{Item, ItemKind};
use propbus_domain::lifecycle::DeviceLifecycle;
use propbus_domain::notification::{Notification, NotificationKind, Recipient};
use propbus_domain::property::{Permission, Property, PropertyState};
use propbus_domain::request::ChangeRequest;
use tokio::sync::{Notify, mpsc};

use super::{Bus, DeviceContext, PropertyCell};
use crate::drivers::DriverTable;
use crate::ports::{ChangeOutcome, Device};
use crate::store::InMemoryPropertyStore;

const DEVICE: &str = "Test Device";

struct TestDevice {
    name: String,
    fail_attach: bool,
    lifecycle: Mutex<DeviceLifecycle>,
    cells: Mutex<Vec<Arc<PropertyCell>>>,
    release: Arc<Notify>,
    attach_calls: AtomicUsize,
    detach_calls: AtomicUsize,
}

impl TestDevice {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_attach: false,
            lifecycle: Mutex::new(DeviceLifecycle::Detached),
            cells: Mutex::new(Vec::new()),
            release: Arc::new(Notify::new()),
            attach_calls: AtomicUsize::new(0),
            detach_calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        let mut device = Arc::into_inner(Self::new(name)).unwrap();
        device.fail_attach = true;
        Arc::new(device)
    }

    fn cell(&self, name: &str) -> Arc<PropertyCell> {
        self.cells
            .lock()
            .unwrap()
            .iter()
            .find(|cell| cell.name() == name)
            .cloned()
            .unwrap()
    }

    fn number(&self, property: &str) -> Result<Arc<PropertyCell>, BusError> {
        let mut p = Property::builder()
            .device(&self.name)
            .name(property)
            .kind(ItemKind::Number)
            .capacity(1)
            .build()?;
        p.append_item(Item::number("X", "X", 0.0, 100.0, 1.0, 0.0)?)?;
        Ok(PropertyCell::new(p))
    }
}

#[async_trait]
impl Device for TestDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> DeviceLifecycle {
        *self.lifecycle.lock().unwrap()
    }

    fn properties(&self) -> Vec<Arc<PropertyCell>> {
        self.cells.lock().unwrap().clone()
    }

    async fn attach(&self, _ctx: &DeviceContext, _version: u32) -> Result<(), BusError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if !self.lifecycle().needs_allocation() {
            return Ok(());
        }
        let mut info = Property::builder()
            .device(&self.name)
            .name("INFO")
            .permission(Permission::ReadOnly)
            .capacity(1)
            .build()?;
        info.append_item(Item::text("MODEL", "Model", "test"))?;
        self.cells.lock().unwrap().push(PropertyCell::new(info));
        if self.fail_attach {
            return Err(ValidationError::EmptyName.into());
        }
        let value = self.number("VALUE")?;
        let slow = self.number("SLOW")?;
        self.cells.lock().unwrap().extend([value, slow]);
        *self.lifecycle.lock().unwrap() = DeviceLifecycle::Connected;
        Ok(())
    }

    async fn enumerate(
        &self,
        ctx: &DeviceContext,
        recipient: Recipient,
        filter: &PropertyFilter,
    ) -> Result<(), BusError> {
        for cell in self.properties() {
            if cell.read(|p| filter.matches(p)) {
                ctx.define(&cell, recipient, None)?;
            }
        }
        Ok(())
    }

    async fn change(
        &self,
        ctx: &DeviceContext,
        _client: Option<ClientId>,
        request: &ChangeRequest,
    ) -> Result<ChangeOutcome, BusError> {
        match request.property.as_str() {
            "VALUE" => {
                let cell = self.cell("VALUE");
                ctx.modify(&cell, None, |p| {
                    p.state = PropertyState::Ok;
                    p.copy_values(request, true)
                })??;
            }
            "SLOW" => {
                let cell = self.cell("SLOW");
                ctx.set_state(&cell, PropertyState::Busy, None)?;
                self.release.notified().await;
                ctx.modify(&cell, None, |p| {
                    p.state = PropertyState::Ok;
                    p.copy_values(request, true)
                })??;
            }
            _ => return Ok(ChangeOutcome::NoMatch),
        }
        Ok(ChangeOutcome::Handled)
    }

    async fn detach(&self, ctx: &DeviceContext) -> Result<(), BusError> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        let cells = std::mem::take(&mut *self.cells.lock().unwrap());
        for cell in &cells {
            ctx.delete(cell, None)?;
        }
        *self.lifecycle.lock().unwrap() = DeviceLifecycle::Detached;
        Ok(())
    }
}

fn bus() -> Bus {
    Bus::new(Arc::new(InMemoryPropertyStore::new()), DriverTable::default())
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<(NotificationKind, String)> {
    let mut seen = Vec::new();
    while let Ok(n) = rx.try_recv() {
        seen.push((n.kind, n.property.name.clone()));
    }
    seen
}

async fn attached() -> (Bus, Arc<TestDevice>) {
    let bus = bus();
    let device = TestDevice::new(DEVICE);
    bus.attach_device(device.clone()).await.unwrap();
    (bus, device)
}

#[tokio::test]
async fn should_send_nothing_before_enumerate() {
    let (bus, _device) = attached().await;
    let (_client, mut rx) = bus.connect_channel();
    let (other, _other_rx) = bus.connect_channel();
    bus.enumerate(other, &PropertyFilter::any()).await.unwrap();

    let request = ChangeRequest::new(DEVICE, "VALUE").number("X", 5.0);
    bus.change(other, &request).await.unwrap();
    bus.detach_device(DEVICE).await.unwrap();

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn should_deliver_define_update_delete_in_order() {
    let (bus, _device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::property(DEVICE, "VALUE"))
        .await
        .unwrap();

    for x in [1.0, 2.0] {
        let request = ChangeRequest::new(DEVICE, "VALUE").number("X", x);
        bus.change(client, &request).await.unwrap();
    }
    bus.detach_device(DEVICE).await.unwrap();

    let seen = drain(&mut rx);
    let kinds: Vec<NotificationKind> = seen.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        [
            NotificationKind::Define,
            NotificationKind::Update,
            NotificationKind::Update,
            NotificationKind::Delete
        ]
    );
    assert!(seen.iter().all(|(_, name)| name == "VALUE"));
}

#[tokio::test]
async fn should_deliver_updates_in_request_order() {
    let (bus, _device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);

    for x in [10.0, 20.0, 30.0] {
        let request = ChangeRequest::new(DEVICE, "VALUE").number("X", x);
        bus.change(client, &request).await.unwrap();
    }

    let mut values = Vec::new();
    while let Ok(n) = rx.try_recv() {
        values.push(n.property.number_value("X").unwrap());
    }
    assert_eq!(values, [10.0, 20.0, 30.0]);
}

#[tokio::test]
async fn should_send_exactly_one_delete_per_defined_property() {
    let (bus, _device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);

    bus.detach_device(DEVICE).await.unwrap();

    let mut deletes: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter(|(kind, _)| *kind == NotificationKind::Delete)
        .map(|(_, name)| name)
        .collect();
    deletes.sort();
    assert_eq!(deletes, ["INFO", "SLOW", "VALUE"]);
}

#[tokio::test]
async fn should_define_to_connected_clients_on_attach() {
    let bus = bus();
    let (_client, mut rx) = bus.connect_channel();

    bus.attach_device(TestDevice::new(DEVICE)).await.unwrap();

    let seen = drain(&mut rx);
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(kind, _)| *kind == NotificationKind::Define));
}

#[tokio::test]
async fn should_ignore_change_for_unknown_property() {
    let (bus, device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);
    let before: Vec<Property> = device.properties().iter().map(|c| c.snapshot()).collect();

    let request = ChangeRequest::new(DEVICE, "NOPE").number("X", 5.0);
    let outcome = bus.change(client, &request).await.unwrap();
    let other_device = ChangeRequest::new("Elsewhere", "VALUE").number("X", 5.0);
    let outcome_device = bus.change(client, &other_device).await.unwrap();

    assert_eq!(outcome, ChangeOutcome::NoMatch);
    assert_eq!(outcome_device, ChangeOutcome::NoMatch);
    let after: Vec<Property> = device.properties().iter().map(|c| c.snapshot()).collect();
    assert_eq!(before, after);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn should_deny_write_to_read_only_property() {
    let (bus, device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);

    let request = ChangeRequest::new(DEVICE, "INFO").text("MODEL", "hacked");
    let result = bus.change(client, &request).await;

    assert!(matches!(result, Err(BusError::PermissionDenied(_))));
    let model = device
        .cell("INFO")
        .read(|p| p.text_value("MODEL").map(str::to_owned));
    assert_eq!(model.as_deref(), Some("test"));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn should_reject_change_from_unknown_client() {
    let (bus, _device) = attached().await;
    let request = ChangeRequest::new(DEVICE, "VALUE").number("X", 5.0);
    let result = bus.change(ClientId::new(), &request).await;
    assert!(matches!(result, Err(BusError::NotFound(_))));
}

#[tokio::test]
async fn should_reject_duplicate_device_name() {
    let (bus, _device) = attached().await;
    let second = TestDevice::new(DEVICE);

    let result = bus.attach_device(second.clone()).await;

    assert!(matches!(
        result,
        Err(BusError::Validation(ValidationError::DuplicateDevice(_)))
    ));
    assert_eq!(second.attach_calls.load(Ordering::SeqCst), 0);
    assert_eq!(bus.device_names(), [DEVICE]);
}

#[tokio::test]
async fn should_detach_after_failed_attach() {
    let bus = bus();
    let device = TestDevice::failing(DEVICE);

    let result = bus.attach_device(device.clone()).await;

    assert!(result.is_err());
    assert_eq!(device.detach_calls.load(Ordering::SeqCst), 1);
    assert!(device.properties().is_empty());
    assert!(!bus.has_device(DEVICE));
}

#[tokio::test]
async fn should_complete_changes_on_other_properties_while_one_is_busy() {
    let (bus, device) = attached().await;
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);

    let slow = {
        let bus = bus.clone();
        tokio::spawn(async move {
            let request = ChangeRequest::new(DEVICE, "SLOW").number("X", 50.0);
            bus.change(client, &request).await
        })
    };
    while device.cell("SLOW").state() != PropertyState::Busy {
        tokio::task::yield_now().await;
    }

    let fast = ChangeRequest::new(DEVICE, "VALUE").number("X", 7.0);
    let outcome = tokio::time::timeout(Duration::from_secs(1), bus.change(client, &fast))
        .await
        .expect("change on another property must not wait for the busy one")
        .unwrap();
    bus.enumerate(client, &PropertyFilter::property(DEVICE, "INFO"))
        .await
        .unwrap();

    assert_eq!(outcome, ChangeOutcome::Handled);
    assert_eq!(device.cell("VALUE").read(|p| p.number_value("X")), Some(7.0));
    assert_eq!(device.cell("SLOW").state(), PropertyState::Busy);

    device.release.notify_one();
    slow.await.unwrap().unwrap();
    assert_eq!(device.cell("SLOW").state(), PropertyState::Ok);
    assert_eq!(device.cell("SLOW").read(|p| p.number_value("X")), Some(50.0));
}

#[tokio::test]
async fn should_serialize_changes_to_the_same_property() {
    let (bus, device) = attached().await;
    let (client, _rx) = bus.connect_channel();

    let first = {
        let bus = bus.clone();
        tokio::spawn(async move {
            let request = ChangeRequest::new(DEVICE, "SLOW").number("X", 1.0);
            bus.change(client, &request).await
        })
    };
    while device.cell("SLOW").state() != PropertyState::Busy {
        tokio::task::yield_now().await;
    }
    let second = {
        let bus = bus.clone();
        tokio::spawn(async move {
            let request = ChangeRequest::new(DEVICE, "SLOW").number("X", 2.0);
            bus.change(client, &request).await
        })
    };
    tokio::task::yield_now().await;

    device.release.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(device.cell("SLOW").read(|p| p.number_value("X")), Some(1.0));

    device.release.notify_one();
    second.await.unwrap().unwrap();
    assert_eq!(device.cell("SLOW").read(|p| p.number_value("X")), Some(2.0));
}

#[tokio::test]
async fn should_prune_disconnected_client_from_interest() {
    let (bus, device) = attached().await;
    let (client, _rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    assert_eq!(device.cell("VALUE").interested(), [client]);

    assert!(bus.disconnect(client));

    assert!(device.cell("VALUE").interested().is_empty());
    assert_eq!(bus.client_count(), 0);
    assert!(!bus.disconnect(client));
}

#[tokio::test]
async fn should_filter_enumeration_by_device() {
    let bus = bus();
    bus.attach_device(TestDevice::new("A")).await.unwrap();
    bus.attach_device(TestDevice::new("B")).await.unwrap();
    let (client, mut rx) = bus.connect_channel();

    bus.enumerate(client, &PropertyFilter::device("B")).await.unwrap();

    let mut devices = Vec::new();
    while let Ok(n) = rx.try_recv() {
        devices.push(n.device().to_string());
    }
    assert_eq!(devices.len(), 3);
    assert!(devices.iter().all(|d| d == "B"));
}

#[tokio::test]
async fn should_detach_all_in_reverse_attach_order() {
    let bus = bus();
    bus.attach_device(TestDevice::new("A")).await.unwrap();
    bus.attach_device(TestDevice::new("B")).await.unwrap();
    let (client, mut rx) = bus.connect_channel();
    bus.enumerate(client, &PropertyFilter::any()).await.unwrap();
    drain(&mut rx);

    bus.detach_all().await.unwrap();

    let mut order = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if order.last() != Some(&n.device().to_string()) {
            order.push(n.device().to_string());
        }
    }
    assert_eq!(order, ["B", "A"]);
    assert!(bus.device_names().is_empty());
}

#[tokio::test]
async fn should_reject_context_use_on_foreign_cell() {
    let (bus, device) = attached().await;
    let ctx = bus.context("Other");

    let result = ctx.update(&device.cell("VALUE"), None);

    assert!(matches!(result, Err(BusError::Precondition(_))));
}

#[tokio::test]
async fn should_mirror_notifications_to_monitor() {
    let bus = bus();
    let mut monitor = bus.monitor().subscribe();
    let (_client, _rx) = bus.connect_channel();

    bus.attach_device(TestDevice::new(DEVICE)).await.unwrap();

    let first = monitor.recv().await.unwrap();
    assert_eq!(first.kind, NotificationKind::Define);
    assert_eq!(first.device(), DEVICE);
}

#[tokio::test]
async fn should_save_and_load_through_context() {
    let (bus, device) = attached().await;
    let ctx = bus.context(DEVICE);
    let cell = device.cell("VALUE");
    cell.write(|p| p.item_mut("X").map(|item| item.set_number(42.0)));

    ctx.save(&cell).await.unwrap();
    cell.write(|p| p.item_mut("X").map(|item| item.set_number(1.0)));
    let loaded = ctx.load(&cell).await.unwrap();

    assert!(loaded);
    assert_eq!(cell.read(|p| p.number_value("X")), Some(42.0));
    assert!(!ctx.load(&device.cell("SLOW")).await.unwrap());
}
