//! Client port — where notifications for one subscriber are delivered.
//!
//! The wire transport that talks to remote clients implements
//! [`ClientSink`] and registers it with [`Bus::connect`](crate::bus::Bus::connect).

use propbus_domain::notification::Notification;
use tokio::sync::mpsc;

/// The receiving end of a client was dropped.
#[derive(Debug, thiserror::Error)]
#[error("client connection closed")]
pub struct DeliveryError;

/// Receives define/update/delete notifications for one client.
///
/// Delivery is called while the bus holds the property's fan-out lock, so
/// implementations must not block.
pub trait ClientSink: Send + Sync {
    /// Hand a notification to the client.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the client is gone.
    fn deliver(&self, notification: Notification) -> Result<(), DeliveryError>;
}

impl ClientSink for mpsc::UnboundedSender<Notification> {
    fn deliver(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.send(notification).map_err(|_| DeliveryError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propbus_domain::notification::NotificationKind;
    use propbus_domain::property::Property;

    fn notification() -> Notification {
        let property = Property::builder().device("d").name("p").build().unwrap();
        Notification::new(NotificationKind::Update, property, None)
    }

    #[tokio::test]
    async fn should_deliver_through_unbounded_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.deliver(notification()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::Update);
    }

    #[test]
    fn should_fail_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<Notification>();
        drop(rx);
        assert!(tx.deliver(notification()).is_err());
    }
}
