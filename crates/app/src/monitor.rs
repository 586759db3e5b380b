//! Notification monitor — an observer feed of everything the bus emits.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use propbus_domain::notification::Notification;

/// Broadcast tap receiving a copy of every notification, independent of
/// client interest.
///
/// Publishing succeeds even when there are no active subscribers
/// (the notification is simply dropped). Slow subscribers lose the oldest
/// entries instead of blocking the bus.
pub struct NotificationMonitor {
    sender: broadcast::Sender<Notification>,
}

impl NotificationMonitor {
    /// Create a monitor with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream, skipping over entries lost to lag.
    pub fn stream(&self) -> impl Stream<Item = Notification> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(Result::ok)
    }

    pub(crate) fn publish(&self, notification: Notification) {
        // Fails only with zero receivers.
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propbus_domain::notification::NotificationKind;
    use propbus_domain::property::Property;

    fn notification(kind: NotificationKind, name: &str) -> Notification {
        let property = Property::builder().device("d").name(name).build().unwrap();
        Notification::new(kind, property, None)
    }

    #[tokio::test]
    async fn should_deliver_notification_to_subscriber() {
        let monitor = NotificationMonitor::new(16);
        let mut rx = monitor.subscribe();

        monitor.publish(notification(NotificationKind::Define, "P"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::Define);
        assert_eq!(received.property_name(), "P");
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let monitor = NotificationMonitor::new(16);
        monitor.publish(notification(NotificationKind::Update, "P"));
    }

    #[tokio::test]
    async fn should_not_deliver_notifications_published_before_subscription() {
        let monitor = NotificationMonitor::new(16);
        monitor.publish(notification(NotificationKind::Define, "EARLY"));

        let mut rx = monitor.subscribe();
        monitor.publish(notification(NotificationKind::Define, "LATE"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.property_name(), "LATE");
    }

    #[tokio::test]
    async fn should_stream_notifications_in_order() {
        let monitor = NotificationMonitor::new(16);
        let mut stream = Box::pin(monitor.stream());

        monitor.publish(notification(NotificationKind::Define, "A"));
        monitor.publish(notification(NotificationKind::Delete, "A"));

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first.kind, NotificationKind::Define);
        assert_eq!(second.kind, NotificationKind::Delete);
    }
}
