//! Event bus for late writer outcomes.
//!
//! Queued mutations return before they execute, so their failures cannot be
//! returned to the caller. The writer publishes them here instead, using
//! tokio::sync::broadcast so any number of observers can listen.

use tokio::sync::broadcast::{self, Receiver, Sender};

use super::Operation;

/// Something the writer did after the enqueueing call returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// A burst was committed and is now durable.
    BurstCommitted {
        /// Items executed in the burst, failed ones included
        items: usize,
    },
    /// One queued item failed to execute; the rest of its burst went on.
    OperationFailed {
        operation: Operation,
        key: Option<Vec<u8>>,
        error: String,
    },
    /// A burst could not be committed; none of its items are durable.
    CommitFailed { items: usize, error: String },
}

/// Broadcast bus carrying [`AdapterEvent`]s.
///
/// Older events are dropped for receivers that fall behind by more than the
/// bus capacity; the adapter's failure counter is never lossy.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<AdapterEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will receive all future events. Outside an
    /// async context use `try_recv` or `blocking_recv`.
    pub fn subscribe(&self) -> Receiver<AdapterEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers that got it.
    pub fn publish(&self, event: AdapterEvent) -> usize {
        // send() errs only when nobody listens, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let count = bus.publish(AdapterEvent::BurstCommitted { items: 3 });
        assert_eq!(count, 2);

        // Both receivers get it
        assert_eq!(rx1.recv().await.unwrap(), AdapterEvent::BurstCommitted { items: 3 });
        assert_eq!(rx2.recv().await.unwrap(), AdapterEvent::BurstCommitted { items: 3 });
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = EventBus::new(16);

        // No receivers - should not panic
        let count = bus.publish(AdapterEvent::CommitFailed {
            items: 1,
            error: "disk I/O error".into(),
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn test_try_recv_outside_runtime() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(AdapterEvent::OperationFailed {
            operation: Operation::Create,
            key: Some(b"k".to_vec()),
            error: "duplicate".into(),
        });
        assert!(matches!(
            rx.try_recv(),
            Ok(AdapterEvent::OperationFailed { operation: Operation::Create, .. })
        ));
        assert_eq!(bus.receiver_count(), 1);
    }
}
