//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PlatformEvent`]s and is
//! shared via `Arc<EventBus>`. It also serves as the default
//! [`ReindexSink`]: every stale item becomes one [`ITEM_REINDEX`] event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strata_core::services::ReindexSink;
use strata_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// A snapshot has been installed (made live) by the submission workflow.
pub const ITEM_INSTALLED: &str = "item.installed";

/// The search document of an item is stale.
pub const ITEM_REINDEX: &str = "item.reindex";

/// Source entity kind for item events.
pub const ITEM_ENTITY: &str = "item";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on the platform.
///
/// Constructed via [`PlatformEvent::new`] and enriched with the builder
/// methods [`with_source`](PlatformEvent::with_source),
/// [`with_actor`](PlatformEvent::with_actor), and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"item.installed"`.
    pub event_type: String,

    /// Optional source entity kind (e.g. `"item"`).
    pub source_entity_type: Option<String>,

    /// Optional source entity database id.
    pub source_entity_id: Option<DbId>,

    /// Optional id of the user that triggered the event.
    pub actor_user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// `item.installed` for the given item.
    pub fn item_installed(item_id: DbId) -> Self {
        Self::new(ITEM_INSTALLED).with_source(ITEM_ENTITY, item_id)
    }

    /// Attach a source entity to the event.
    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    /// Attach the acting user to the event.
    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// The source id when the source entity is an item.
    pub fn source_item(&self) -> Option<DbId> {
        match self.source_entity_type.as_deref() {
            Some(ITEM_ENTITY) => self.source_entity_id,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use strata_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::item_installed(42));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReindexSink for EventBus {
    fn reindex(&self, item_ids: &[DbId]) {
        for &item_id in item_ids {
            self.publish(PlatformEvent::new(ITEM_REINDEX).with_source(ITEM_ENTITY, item_id));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = PlatformEvent::item_installed(42)
            .with_actor(7)
            .with_payload(serde_json::json!({"collection": 3}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, ITEM_INSTALLED);
        assert_eq!(received.source_item(), Some(42));
        assert_eq!(received.actor_user_id, Some(7));
        assert_eq!(received.payload["collection"], 3);
    }

    #[tokio::test]
    async fn reindex_publishes_one_event_per_item() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.reindex(&[4, 9]);

        let first = rx.recv().await.expect("first reindex event");
        let second = rx.recv().await.expect("second reindex event");
        assert_eq!(first.event_type, ITEM_REINDEX);
        assert_eq!(first.source_item(), Some(4));
        assert_eq!(second.source_item(), Some(9));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn source_item_requires_item_entity() {
        let event = PlatformEvent::new("collection.created").with_source("collection", 5);
        assert_eq!(event.source_item(), None);
        assert!(PlatformEvent::new("bare.event").payload.is_object());
    }
}
