//! Graph change notifications
//!
//! Observers register per [`EventCategory`] (or for everything) and are
//! called after the corresponding change has been applied. Events are also
//! fanned out on a broadcast channel for async consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use graph_model::{BendRef, FullId, Point3, Quaternion};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Reachability of the remote authority as seen by the inbound loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    #[default]
    Connected,
    Disconnected,
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    VertexAdded { id: FullId, position: Point3 },
    VertexMoved { id: FullId, position: Point3 },
    VertexRotated { id: FullId, rotation: Quaternion },
    VertexRescaled { id: FullId, scale: f64 },
    VertexRemoved { id: FullId },
    VertexPropertyChanged {
        id: FullId,
        list: String,
        key: String,
        value: String,
        render_update: bool,
    },
    EdgeAdded { id: FullId, start: FullId, end: FullId },
    EdgeRemoved { id: FullId },
    EdgePropertyChanged {
        id: FullId,
        list: String,
        key: String,
        value: String,
        render_update: bool,
    },
    BendAdded { bend: BendRef, position: Point3 },
    BendMoved { bend: BendRef, position: Point3 },
    BendRemoved { bend: BendRef },
    CameraChanged { position: Point3, rotation: Quaternion },
    /// A batch of changes has been applied
    GraphChanged,
    /// History replay finished (fired once)
    GraphLoaded,
    NetworkStatusChanged(NetworkStatus),
}

impl GraphEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::VertexAdded { .. } => EventCategory::VertexAdded,
            Self::VertexMoved { .. } => EventCategory::VertexMoved,
            Self::VertexRotated { .. } => EventCategory::VertexRotated,
            Self::VertexRescaled { .. } => EventCategory::VertexRescaled,
            Self::VertexRemoved { .. } => EventCategory::VertexRemoved,
            Self::VertexPropertyChanged { .. } => EventCategory::VertexPropertyChanged,
            Self::EdgeAdded { .. } => EventCategory::EdgeAdded,
            Self::EdgeRemoved { .. } => EventCategory::EdgeRemoved,
            Self::EdgePropertyChanged { .. } => EventCategory::EdgePropertyChanged,
            Self::BendAdded { .. } => EventCategory::BendAdded,
            Self::BendMoved { .. } => EventCategory::BendMoved,
            Self::BendRemoved { .. } => EventCategory::BendRemoved,
            Self::CameraChanged { .. } => EventCategory::CameraChanged,
            Self::GraphChanged => EventCategory::GraphChanged,
            Self::GraphLoaded => EventCategory::GraphLoaded,
            Self::NetworkStatusChanged(_) => EventCategory::NetworkStatusChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    VertexAdded,
    VertexMoved,
    VertexRotated,
    VertexRescaled,
    VertexRemoved,
    VertexPropertyChanged,
    EdgeAdded,
    EdgeRemoved,
    EdgePropertyChanged,
    BendAdded,
    BendMoved,
    BendRemoved,
    CameraChanged,
    GraphChanged,
    GraphLoaded,
    NetworkStatusChanged,
}

/// Handle returned by [`GraphObservers::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    /// `None` matches every category
    category: Option<EventCategory>,
    handler: Handler,
}

/// Observer registry
pub struct GraphObservers {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
    event_tx: broadcast::Sender<GraphEvent>,
}

impl GraphObservers {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    /// Subscribe to one category
    pub fn on<F>(&self, category: EventCategory, handler: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.register(Some(category), Arc::new(handler))
    }

    /// Subscribe to every event
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Receive every event on a channel
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.event_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to matching handlers, then to channel subscribers
    pub fn emit(&self, event: GraphEvent) {
        let category = event.category();
        // handlers may (un)subscribe, so call them outside the lock
        let handlers: Vec<Handler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.category.is_none_or(|c| c == category))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(&event);
        }
        let _ = self.event_tx.send(event);
    }

    fn register(&self, category: Option<EventCategory>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            category,
            handler,
        });
        id
    }
}

impl Default for GraphObservers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphObservers")
            .field("subscriptions", &self.len())
            .finish()
    }
}
