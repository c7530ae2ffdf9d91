//! Typed UI events and a synchronous publish/subscribe bus.
//!
//! Viewers publish an event whenever their time point, colormap range,
//! vertex selection or camera changes. Linked viewers subscribe and apply
//! the event to their own state with [`crate::Brain::handle_event`].

use serde::{Deserialize, Serialize};

use crate::view::{Hemisphere, ViewDescriptor};

/// `kind` of the colormap range a brain viewer publishes and follows
pub const SOURCE_POWER_KIND: &str = "distributed_source_power";

/// Something a viewer changed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    TimeChange {
        time: f64,
    },
    /// Limits of the colormap identified by `kind`
    ColormapRange {
        kind: String,
        fmin: f64,
        fmid: f64,
        fmax: f64,
        alpha: f64,
    },
    VertexSelect {
        hemi: Hemisphere,
        vertex: usize,
    },
    CameraMove {
        view: ViewDescriptor,
    },
    /// Playback rate in seconds of data per second of wall time
    PlaybackSpeed {
        speed: f64,
    },
}

/// Discriminant of [`UiEvent`], used to pick which events a subscriber receives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    TimeChange,
    ColormapRange,
    VertexSelect,
    CameraMove,
    PlaybackSpeed,
}

impl UiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UiEvent::TimeChange { .. } => EventKind::TimeChange,
            UiEvent::ColormapRange { .. } => EventKind::ColormapRange,
            UiEvent::VertexSelect { .. } => EventKind::VertexSelect,
            UiEvent::CameraMove { .. } => EventKind::CameraMove,
            UiEvent::PlaybackSpeed { .. } => EventKind::PlaybackSpeed,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type EventCallback = Box<dyn FnMut(&UiEvent)>;

struct Subscriber {
    id: SubscriptionId,
    /// `None` receives every event
    kind: Option<EventKind>,
    callback: EventCallback,
}

/// Single-threaded event dispatcher; callbacks run in subscription order
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive events of one kind
    pub fn subscribe(&mut self, kind: EventKind, callback: EventCallback) -> SubscriptionId {
        self.add(Some(kind), callback)
    }

    /// Receive every event
    pub fn subscribe_all(&mut self, callback: EventCallback) -> SubscriptionId {
        self.add(None, callback)
    }

    fn add(&mut self, kind: Option<EventKind>, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, kind, callback });
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn publish(&mut self, event: &UiEvent) {
        let kind = event.kind();
        log::debug!("Publishing {:?}", event);
        for subscriber in self.subscribers.iter_mut() {
            if subscriber.kind.map_or(true, |k| k == kind) {
                (subscriber.callback)(event);
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
