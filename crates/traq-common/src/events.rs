//! In-process event bus.
//!
//! Every message is an [`Event`] variant whose name is its [`Topic`].
//! Subscribers pick the topics they care about and read them in publication
//! order from a bounded queue. Publishing never blocks: a subscriber that
//! falls more than `capacity` events behind loses the oldest ones.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;
use uuid::Uuid;

use crate::view_state::ViewState;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Topic names as they appear on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    SseConnected,
    SseDisconnected,
    WsConnected,
    WsDisconnected,
    UserOnline,
    UserOffline,
    ChannelViewersChanged,
}

impl Topic {
    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::SseConnected => "SSE_CONNECTED",
            Topic::SseDisconnected => "SSE_DISCONNECTED",
            Topic::WsConnected => "WS_CONNECTED",
            Topic::WsDisconnected => "WS_DISCONNECTED",
            Topic::UserOnline => "USER_ONLINE",
            Topic::UserOffline => "USER_OFFLINE",
            Topic::ChannelViewersChanged => "CHANNEL_VIEWERS_CHANGED",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "topic",
    content = "fields",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum Event {
    SseConnected {
        user_id: Uuid,
    },
    SseDisconnected {
        user_id: Uuid,
    },
    WsConnected {
        user_id: Uuid,
    },
    WsDisconnected {
        user_id: Uuid,
    },
    UserOnline {
        user_id: Uuid,
        datetime: DateTime<Utc>,
    },
    UserOffline {
        user_id: Uuid,
        datetime: DateTime<Utc>,
    },
    ChannelViewersChanged {
        channel_id: Uuid,
        viewers: HashMap<Uuid, ViewState>,
    },
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SseConnected { .. } => Topic::SseConnected,
            Event::SseDisconnected { .. } => Topic::SseDisconnected,
            Event::WsConnected { .. } => Topic::WsConnected,
            Event::WsDisconnected { .. } => Topic::WsDisconnected,
            Event::UserOnline { .. } => Topic::UserOnline,
            Event::UserOffline { .. } => Topic::UserOffline,
            Event::ChannelViewersChanged { .. } => Topic::ChannelViewersChanged,
        }
    }

    /// The payload as an untyped field map, for hosts that forward events
    /// by name (`"user_id"`, `"channel_id"`, ...).
    pub fn fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut envelope)) => match envelope.remove("fields") {
                Some(serde_json::Value::Object(fields)) => fields,
                _ => serde_json::Map::new(),
            },
            _ => serde_json::Map::new(),
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to the given topics only.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topics: Some(topics.iter().copied().collect()),
            skipped: 0,
        }
    }

    /// Subscribe to every topic.
    pub fn subscribe_all(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            topics: None,
            skipped: 0,
        }
    }

    /// Publish an event. Returns the number of subscribers it was queued for.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end of a bus subscription.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    topics: Option<HashSet<Topic>>,
    skipped: u64,
}

impl Subscription {
    pub fn accepts(&self, topic: Topic) -> bool {
        self.topics.as_ref().map_or(true, |t| t.contains(&topic))
    }

    /// Total events dropped because this subscriber fell behind. Counts
    /// every topic on the bus, since dropped events are never inspected.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Wait for the next accepted event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(event.topic()) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    self.skipped += skipped;
                    warn!(skipped, "Event subscriber lagged, oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next accepted event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(event.topic()) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    self.skipped += skipped;
                    warn!(skipped, "Event subscriber lagged, oldest events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
