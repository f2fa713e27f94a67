//! Headless, topic-named publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Topics are created lazily the first time they are published
//! to or subscribed on.
//!
//! # Well-known topics
//!
//! The perception modules the steps talk to live on the names in
//! [`topics`].  Nothing prevents callers from using other names.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use scout_types::{Event, ScoutError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Topic names used by the perception modules.
pub mod topics {
    /// Lifecycle events into the object detector.
    pub const OBJECT_DETECTOR_EVENT_IN: &str = "perception/object_detector/event_in";
    /// Lifecycle events out of the object detector.
    pub const OBJECT_DETECTOR_EVENT_OUT: &str = "perception/object_detector/event_out";
    /// Object lists published by the object detector.
    pub const OBJECT_LIST: &str = "perception/object_detector/object_list";
    /// Lifecycle events into the contour finder.
    pub const CONTOUR_FINDER_EVENT_IN: &str = "perception/contour_finder/event_in";
    /// Object name the cavity template publisher should load.
    pub const CAVITY_TEMPLATE_OBJECT: &str = "perception/cavity_template_publisher/object_name";
    /// Matched cavities.
    pub const CAVITY: &str = "perception/cavity_message_builder/cavity";
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    capacity: usize,
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
}

impl EventBus {
    /// Create a new bus with the given per-topic channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`ScoutError::Channel`] when nobody is listening on the topic.
    pub fn publish(&self, topic: &str, event: Event) -> Result<usize, ScoutError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| ScoutError::Channel(format!("no subscribers for topic {topic}")))
    }

    /// Subscribe to every event published on `topic` from now on.
    pub fn subscribe(&self, topic: &str) -> TopicReceiver {
        TopicReceiver {
            topic: topic.to_string(),
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels.get(topic).map_or(0, |s| s.receiver_count())
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Event> {
        {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(sender) = channels.get(topic) {
                return sender.clone();
            }
        }
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single topic.
///
/// Obtained via [`EventBus::subscribe`].
pub struct TopicReceiver {
    topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Lagging is logged and skipped.  Returns `None` once the bus has been
    /// dropped and no further events will arrive.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The topic this receiver is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
