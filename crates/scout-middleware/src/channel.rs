//! Channel handles injected into perception steps.
//!
//! A step never opens topics itself.  It is handed already-bound handles at
//! construction time:
//!
//! - [`Trigger`] – fire-and-forget start signal.  [`TopicPublisher`] is the
//!   bus-backed implementation.
//! - [`Announcer`] – fire-and-forget text message, e.g. the name of the
//!   object a module should work on next.
//! - [`Latch`] – the receiving side.  [`spawn_latch`] binds a latch to a bus
//!   topic by forwarding every matching message into it from a background
//!   task, which lives as long as the returned [`LatchForwarder`].
//!
//! Tests swap in their own [`Trigger`] implementations and write latches
//! directly.

use scout_types::{Event, EventPayload, LifecycleEvent};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::latch::Latch;

/// A one-shot asynchronous start signal.
///
/// Firing never fails from the caller's point of view; delivery problems are
/// logged by the implementation and surface to the caller as a missing reply.
pub trait Trigger: Send + Sync {
    fn fire(&self);
}

/// Publishes a short text message, fire-and-forget like [`Trigger`].
pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

/// Publishes onto a single bus topic on behalf of `source`.
#[derive(Clone, Debug)]
pub struct TopicPublisher {
    bus: EventBus,
    topic: String,
    source: String,
}

impl TopicPublisher {
    pub fn new(bus: &EventBus, topic: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            bus: bus.clone(),
            topic: topic.into(),
            source: source.into(),
        }
    }

    /// Publish `payload`.  Returns `false` (after logging) when nobody was
    /// listening.
    pub fn send(&self, payload: EventPayload) -> bool {
        match self.bus.publish(&self.topic, Event::new(&self.source, payload)) {
            Ok(receivers) => {
                debug!(topic = %self.topic, receivers, "published");
                true
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "publish dropped");
                false
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Trigger for TopicPublisher {
    fn fire(&self) {
        self.send(EventPayload::Lifecycle(LifecycleEvent::Trigger));
    }
}

impl Announcer for TopicPublisher {
    fn announce(&self, text: &str) {
        self.send(EventPayload::Text(text.to_string()));
    }
}

/// Owns a [`spawn_latch`] task.  Dropping it aborts the task, which releases
/// its bus subscription.
#[derive(Debug)]
pub struct LatchForwarder {
    topic: String,
    task: JoinHandle<()>,
}

impl LatchForwarder {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for LatchForwarder {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "stopping latch forwarder");
        self.task.abort();
    }
}

/// Forward every message on `topic` that `extract` accepts into `latch`.
///
/// The subscription is taken before this function returns, so nothing
/// published afterwards is missed.  Forwarding stops when the returned
/// [`LatchForwarder`] or the bus is dropped.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_latch<T, F>(bus: &EventBus, topic: &str, latch: Latch<T>, extract: F) -> LatchForwarder
where
    T: Send + Sync + 'static,
    F: Fn(EventPayload) -> Option<T> + Send + 'static,
{
    let mut rx = bus.subscribe(topic);
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match extract(event.payload) {
                Some(value) => latch.write(value),
                None => debug!(topic = %rx.topic(), "ignoring unexpected payload"),
            }
        }
    });
    LatchForwarder {
        topic: topic.to_string(),
        task,
    }
}

/// Extractor for lifecycle topics.
pub fn lifecycle(payload: EventPayload) -> Option<LifecycleEvent> {
    match payload {
        EventPayload::Lifecycle(event) => Some(event),
        // Some modules publish their events as plain strings.
        EventPayload::Text(raw) => LifecycleEvent::parse(&raw),
        _ => None,
    }
}
