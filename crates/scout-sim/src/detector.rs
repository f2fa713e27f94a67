//! Simulated object detector.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use scout_middleware::{EventBus, TopicPublisher, lifecycle, topics};
use scout_types::{DetectedObject, EventPayload, LifecycleEvent};
use tracing::{debug, info};

use crate::SimHandle;

/// How the detector answers one trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorReply {
    /// Publish the object list, then `e_done`.
    Objects(Vec<DetectedObject>),
    /// Publish `e_failed`.
    Fail,
    /// Publish nothing.
    Silent,
}

/// Answers `e_trigger` on the detector's `event_in` topic with scripted
/// replies.  Replies are consumed in order; the last one repeats.
pub struct SimObjectDetector {
    script: VecDeque<DetectorReply>,
    latency: Duration,
}

impl SimObjectDetector {
    pub fn new(script: impl IntoIterator<Item = DetectorReply>) -> Self {
        Self {
            script: script.into_iter().collect(),
            latency: Duration::from_millis(300),
        }
    }

    /// Always answer with `objects`.
    pub fn seeing(objects: Vec<DetectedObject>) -> Self {
        Self::new([DetectorReply::Objects(objects)])
    }

    /// Delay between a trigger and its reply.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn next_reply(&mut self) -> DetectorReply {
        if self.script.len() > 1 {
            self.script.pop_front().unwrap_or(DetectorReply::Silent)
        } else {
            self.script.front().cloned().unwrap_or(DetectorReply::Silent)
        }
    }

    /// Start serving on `bus`.  Must be called from within a Tokio runtime.
    pub fn spawn(mut self, bus: &EventBus) -> SimHandle {
        let mut rx = bus.subscribe(topics::OBJECT_DETECTOR_EVENT_IN);
        let events = TopicPublisher::new(bus, topics::OBJECT_DETECTOR_EVENT_OUT, "sim_object_detector");
        let lists = TopicPublisher::new(bus, topics::OBJECT_LIST, "sim_object_detector");
        let triggers = Arc::new(AtomicU32::new(0));
        let counter = triggers.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if lifecycle(event.payload) != Some(LifecycleEvent::Trigger) {
                    continue;
                }
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let reply = self.next_reply();
                debug!(trigger = n, ?reply, "object detector triggered");
                tokio::time::sleep(self.latency).await;
                match reply {
                    DetectorReply::Objects(objects) => {
                        info!(count = objects.len(), "sim detector publishing objects");
                        lists.send(EventPayload::ObjectList(objects));
                        events.send(EventPayload::Lifecycle(LifecycleEvent::Done));
                    }
                    DetectorReply::Fail => {
                        events.send(EventPayload::Lifecycle(LifecycleEvent::Failed));
                    }
                    DetectorReply::Silent => {}
                }
            }
        });
        SimHandle::new(task, triggers)
    }
}
