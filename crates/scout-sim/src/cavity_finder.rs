//! Simulated cavity pipeline: template publisher, contour finder and cavity
//! message builder behind their three topics.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use scout_middleware::{EventBus, TopicPublisher, lifecycle, topics};
use scout_types::{Candidate, EventPayload, LifecycleEvent, Orientation, Point, Pose, StampedPose};
use tracing::{debug, warn};

use crate::SimHandle;

/// Answers a contour-finder trigger with a cavity for the most recently
/// announced object.
///
/// Each object has a queue of matching errors; one is consumed per trigger
/// and the last one repeats.  Objects without scores get no cavity.
pub struct SimCavityFinder {
    scores: HashMap<String, VecDeque<f64>>,
    latency: Duration,
}

impl Default for SimCavityFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCavityFinder {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
            latency: Duration::from_millis(200),
        }
    }

    /// Script the matching errors reported for `object`.
    pub fn with_scores(mut self, object: impl Into<String>, scores: impl IntoIterator<Item = f64>) -> Self {
        self.scores.insert(object.into(), scores.into_iter().collect());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn next_score(&mut self, object: &str) -> Option<f64> {
        let queue = self.scores.get_mut(object)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }

    /// Start serving on `bus`.  Must be called from within a Tokio runtime.
    pub fn spawn(mut self, bus: &EventBus) -> SimHandle {
        let mut names = bus.subscribe(topics::CAVITY_TEMPLATE_OBJECT);
        let mut events = bus.subscribe(topics::CONTOUR_FINDER_EVENT_IN);
        let cavities = TopicPublisher::new(bus, topics::CAVITY, "sim_cavity_finder");
        let triggers = Arc::new(AtomicU32::new(0));
        let counter = triggers.clone();

        let task = tokio::spawn(async move {
            let mut template: Option<String> = None;
            loop {
                // Announcements are handled before triggers published after them.
                tokio::select! {
                    biased;
                    Some(event) = names.recv() => {
                        if let EventPayload::Text(name) = event.payload {
                            debug!(object = %name, "template selected");
                            template = Some(name);
                        }
                    }
                    Some(event) = events.recv() => {
                        if lifecycle(event.payload) != Some(LifecycleEvent::Trigger) {
                            continue;
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        let Some(object) = template.clone() else {
                            warn!("contour finder triggered without a template");
                            continue;
                        };
                        let Some(score) = self.next_score(&object) else {
                            debug!(object = %object, "no cavity for object");
                            continue;
                        };
                        tokio::time::sleep(self.latency).await;
                        let pose = StampedPose::new(
                            "camera",
                            Pose::new(Point::new(0.4, 0.0, 0.05), Orientation::identity()),
                        );
                        cavities.send(EventPayload::Cavity(Candidate::new(object, pose, score)));
                    }
                    else => break,
                }
            }
        });
        SimHandle::new(task, triggers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_middleware::{Announcer, Trigger};

    #[test]
    fn scores_are_consumed_in_order_and_last_repeats() {
        let mut finder = SimCavityFinder::new().with_scores("A", [0.3, 0.05]);
        assert_eq!(finder.next_score("A"), Some(0.3));
        assert_eq!(finder.next_score("A"), Some(0.05));
        assert_eq!(finder.next_score("A"), Some(0.05));
        assert_eq!(finder.next_score("B"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn announced_object_gets_its_cavity() {
        let bus = EventBus::default();
        let mut out = bus.subscribe(topics::CAVITY);
        let sim = SimCavityFinder::new().with_scores("M20", [0.02]).spawn(&bus);

        TopicPublisher::new(&bus, topics::CAVITY_TEMPLATE_OBJECT, "test").announce("M20");
        // Let the announcement land before the trigger.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        TopicPublisher::new(&bus, topics::CONTOUR_FINDER_EVENT_IN, "test").fire();

        let event = out.recv().await.expect("cavity");
        match event.payload {
            EventPayload::Cavity(cavity) => {
                assert_eq!(cavity.subject, "M20");
                assert_eq!(cavity.score, 0.02);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(sim.triggers(), 1);
    }
}
