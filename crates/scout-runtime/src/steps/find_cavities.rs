//! `FindCavities` – match a cavity template for every selected object.
//!
//! For each object, strictly one after another:
//!
//! 1. clear the cavity latch,
//! 2. announce the object name to the template publisher,
//! 3. trigger the contour finder,
//! 4. wait for a cavity.
//!
//! Any object without a cavity in time aborts the step with `timeout`.  The
//! collected cavities are optionally re-expressed in a target frame, then
//! merged into [`slots::FOUND_CAVITIES`] (a [`ResultSet`]) keeping the best
//! match per object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scout_middleware::{Announcer, EventBus, Latch, LatchForwarder, TopicPublisher, Trigger, spawn_latch, topics};
use scout_perception::{Completeness, ResultSet, TransformService, merge};
use scout_types::{Candidate, DetectedObject, EventPayload, ScoutError};
use tracing::{debug, error, info};

use crate::config::PerceptionConfig;
use crate::cycle::{Detector, run_once};
use crate::deadline::{CycleOutcome, DEFAULT_POLL_INTERVAL};
use crate::step::Step;
use crate::userdata::{UserData, slots};

pub const SUCCEEDED: &str = "succeeded";
pub const NOT_ALL_CAVITIES_FOUND: &str = "not_all_cavities_found";
pub const TIMEOUT: &str = "timeout";

struct Target {
    frame: String,
    transforms: Arc<dyn TransformService>,
}

pub struct FindCavities {
    template: Arc<dyn Announcer>,
    trigger: Arc<dyn Trigger>,
    cavity: Latch<Candidate>,
    target: Option<Target>,
    matching_threshold: f64,
    timeout: Duration,
    poll_interval: Duration,
    transform_wait: Duration,
    _forwarder: Option<LatchForwarder>,
}

impl FindCavities {
    pub const DEFAULT_MATCHING_THRESHOLD: f64 = 0.1;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(template: Arc<dyn Announcer>, trigger: Arc<dyn Trigger>, cavity: Latch<Candidate>) -> Self {
        Self {
            template,
            trigger,
            cavity,
            target: None,
            matching_threshold: Self::DEFAULT_MATCHING_THRESHOLD,
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            transform_wait: Duration::from_millis(100),
            _forwarder: None,
        }
    }

    /// Bind to the template publisher, contour finder and cavity topics on
    /// `bus`.  Must be called from within a Tokio runtime.  The cavity
    /// subscription is released when the step is dropped.
    pub fn on_bus(
        bus: &EventBus,
        config: &PerceptionConfig,
        transforms: Arc<dyn TransformService>,
    ) -> Self {
        let cavity = Latch::new();
        let forwarder = spawn_latch(bus, topics::CAVITY, cavity.clone(), |payload| match payload {
            EventPayload::Cavity(candidate) => Some(candidate),
            _ => None,
        });
        let template = Arc::new(TopicPublisher::new(bus, topics::CAVITY_TEMPLATE_OBJECT, "find_cavities"));
        let trigger = Arc::new(TopicPublisher::new(bus, topics::CONTOUR_FINDER_EVENT_IN, "find_cavities"));
        let mut step = Self::new(template, trigger, cavity)
            .with_matching_threshold(config.matching_threshold)
            .with_timeout(config.cavity_timeout())
            .with_poll_interval(config.poll_interval())
            .with_transform_wait(config.transform_wait());
        step._forwarder = Some(forwarder);
        match &config.target_frame {
            Some(frame) => step.with_target_frame(frame.clone(), transforms),
            None => step,
        }
    }

    pub fn with_target_frame(mut self, frame: impl Into<String>, transforms: Arc<dyn TransformService>) -> Self {
        self.target = Some(Target {
            frame: frame.into(),
            transforms,
        });
        self
    }

    pub fn with_matching_threshold(mut self, threshold: f64) -> Self {
        self.matching_threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_transform_wait(mut self, transform_wait: Duration) -> Self {
        self.transform_wait = transform_wait;
        self
    }

    async fn to_target_frame(&self, cavities: &mut [Candidate]) {
        let Some(target) = &self.target else {
            return;
        };
        for cavity in cavities {
            match target
                .transforms
                .transform(&cavity.pose, &target.frame, self.transform_wait)
                .await
            {
                Ok(pose) => cavity.pose = pose,
                // The cavity is kept in the frame it arrived in.
                Err(e) => error!(
                    object = %cavity.subject,
                    error = %e,
                    "unable to transform {} -> {}",
                    cavity.pose.frame_id,
                    target.frame
                ),
            }
        }
    }
}

/// One cavity lookup for a single object.
struct CavityRequest<'a> {
    step: &'a FindCavities,
    object: &'a str,
}

impl Detector for CavityRequest<'_> {
    type Output = Candidate;

    fn name(&self) -> &str {
        "cavity_finder"
    }

    fn reset(&self) {
        self.step.cavity.reset();
    }

    fn trigger(&self) {
        self.step.template.announce(self.object);
        self.step.trigger.fire();
    }

    // The cavity builder has no event channel: a cavity is the answer.
    fn is_done(&self) -> bool {
        self.step.cavity.is_set()
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn result(&self) -> Option<Candidate> {
        self.step.cavity.read()
    }
}

#[async_trait]
impl Step for FindCavities {
    fn name(&self) -> &str {
        "find_cavities"
    }

    fn outcomes(&self) -> &'static [&'static str] {
        &[SUCCEEDED, NOT_ALL_CAVITIES_FOUND, TIMEOUT]
    }

    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError> {
        let selected = userdata.get::<Vec<DetectedObject>>(slots::SELECTED_OBJECTS)?.clone();

        let mut received = Vec::with_capacity(selected.len());
        for object in &selected {
            let request = CavityRequest {
                step: self,
                object: &object.name,
            };
            match run_once(&request, self.poll_interval, self.timeout).await {
                CycleOutcome::Success(mut cavity) => {
                    info!(
                        object = %object.name,
                        matching_error = cavity.score,
                        "received cavity for {}, matching error: {:.5}",
                        object.name,
                        cavity.score
                    );
                    cavity.subject = object.name.clone();
                    received.push(cavity);
                }
                CycleOutcome::Failed | CycleOutcome::TimedOut => {
                    error!(
                        object = %object.name,
                        "timeout of {:.1} seconds exceeded for finding cavity",
                        self.timeout.as_secs_f64()
                    );
                    return Ok(TIMEOUT);
                }
            }
        }

        self.to_target_frame(&mut received).await;

        let found = userdata.get_or_default::<ResultSet>(slots::FOUND_CAVITIES)?;
        merge(found, received, self.matching_threshold);
        match found.completeness(selected.len()) {
            Completeness::Complete => Ok(SUCCEEDED),
            Completeness::Incomplete { found, required } => {
                debug!(found, required, "cavity set incomplete");
                Ok(NOT_ALL_CAVITIES_FOUND)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_perception::{TfListener, Transform};
    use scout_types::{Orientation, Point, Pose, StampedPose};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Contour finder stand-in: answers a trigger with the scripted score for
    /// the most recently announced object, or stays silent.
    struct FakeFinder {
        announced: Mutex<Vec<String>>,
        triggers: Mutex<u32>,
        scores: HashMap<&'static str, f64>,
        cavity: Latch<Candidate>,
    }

    impl FakeFinder {
        fn new(cavity: Latch<Candidate>, scores: &[(&'static str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                announced: Mutex::new(Vec::new()),
                triggers: Mutex::new(0),
                scores: scores.iter().copied().collect(),
                cavity,
            })
        }

        fn announced(&self) -> Vec<String> {
            self.announced.lock().unwrap().clone()
        }
    }

    impl Announcer for FakeFinder {
        fn announce(&self, text: &str) {
            self.announced.lock().unwrap().push(text.to_string());
        }
    }

    impl Trigger for FakeFinder {
        fn fire(&self) {
            *self.triggers.lock().unwrap() += 1;
            let last = self.announced.lock().unwrap().last().cloned();
            if let Some(name) = last
                && let Some(score) = self.scores.get(name.as_str())
            {
                // The template publisher does not echo the object name.
                let pose = StampedPose::new("camera", Pose::new(Point::new(0.1, 0.0, 0.0), Orientation::identity()));
                self.cavity.write(Candidate::new("template", pose, *score));
            }
        }
    }

    fn object(name: &str) -> DetectedObject {
        DetectedObject {
            name: name.to_string(),
            pose: StampedPose::new("camera", Pose::default()),
        }
    }

    fn step_with(scores: &[(&'static str, f64)]) -> (FindCavities, Arc<FakeFinder>) {
        let cavity = Latch::new();
        let finder = FakeFinder::new(cavity.clone(), scores);
        (FindCavities::new(finder.clone(), finder.clone(), cavity), finder)
    }

    fn selecting(names: &[&str]) -> UserData {
        let mut ud = UserData::new();
        ud.insert(slots::SELECTED_OBJECTS, names.iter().map(|n| object(n)).collect::<Vec<_>>());
        ud
    }

    fn cavities(ud: &UserData) -> &ResultSet {
        ud.get::<ResultSet>(slots::FOUND_CAVITIES).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn all_cavities_found() {
        let (step, finder) = step_with(&[("A", 0.05), ("B", 0.02)]);
        let mut ud = selecting(&["A", "B"]);

        assert_eq!(step.execute(&mut ud).await.unwrap(), SUCCEEDED);
        assert_eq!(finder.announced(), vec!["A", "B"]);
        let set = cavities(&ud);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("A").unwrap().score, 0.05);
        assert_eq!(set.get("B").unwrap().score, 0.02);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_object_times_out_immediately() {
        let (step, finder) = step_with(&[("A", 0.05), ("C", 0.01)]);
        let mut ud = selecting(&["A", "B", "C"]);
        let started = Instant::now();

        assert_eq!(step.execute(&mut ud).await.unwrap(), TIMEOUT);
        // C is never requested and nothing is merged.
        assert_eq!(finder.announced(), vec!["A", "B"]);
        assert!(!ud.contains(slots::FOUND_CAVITIES));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "gave up early: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(5) + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn poor_match_leaves_set_incomplete() {
        let (step, _) = step_with(&[("A", 0.05), ("B", 0.3)]);
        let mut ud = selecting(&["A", "B"]);

        assert_eq!(step.execute(&mut ud).await.unwrap(), NOT_ALL_CAVITIES_FOUND);
        let set = cavities(&ud);
        assert_eq!(set.len(), 1);
        assert!(set.get("B").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn better_match_replaces_earlier_cavity() {
        let (step, _) = step_with(&[("A", 0.02)]);
        let mut ud = selecting(&["A"]);
        let stale = Candidate::new("A", StampedPose::new("camera", Pose::default()), 0.08);
        let mut previous = ResultSet::new();
        merge(&mut previous, [stale], 0.1);
        ud.insert(slots::FOUND_CAVITIES, previous);

        assert_eq!(step.execute(&mut ud).await.unwrap(), SUCCEEDED);
        assert_eq!(cavities(&ud).get("A").unwrap().score, 0.02);
    }

    #[tokio::test(start_paused = true)]
    async fn cavities_are_tagged_with_the_object_name() {
        let (step, _) = step_with(&[("M20_100", 0.01)]);
        let mut ud = selecting(&["M20_100"]);

        step.execute(&mut ud).await.unwrap();
        let set = cavities(&ud);
        assert_eq!(set.as_slice()[0].subject, "M20_100");
        assert!(set.get("template").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cavities_are_moved_into_the_target_frame() {
        let tf = TfListener::new();
        tf.set_transform("base_link", "camera", Transform::new(Point::new(1.0, 0.0, 0.0), Orientation::identity()));
        let (step, _) = step_with(&[("A", 0.01)]);
        let step = step.with_target_frame("base_link", Arc::new(tf));
        let mut ud = selecting(&["A"]);

        assert_eq!(step.execute(&mut ud).await.unwrap(), SUCCEEDED);
        let pose = &cavities(&ud).get("A").unwrap().pose;
        assert_eq!(pose.frame_id, "base_link");
        assert!((pose.pose.position.x - 1.1).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_transform_keeps_original_frame() {
        let (step, _) = step_with(&[("A", 0.01)]);
        let step = step.with_target_frame("odom", Arc::new(TfListener::new()));
        let mut ud = selecting(&["A"]);

        assert_eq!(step.execute(&mut ud).await.unwrap(), SUCCEEDED);
        assert_eq!(cavities(&ud).get("A").unwrap().pose.frame_id, "camera");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_selection_is_an_error() {
        let (step, _) = step_with(&[]);
        assert_eq!(
            step.execute(&mut UserData::new()).await,
            Err(ScoutError::MissingSlot(slots::SELECTED_OBJECTS.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_cavity_from_previous_object_is_not_reused() {
        let (step, finder) = step_with(&[("A", 0.05)]);
        let mut ud = selecting(&["A", "B"]);

        // A's cavity is still in the latch when B is requested.
        assert_eq!(step.execute(&mut ud).await.unwrap(), TIMEOUT);
        assert_eq!(*finder.triggers.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn dropping_the_step_releases_the_cavity_subscription() {
        let bus = EventBus::default();
        let step = FindCavities::on_bus(&bus, &PerceptionConfig::default(), Arc::new(TfListener::new()));
        assert_eq!(bus.subscriber_count(topics::CAVITY), 1);

        drop(step);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.subscriber_count(topics::CAVITY), 0);
    }
}
