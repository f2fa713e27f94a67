//! `FindObjects` – ask the object detector what is in view.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scout_middleware::{EventBus, Latch, LatchForwarder, TopicPublisher, lifecycle, spawn_latch, topics};
use scout_types::{DetectedObject, EventPayload, ScoutError};
use tracing::info;

use crate::config::PerceptionConfig;
use crate::cycle::{Detector, LatchedDetector, run_once};
use crate::deadline::{CycleOutcome, DEFAULT_POLL_INTERVAL};
use crate::retry::run_with_retries;
use crate::step::Step;
use crate::userdata::{UserData, slots};

pub const OBJECTS_FOUND: &str = "objects_found";
pub const NO_OBJECTS_FOUND: &str = "no_objects_found";

/// Runs the object detector up to `retries` times and stores the first
/// non-empty object list in [`slots::FOUND_OBJECTS`] as
/// `Option<Vec<DetectedObject>>`.
pub struct FindObjects<D> {
    detector: D,
    retries: NonZeroU32,
    timeout: Duration,
    poll_interval: Duration,
    _forwarders: Vec<LatchForwarder>,
}

impl<D> FindObjects<D>
where
    D: Detector<Output = Vec<DetectedObject>>,
{
    pub const DEFAULT_RETRIES: NonZeroU32 = match NonZeroU32::new(5) {
        Some(n) => n,
        None => panic!("retry count must be non-zero"),
    };
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(detector: D) -> Self {
        Self {
            detector,
            retries: Self::DEFAULT_RETRIES,
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            _forwarders: Vec::new(),
        }
    }

    pub fn with_retries(mut self, retries: NonZeroU32) -> Self {
        self.retries = retries;
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

    pub fn with_config(self, config: &PerceptionConfig) -> Result<Self, ScoutError> {
        Ok(self
            .with_retries(config.find_objects_retries()?)
            .with_timeout(config.find_objects_timeout())
            .with_poll_interval(config.poll_interval()))
    }
}

impl FindObjects<LatchedDetector<Vec<DetectedObject>>> {
    /// Bind to the object detector's topics on `bus`.
    ///
    /// Spawns the forwarding tasks, so it must be called from within a Tokio
    /// runtime.  They are stopped when the step is dropped.
    pub fn on_bus(bus: &EventBus, config: &PerceptionConfig) -> Result<Self, ScoutError> {
        let events = Latch::new();
        let objects = Latch::new();
        let forwarders = vec![
            spawn_latch(bus, topics::OBJECT_DETECTOR_EVENT_OUT, events.clone(), lifecycle),
            spawn_latch(bus, topics::OBJECT_LIST, objects.clone(), |payload| match payload {
                EventPayload::ObjectList(list) => Some(list),
                _ => None,
            }),
        ];
        let trigger = Arc::new(TopicPublisher::new(
            bus,
            topics::OBJECT_DETECTOR_EVENT_IN,
            "find_objects",
        ));
        let mut step = Self::new(LatchedDetector::new("object_detector", trigger, events, objects)).with_config(config)?;
        step._forwarders = forwarders;
        Ok(step)
    }
}

#[async_trait]
impl<D> Step for FindObjects<D>
where
    D: Detector<Output = Vec<DetectedObject>>,
{
    fn name(&self) -> &str {
        "find_objects"
    }

    fn outcomes(&self) -> &'static [&'static str] {
        &[OBJECTS_FOUND, NO_OBJECTS_FOUND]
    }

    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError> {
        userdata.insert::<Option<Vec<DetectedObject>>>(slots::FOUND_OBJECTS, None);

        let outcome = run_with_retries(self.retries, |_| {
            run_once(&self.detector, self.poll_interval, self.timeout)
        })
        .await;

        match outcome {
            CycleOutcome::Success(objects) if !objects.is_empty() => {
                let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
                info!(count = objects.len(), ?names, "found {} objects", objects.len());
                userdata.insert(slots::FOUND_OBJECTS, Some(objects));
                Ok(OBJECTS_FOUND)
            }
            _ => {
                info!("no objects in the field of view");
                Ok(NO_OBJECTS_FOUND)
            }
        }
    }
}
