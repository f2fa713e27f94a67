use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A point in 3-D space (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A unit quaternion orientation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Orientation {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Position and orientation of something, without a reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Point, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// A [`Pose`] tagged with the frame it is expressed in and the time it was
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Name of the reference frame, e.g. `"camera_optical"` or `"base_link"`.
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub pose: Pose,
}

impl StampedPose {
    pub fn new(frame_id: impl Into<String>, pose: Pose) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: Utc::now(),
            pose,
        }
    }
}

/// An object reported by the object detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Object class / identity, e.g. `"M20_100"`.
    pub name: String,
    pub pose: StampedPose,
}

/// One proposed match produced by a perception module.
///
/// Candidates are keyed by `subject` and scored by `score`, where a lower
/// score is a better match (e.g. a template matching error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Identity of the thing this candidate describes, e.g. the object name a
    /// cavity was matched against.
    pub subject: String,
    pub pose: StampedPose,
    /// Non-negative error metric; lower is better.
    pub score: f64,
}

impl Candidate {
    pub fn new(subject: impl Into<String>, pose: StampedPose, score: f64) -> Self {
        Self {
            subject: subject.into(),
            pose,
            score,
        }
    }
}

/// Lifecycle signals exchanged with external perception modules on their
/// `event_in` / `event_out` topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Start one detection run.
    Trigger,
    /// The run finished and its result has been published.
    Done,
    /// The run finished without a usable result.
    Failed,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Trigger => "e_trigger",
            LifecycleEvent::Done => "e_done",
            LifecycleEvent::Failed => "e_failed",
        }
    }

    /// Parse the wire form used by the perception modules.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "e_trigger" => Some(LifecycleEvent::Trigger),
            "e_done" => Some(LifecycleEvent::Done),
            "e_failed" => Some(LifecycleEvent::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified message wrapper for the in-process transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "scout-runtime::find_objects"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that travel over perception topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    /// Free-form string, e.g. the object name sent to a template publisher.
    Text(String),
    ObjectList(Vec<DetectedObject>),
    Cavity(Candidate),
}

/// Error type shared by the perception steps and their collaborators.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoutError {
    #[error("Unmapped status code {code} returned by {service}")]
    UnmappedStatusCode { service: String, code: i32 },

    #[error("Service {service} unavailable: {details}")]
    ServiceUnavailable { service: String, details: String },

    #[error("Unable to transform {from_frame} -> {to_frame}: {details}")]
    Transform {
        from_frame: String,
        to_frame: String,
        details: String,
    },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Step {step} returned undeclared outcome '{outcome}'")]
    UndeclaredOutcome { step: String, outcome: String },

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("Transition limit of {0} exceeded")]
    TransitionLimit(usize),

    #[error("Missing user data slot: {0}")]
    MissingSlot(String),

    #[error("User data slot {0} holds a value of a different type")]
    SlotType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
