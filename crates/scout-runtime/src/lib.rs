//! `scout-runtime` – perception acquisition steps and the machinery they
//! share.
//!
//! Every step talks to an external perception module that answers
//! asynchronously, so the crate is built bottom-up from a few generic pieces:
//!
//! # Modules
//!
//! - [`deadline`] – [`poll_until`][deadline::poll_until]: bounded,
//!   non-busy waiting on the Tokio timer.
//! - [`cycle`] – [`run_once`][cycle::run_once]: one reset → trigger → await
//!   round trip against a [`Detector`][cycle::Detector].
//! - [`retry`] – [`run_with_retries`][retry::run_with_retries]: repeats a
//!   cycle until it yields a non-empty result.
//! - [`outcome`] – [`classify`][outcome::classify]: status codes of
//!   synchronous calls to named outcomes.
//! - [`userdata`] – [`UserData`]: the keyed slots steps exchange data through.
//! - [`step`] – the [`Step`] trait.
//! - [`steps`] – `FindObjects`, `TransformObjectPoses`, `DoVisualServoing`
//!   and `FindCavities`.
//! - [`state_machine`] – [`StateMachine`]: runs steps by following outcome
//!   transitions.
//! - [`config`] – [`PerceptionConfig`]: timeouts, retries and thresholds.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with an optional OTLP exporter.

pub mod config;
pub mod cycle;
pub mod deadline;
pub mod outcome;
pub mod retry;
pub mod state_machine;
pub mod step;
pub mod steps;
pub mod telemetry;
pub mod userdata;

pub use config::PerceptionConfig;
pub use cycle::{Detector, LatchedDetector, Payload, run_once};
pub use deadline::{CycleOutcome, Deadline, PollStatus, poll_until};
pub use outcome::{ServoOutcome, classify};
pub use retry::run_with_retries;
pub use state_machine::{StateMachine, Transition};
pub use step::Step;
pub use steps::{DoVisualServoing, FindCavities, FindObjects, TransformObjectPoses};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use userdata::{UserData, slots};
