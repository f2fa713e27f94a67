//! The simulated pick-cavity mission run by `scout`.
//!
//! ```text
//! FIND_OBJECTS ─objects_found─▶ TRANSFORM ─▶ SELECT ─▶ FIND_CAVITIES ─succeeded─▶ SERVO ─succeeded─▶ done
//!      ▲                                                   │  ▲                       │
//!      │                                                   └──┘ not_all_cavities_found │
//!      └──────────────────────────── lost_object ──────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use scout_middleware::EventBus;
use scout_perception::{TfListener, Transform};
use scout_runtime::{
    DoVisualServoing, FindCavities, FindObjects, StateMachine, Step, TransformObjectPoses, Transition, UserData,
    slots,
};
use scout_sim::{ServoReply, SimCavityFinder, SimHandle, SimObjectDetector, SimServo};
use scout_types::{DetectedObject, Orientation, Point, Pose, ScoutError, StampedPose};
use tracing::info;

use crate::config::Config;

/// Terminal outcome of a successful mission.
pub const DONE: &str = "done";
/// Terminal outcome of a mission that gave up.
pub const FAILED: &str = "failed";

/// Frame the simulated camera reports poses in.
const CAMERA_FRAME: &str = "camera";

/// Copies every found object into `selected_objects`.
pub struct SelectObjects;

#[async_trait]
impl Step for SelectObjects {
    fn name(&self) -> &str {
        "select_objects"
    }

    fn outcomes(&self) -> &'static [&'static str] {
        &["selected", "nothing_selected"]
    }

    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError> {
        let objects = userdata
            .get::<Option<Vec<DetectedObject>>>(slots::FOUND_OBJECTS)?
            .clone()
            .unwrap_or_default();
        if objects.is_empty() {
            return Ok("nothing_selected");
        }
        info!(count = objects.len(), "selected objects for cavity matching");
        userdata.insert(slots::SELECTED_OBJECTS, objects);
        Ok("selected")
    }
}

/// The simulated modules; dropping this stops them.
pub struct Simulation {
    _detector: SimHandle,
    _cavity_finder: SimHandle,
    pub servo: Arc<SimServo>,
    pub transforms: Arc<TfListener>,
}

/// Start the simulated perception modules on `bus`.
pub fn simulate(bus: &EventBus, config: &Config) -> Simulation {
    let sim = &config.simulation;
    let objects = sim
        .objects
        .iter()
        .enumerate()
        .map(|(i, name)| DetectedObject {
            name: name.clone(),
            pose: StampedPose::new(
                CAMERA_FRAME,
                Pose::new(Point::new(0.3, 0.1 * i as f64, 0.0), Orientation::identity()),
            ),
        })
        .collect();
    let detector = SimObjectDetector::seeing(objects).spawn(bus);

    let cavity_finder = sim
        .cavity_errors
        .iter()
        .fold(SimCavityFinder::new(), |finder, script| {
            finder.with_scores(script.object.clone(), script.errors.iter().copied())
        })
        .spawn(bus);

    let servo = Arc::new(SimServo::new(sim.servo_codes.iter().map(|&code| ServoReply::Code(code))));

    let transforms = TfListener::new();
    transforms.set_transform(
        "base_link",
        CAMERA_FRAME,
        Transform::new(Point::new(0.25, 0.0, 0.6), Orientation::identity()),
    );

    Simulation {
        _detector: detector,
        _cavity_finder: cavity_finder,
        servo,
        transforms: Arc::new(transforms),
    }
}

/// Wire the perception steps into the mission state machine.
pub fn build(bus: &EventBus, config: &Config, sim: &Simulation) -> Result<StateMachine, ScoutError> {
    let perception = &config.perception;
    let mut sm = StateMachine::new();
    sm.add_state(
        "FIND_OBJECTS",
        FindObjects::on_bus(bus, perception)?,
        [
            ("objects_found", Transition::next("TRANSFORM")),
            ("no_objects_found", Transition::terminal(FAILED)),
        ],
    );
    sm.add_state(
        "TRANSFORM",
        TransformObjectPoses::from_config(sim.transforms.clone(), perception),
        [
            ("succeeded", Transition::next("SELECT")),
            ("no_frame_specified", Transition::next("SELECT")),
            ("tf_error", Transition::terminal(FAILED)),
        ],
    );
    sm.add_state(
        "SELECT",
        SelectObjects,
        [
            ("selected", Transition::next("FIND_CAVITIES")),
            ("nothing_selected", Transition::terminal(FAILED)),
        ],
    );
    sm.add_state(
        "FIND_CAVITIES",
        FindCavities::on_bus(bus, perception, sim.transforms.clone()),
        [
            ("succeeded", Transition::next("SERVO")),
            ("not_all_cavities_found", Transition::next("FIND_CAVITIES")),
            ("timeout", Transition::terminal(FAILED)),
        ],
    );
    sm.add_state(
        "SERVO",
        DoVisualServoing::new(sim.servo.clone()),
        [
            ("succeeded", Transition::terminal(DONE)),
            ("failed", Transition::terminal(FAILED)),
            ("timeout", Transition::terminal(FAILED)),
            ("lost_object", Transition::next("FIND_OBJECTS")),
        ],
    );
    sm.validate()?;
    Ok(sm)
}
