//! `TransformObjectPoses` – re-express found objects in a target frame.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scout_perception::TransformService;
use scout_types::{DetectedObject, ScoutError};
use tracing::{debug, error};

use crate::config::PerceptionConfig;
use crate::step::Step;
use crate::userdata::{UserData, slots};

pub const SUCCEEDED: &str = "succeeded";
pub const NO_FRAME_SPECIFIED: &str = "no_frame_specified";
pub const TF_ERROR: &str = "tf_error";

pub struct TransformObjectPoses {
    transforms: Arc<dyn TransformService>,
    target_frame: Option<String>,
    max_wait: Duration,
}

impl TransformObjectPoses {
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(100);

    pub fn new(transforms: Arc<dyn TransformService>, target_frame: Option<String>) -> Self {
        Self {
            transforms,
            target_frame,
            max_wait: Self::DEFAULT_MAX_WAIT,
        }
    }

    pub fn from_config(transforms: Arc<dyn TransformService>, config: &PerceptionConfig) -> Self {
        Self::new(transforms, config.target_frame.clone()).with_max_wait(config.transform_wait())
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

#[async_trait]
impl Step for TransformObjectPoses {
    fn name(&self) -> &str {
        "transform_object_poses"
    }

    fn outcomes(&self) -> &'static [&'static str] {
        &[SUCCEEDED, NO_FRAME_SPECIFIED, TF_ERROR]
    }

    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError> {
        let Some(target_frame) = self.target_frame.as_deref() else {
            return Ok(NO_FRAME_SPECIFIED);
        };
        let objects = userdata
            .get_mut::<Option<Vec<DetectedObject>>>(slots::FOUND_OBJECTS)?
            .as_mut()
            .ok_or_else(|| ScoutError::MissingSlot(slots::FOUND_OBJECTS.to_string()))?;

        // Objects transformed before a failure keep their new pose.
        for object in objects.iter_mut() {
            match self.transforms.transform(&object.pose, target_frame, self.max_wait).await {
                Ok(pose) => {
                    debug!(object = %object.name, from = %object.pose.frame_id, to = target_frame, "transformed");
                    object.pose = pose;
                }
                Err(e) => {
                    error!(
                        object = %object.name,
                        error = %e,
                        "unable to transform {} -> {}",
                        object.pose.frame_id,
                        target_frame
                    );
                    return Ok(TF_ERROR);
                }
            }
        }
        Ok(SUCCEEDED)
    }
}
