//! `DoVisualServoing` – run the visual servoing controller once.

use std::sync::Arc;

use async_trait::async_trait;
use scout_middleware::StatusService;
use scout_types::ScoutError;
use tracing::{error, info};

use crate::outcome::{ServoOutcome, classify};
use crate::step::Step;
use crate::userdata::{UserData, slots};

/// Calls the servoing service and maps its status code to an outcome.
///
/// Resets the [`slots::VS_COUNT`] counter (`u32`) to zero when the service is
/// unreachable and on success; other outcomes leave it untouched.
pub struct DoVisualServoing {
    service: Arc<dyn StatusService>,
}

impl DoVisualServoing {
    pub fn new(service: Arc<dyn StatusService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Step for DoVisualServoing {
    fn name(&self) -> &str {
        "do_visual_servoing"
    }

    fn outcomes(&self) -> &'static [&'static str] {
        &["succeeded", "failed", "timeout", "lost_object"]
    }

    async fn execute(&self, userdata: &mut UserData) -> Result<&'static str, ScoutError> {
        info!(service = self.service.name(), "calling service");
        let code = match self.service.call().await {
            Ok(code) => code,
            Err(e) => {
                userdata.insert(slots::VS_COUNT, 0u32);
                error!(service = self.service.name(), error = %e, "exception when calling service");
                return Ok(ServoOutcome::Failed.as_str());
            }
        };

        let outcome = classify(self.service.name(), code)?;
        if outcome == ServoOutcome::Succeeded {
            userdata.insert(slots::VS_COUNT, 0u32);
        }
        info!(service = self.service.name(), code, outcome = outcome.as_str(), "servoing finished");
        Ok(outcome.as_str())
    }
}
