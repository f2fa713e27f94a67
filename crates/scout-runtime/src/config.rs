//! Tunables of the perception steps.
//!
//! [`PerceptionConfig`] is the `[perception]` table of `~/.scout/config.toml`.
//! Every field has a default, so an empty table (or no table at all) yields
//! the stock behavior.

use std::num::NonZeroU32;
use std::time::Duration;

use schemars::JsonSchema;
use scout_types::ScoutError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerceptionConfig {
    /// Spacing between two checks of a pending reply, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How many trigger-await cycles `FindObjects` runs before giving up.
    #[serde(default = "default_find_objects_retries")]
    pub find_objects_retries: u32,

    /// How long one object detection may take, in milliseconds.
    #[serde(default = "default_find_objects_timeout_ms")]
    pub find_objects_timeout_ms: u64,

    /// How long to wait for the cavity of a single object, in milliseconds.
    #[serde(default = "default_cavity_timeout_ms")]
    pub cavity_timeout_ms: u64,

    /// A new cavity is only accepted when its matching error is below this.
    #[serde(default = "default_matching_threshold")]
    pub matching_threshold: f64,

    /// Frame object and cavity poses are re-expressed in.  Unset disables
    /// the transformation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_frame: Option<String>,

    /// Maximum wait for a transform to become available, in milliseconds.
    #[serde(default = "default_transform_wait_ms")]
    pub transform_wait_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_find_objects_retries() -> u32 {
    5
}
fn default_find_objects_timeout_ms() -> u64 {
    10_000
}
fn default_cavity_timeout_ms() -> u64 {
    5_000
}
fn default_matching_threshold() -> f64 {
    0.1
}
fn default_transform_wait_ms() -> u64 {
    100
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            find_objects_retries: default_find_objects_retries(),
            find_objects_timeout_ms: default_find_objects_timeout_ms(),
            cavity_timeout_ms: default_cavity_timeout_ms(),
            matching_threshold: default_matching_threshold(),
            target_frame: None,
            transform_wait_ms: default_transform_wait_ms(),
        }
    }
}

impl PerceptionConfig {
    /// Reject values the steps cannot work with.
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.poll_interval_ms == 0 {
            return Err(ScoutError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.find_objects_retries == 0 {
            return Err(ScoutError::Config("find_objects_retries must be at least 1".to_string()));
        }
        if !self.matching_threshold.is_finite() || self.matching_threshold < 0.0 {
            return Err(ScoutError::Config(format!(
                "matching_threshold must be a non-negative number, got {}",
                self.matching_threshold
            )));
        }
        if let Some(frame) = &self.target_frame
            && frame.trim().is_empty()
        {
            return Err(ScoutError::Config("target_frame must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn find_objects_retries(&self) -> Result<NonZeroU32, ScoutError> {
        NonZeroU32::new(self.find_objects_retries)
            .ok_or_else(|| ScoutError::Config("find_objects_retries must be at least 1".to_string()))
    }

    pub fn find_objects_timeout(&self) -> Duration {
        Duration::from_millis(self.find_objects_timeout_ms)
    }

    pub fn cavity_timeout(&self) -> Duration {
        Duration::from_millis(self.cavity_timeout_ms)
    }

    pub fn transform_wait(&self) -> Duration {
        Duration::from_millis(self.transform_wait_ms)
    }
}
