//! Configuration vault – reads/writes `~/.scout/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use scout_runtime::PerceptionConfig;
use scout_types::ScoutError;
use serde::{Deserialize, Serialize};

/// Persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Timeouts, retries and thresholds of the perception steps.
    #[serde(default)]
    pub perception: PerceptionConfig,

    /// What the simulated perception modules report.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationConfig {
    /// Objects the simulated detector sees, in report order.
    #[serde(default = "default_objects")]
    pub objects: Vec<String>,

    /// Matching error the simulated cavity finder reports per object.
    /// Objects not listed never get a cavity.
    #[serde(default = "default_cavity_errors")]
    pub cavity_errors: Vec<CavityScript>,

    /// Status codes the simulated servo returns, one per call; the last one
    /// repeats.
    #[serde(default = "default_servo_codes")]
    pub servo_codes: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CavityScript {
    pub object: String,
    pub errors: Vec<f64>,
}

fn default_objects() -> Vec<String> {
    vec!["M20_100".to_string(), "F20_20_B".to_string(), "S40_40_B".to_string()]
}
fn default_cavity_errors() -> Vec<CavityScript> {
    vec![
        CavityScript {
            object: "M20_100".to_string(),
            errors: vec![0.04],
        },
        CavityScript {
            object: "F20_20_B".to_string(),
            errors: vec![0.03],
        },
        CavityScript {
            object: "S40_40_B".to_string(),
            errors: vec![0.25, 0.07],
        },
    ]
}
fn default_servo_codes() -> Vec<i32> {
    vec![-3, 0]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            objects: default_objects(),
            cavity_errors: default_cavity_errors(),
            servo_codes: default_servo_codes(),
        }
    }
}

/// Return the path to `~/.scout/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".scout").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ScoutError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ScoutError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ScoutError::Config(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| ScoutError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    cfg.perception.validate()?;
    Ok(Some(cfg))
}

/// Apply `SCOUT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SCOUT_POLL_INTERVAL_MS` | `perception.poll_interval_ms` |
/// | `SCOUT_FIND_OBJECTS_RETRIES` | `perception.find_objects_retries` |
/// | `SCOUT_FIND_OBJECTS_TIMEOUT_MS` | `perception.find_objects_timeout_ms` |
/// | `SCOUT_CAVITY_TIMEOUT_MS` | `perception.cavity_timeout_ms` |
/// | `SCOUT_MATCHING_THRESHOLD` | `perception.matching_threshold` |
/// | `SCOUT_TARGET_FRAME` | `perception.target_frame` (empty unsets it) |
/// | `SCOUT_TRANSFORM_WAIT_MS` | `perception.transform_wait_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let p = &mut cfg.perception;
    if let Some(v) = lookup("SCOUT_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse()
    {
        p.poll_interval_ms = ms;
    }
    if let Some(v) = lookup("SCOUT_FIND_OBJECTS_RETRIES")
        && let Ok(n) = v.parse()
    {
        p.find_objects_retries = n;
    }
    if let Some(v) = lookup("SCOUT_FIND_OBJECTS_TIMEOUT_MS")
        && let Ok(ms) = v.parse()
    {
        p.find_objects_timeout_ms = ms;
    }
    if let Some(v) = lookup("SCOUT_CAVITY_TIMEOUT_MS")
        && let Ok(ms) = v.parse()
    {
        p.cavity_timeout_ms = ms;
    }
    if let Some(v) = lookup("SCOUT_MATCHING_THRESHOLD")
        && let Ok(threshold) = v.parse()
    {
        p.matching_threshold = threshold;
    }
    if let Some(v) = lookup("SCOUT_TARGET_FRAME") {
        p.target_frame = if v.is_empty() { None } else { Some(v) };
    }
    if let Some(v) = lookup("SCOUT_TRANSFORM_WAIT_MS")
        && let Ok(ms) = v.parse()
    {
        p.transform_wait_ms = ms;
    }
}

/// Save the config to disk, creating `~/.scout/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ScoutError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ScoutError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScoutError::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| ScoutError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| ScoutError::Config(format!("failed to write {}: {e}", path.display())))
}

/// JSON schema of [`Config`], pretty-printed.
pub fn schema_json() -> Result<String, ScoutError> {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).map_err(|e| ScoutError::Config(format!("failed to render schema: {e}")))
}
