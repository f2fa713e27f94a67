//! Outcome Classifier – status codes of synchronous calls.
//!
//! | Code | [`ServoOutcome`] | Outcome string |
//! |------|------------------|----------------|
//! | `0`  | `Succeeded`      | `"succeeded"`  |
//! | `-1` | `Failed`         | `"failed"`     |
//! | `-2` | `TimedOut`       | `"timeout"`    |
//! | `-3` | `TargetLost`     | `"lost_object"`|
//!
//! Any other code is a [`ScoutError::UnmappedStatusCode`]; it is never
//! folded into one of the named outcomes.

use scout_types::ScoutError;

/// Terminal result of a servoing-style command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoOutcome {
    Succeeded,
    Failed,
    TimedOut,
    TargetLost,
}

impl ServoOutcome {
    /// Every outcome, in declaration order.
    pub const ALL: [ServoOutcome; 4] = [
        ServoOutcome::Succeeded,
        ServoOutcome::Failed,
        ServoOutcome::TimedOut,
        ServoOutcome::TargetLost,
    ];

    /// The outcome string a step reports to the sequencer.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServoOutcome::Succeeded => "succeeded",
            ServoOutcome::Failed => "failed",
            ServoOutcome::TimedOut => "timeout",
            ServoOutcome::TargetLost => "lost_object",
        }
    }

    /// The status code the server uses for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            ServoOutcome::Succeeded => 0,
            ServoOutcome::Failed => -1,
            ServoOutcome::TimedOut => -2,
            ServoOutcome::TargetLost => -3,
        }
    }
}

/// Map the status `code` returned by `service` to a [`ServoOutcome`].
pub fn classify(service: &str, code: i32) -> Result<ServoOutcome, ScoutError> {
    ServoOutcome::ALL
        .into_iter()
        .find(|outcome| outcome.code() == code)
        .ok_or_else(|| ScoutError::UnmappedStatusCode {
            service: service.to_string(),
            code,
        })
}
