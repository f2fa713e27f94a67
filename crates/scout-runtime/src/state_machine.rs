//! A minimal state machine that runs [`Step`]s end to end.
//!
//! Each state wraps one step and maps every outcome the step declares to a
//! [`Transition`]: either the next state, or a terminal outcome of the whole
//! machine.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use scout_runtime::state_machine::{StateMachine, Transition};
//! use scout_runtime::{Step, UserData};
//! use scout_types::ScoutError;
//!
//! struct Always(&'static str);
//!
//! #[async_trait]
//! impl Step for Always {
//!     fn name(&self) -> &str { "always" }
//!     fn outcomes(&self) -> &'static [&'static str] { &["ok"] }
//!     async fn execute(&self, _: &mut UserData) -> Result<&'static str, ScoutError> {
//!         Ok(self.0)
//!     }
//! }
//!
//! let mut sm = StateMachine::new();
//! sm.add_state("A", Always("ok"), [("ok", Transition::next("B"))]);
//! sm.add_state("B", Always("ok"), [("ok", Transition::terminal("done"))]);
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let outcome = rt.block_on(sm.run(&mut UserData::new())).unwrap();
//! assert_eq!(outcome, "done");
//! ```

use std::collections::HashMap;

use scout_types::ScoutError;
use tracing::{debug, info};

use crate::step::Step;
use crate::userdata::UserData;

/// Upper bound on state changes within one [`StateMachine::run`].
pub const DEFAULT_MAX_TRANSITIONS: usize = 1_000;

/// Where an outcome leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue with the named state.
    Next(String),
    /// Stop and report this outcome.
    Terminal(String),
}

impl Transition {
    pub fn next(state: impl Into<String>) -> Self {
        Transition::Next(state.into())
    }

    pub fn terminal(outcome: impl Into<String>) -> Self {
        Transition::Terminal(outcome.into())
    }
}

struct State {
    step: Box<dyn Step>,
    transitions: HashMap<String, Transition>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StateMachine
// ─────────────────────────────────────────────────────────────────────────────

/// Runs registered states starting from the first one added.
pub struct StateMachine {
    states: HashMap<String, State>,
    initial: Option<String>,
    max_transitions: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            initial: None,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    /// Cap the number of state changes a single run may make.
    pub fn with_max_transitions(mut self, max_transitions: usize) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    /// Register `step` under `name`.  The first state added is the initial
    /// state.  Re-adding a name replaces the earlier state.
    pub fn add_state<S, I, O>(&mut self, name: impl Into<String>, step: S, transitions: I) -> &mut Self
    where
        S: Step + 'static,
        I: IntoIterator<Item = (O, Transition)>,
        O: Into<String>,
    {
        let name = name.into();
        if self.initial.is_none() {
            self.initial = Some(name.clone());
        }
        let transitions = transitions.into_iter().map(|(o, t)| (o.into(), t)).collect();
        self.states.insert(
            name,
            State {
                step: Box::new(step),
                transitions,
            },
        );
        self
    }

    /// Check that every declared outcome has a transition, that every
    /// transition key is a declared outcome, and that every
    /// [`Transition::Next`] names a registered state.
    pub fn validate(&self) -> Result<(), ScoutError> {
        let Some(initial) = &self.initial else {
            return Err(ScoutError::Config("state machine has no states".to_string()));
        };
        if !self.states.contains_key(initial) {
            return Err(ScoutError::UnknownState(initial.clone()));
        }
        for (name, state) in &self.states {
            let declared = state.step.outcomes();
            for outcome in declared {
                if !state.transitions.contains_key(*outcome) {
                    return Err(ScoutError::Config(format!(
                        "state {name} has no transition for outcome '{outcome}'"
                    )));
                }
            }
            for (outcome, transition) in &state.transitions {
                if !declared.contains(&outcome.as_str()) {
                    return Err(ScoutError::UndeclaredOutcome {
                        step: state.step.name().to_string(),
                        outcome: outcome.clone(),
                    });
                }
                if let Transition::Next(next) = transition
                    && !self.states.contains_key(next)
                {
                    return Err(ScoutError::UnknownState(next.clone()));
                }
            }
        }
        Ok(())
    }

    /// Run from the initial state until a terminal transition is reached and
    /// return its outcome.
    pub async fn run(&self, userdata: &mut UserData) -> Result<String, ScoutError> {
        self.validate()?;
        let mut current = self.initial.clone().unwrap_or_default();
        let mut transitions = 0usize;

        loop {
            let state = self
                .states
                .get(&current)
                .ok_or_else(|| ScoutError::UnknownState(current.clone()))?;

            debug!(state = %current, step = state.step.name(), "entering state");
            let outcome = state.step.execute(userdata).await?;
            if !state.step.outcomes().contains(&outcome) {
                return Err(ScoutError::UndeclaredOutcome {
                    step: state.step.name().to_string(),
                    outcome: outcome.to_string(),
                });
            }
            info!(state = %current, outcome, "state finished");

            match state.transitions.get(outcome) {
                Some(Transition::Terminal(result)) => return Ok(result.clone()),
                Some(Transition::Next(next)) => {
                    transitions += 1;
                    if transitions > self.max_transitions {
                        return Err(ScoutError::TransitionLimit(self.max_transitions));
                    }
                    current = next.clone();
                }
                None => {
                    return Err(ScoutError::Config(format!(
                        "state {current} has no transition for outcome '{outcome}'"
                    )));
                }
            }
        }
    }
}
