//! # Empirical Parameter Store
//!
//! Holds, per state, the Markov transition tables and event distributions that
//! drive the schedule generator. Tables are validated on load and read-only
//! afterwards; every occupant chain of a run shares them.
//!
//! States without their own parameter set fall back to the store's reference
//! state. The fallback is logged, never silent.

pub mod distribution;
pub mod reference;
pub mod transition;

pub use distribution::{minutes_to_steps, EventDistribution, EventDistributionSpec, EventDraw, FollowOn};
pub use transition::{
    sample_cdf, RowKey, RowLookup, StateId, StateSpec, TransitionTable, TransitionTableBuilder,
    TransitionTableSpec,
};

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{Activity, StateCode};
use crate::error::{Result, ScheduleError};

/// Read access to the empirical tables of one parameter set
pub trait TransitionTableProvider {
    fn transition_table(&self, activity: Activity) -> Option<&TransitionTable>;
    fn event_distribution(&self, activity: Activity) -> Option<&EventDistribution>;
}

/// Tables and distributions for one state
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "StateParametersFile")]
pub struct StateParameters {
    tables: HashMap<Activity, TransitionTable>,
    events: HashMap<Activity, EventDistribution>,
}

#[derive(Debug, Deserialize)]
struct StateParametersFile {
    #[serde(default)]
    transitions: Vec<TransitionTable>,
    #[serde(default)]
    events: Vec<EventDistribution>,
}

impl StateParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TransitionTable) -> Result<Self> {
        let activity = table.activity();
        if self.tables.insert(activity, table).is_some() {
            return Err(ScheduleError::InvalidTransitionTable {
                activity,
                reason: "duplicate table".into(),
            });
        }
        Ok(self)
    }

    pub fn with_events(mut self, distribution: EventDistribution) -> Result<Self> {
        let activity = distribution.activity();
        if self.events.insert(activity, distribution).is_some() {
            return Err(ScheduleError::InvalidEventDistribution {
                activity,
                reason: "duplicate distribution".into(),
            });
        }
        Ok(self)
    }

    pub fn activities(&self) -> impl Iterator<Item = Activity> + '_ {
        self.tables.keys().copied()
    }
}

impl TryFrom<StateParametersFile> for StateParameters {
    type Error = ScheduleError;

    fn try_from(file: StateParametersFile) -> Result<Self> {
        let params = file
            .transitions
            .into_iter()
            .try_fold(StateParameters::new(), StateParameters::with_table)?;
        file.events
            .into_iter()
            .try_fold(params, StateParameters::with_events)
    }
}

impl TransitionTableProvider for StateParameters {
    fn transition_table(&self, activity: Activity) -> Option<&TransitionTable> {
        self.tables.get(&activity)
    }

    fn event_distribution(&self, activity: Activity) -> Option<&EventDistribution> {
        self.events.get(&activity)
    }
}

#[derive(Debug, Deserialize)]
struct ParameterStoreFile {
    default_state: StateCode,
    states: HashMap<StateCode, StateParameters>,
}

/// Per-state parameter sets with a reference fallback
#[derive(Debug, Clone)]
pub struct ParameterStore {
    default_state: StateCode,
    states: HashMap<StateCode, StateParameters>,
}

impl ParameterStore {
    pub fn new(default_state: StateCode, default_parameters: StateParameters) -> Self {
        let mut states = HashMap::new();
        states.insert(default_state.clone(), default_parameters);
        Self {
            default_state,
            states,
        }
    }

    /// Built-in reference parameter set
    pub fn reference() -> Result<Self> {
        reference::reference_store()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ParameterStoreFile = serde_json::from_str(json)?;
        if !file.states.contains_key(&file.default_state) {
            return Err(ScheduleError::UnsupportedState(format!(
                "{} (default state has no parameters)",
                file.default_state
            )));
        }
        Ok(Self {
            default_state: file.default_state,
            states: file.states,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&json)?;
        info!(path = %path.display(), states = store.states.len(), "loaded parameter store");
        Ok(store)
    }

    pub fn insert(&mut self, state: StateCode, parameters: StateParameters) {
        self.states.insert(state, parameters);
    }

    pub fn default_state(&self) -> &StateCode {
        &self.default_state
    }

    pub fn has_state(&self, state: &StateCode) -> bool {
        self.states.contains_key(state)
    }

    /// Parameters for `state`, or the reference state's when it has none
    pub fn for_state(&self, state: &StateCode) -> &StateParameters {
        if let Some(params) = self.states.get(state) {
            return params;
        }
        warn!(
            state = %state,
            fallback = %self.default_state,
            "no parameters for state, using reference state"
        );
        &self.states[&self.default_state]
    }
}
