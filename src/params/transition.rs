//! Markov transition tables
//!
//! A table holds, for one activity dimension, the probability of moving to each
//! next state given (month bucket, day type, time-of-day bin, current state).
//! Rows are stored as cumulative distributions so the stepper can draw the
//! next state with a single uniform sample.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Activity, DayType, MINUTES_PER_DAY};
use crate::error::{Result, ScheduleError};

/// Index into a table's state space
pub type StateId = usize;

/// Tolerance on row probability sums
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// One state of an activity's state space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    pub name: String,
    /// Value emitted while in this state and no event is running
    #[serde(default)]
    pub level: f64,
    /// Entering this state starts a resampled event
    #[serde(default)]
    pub triggers_event: bool,
    /// (presence) occupant is home and awake, so appliance events may start
    #[serde(default)]
    pub accepts_events: bool,
}

impl StateSpec {
    pub fn new(name: impl Into<String>, level: f64) -> Self {
        Self {
            name: name.into(),
            level,
            triggers_event: false,
            accepts_events: false,
        }
    }

    pub fn triggering(mut self) -> Self {
        self.triggers_event = true;
        self
    }

    pub fn accepting_events(mut self) -> Self {
        self.accepts_events = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub month_bucket: u8,
    pub day_type: DayType,
    pub bin: u16,
    pub state: StateId,
}

/// Result of a row lookup, including the documented fallbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowLookup<'a> {
    Exact(&'a [f64]),
    /// No row for the requested bin; nearest earlier bin for the same state
    PriorBin { bin: u16, cdf: &'a [f64] },
    /// No row at or before the bin: the chain keeps its state
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRowSpec {
    #[serde(default)]
    pub month_bucket: u8,
    pub day_type: DayType,
    pub bin: u16,
    pub from: String,
    pub to: Vec<f64>,
}

fn default_step_minutes() -> u32 {
    15
}

fn default_bin_minutes() -> u32 {
    60
}

/// Serialized form of a transition table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTableSpec {
    pub activity: Activity,
    pub states: Vec<StateSpec>,
    /// Step length the probabilities were estimated at
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
    /// Width of one time-of-day bin
    #[serde(default = "default_bin_minutes")]
    pub bin_minutes: u32,
    /// Month (index 0 = January) to month bucket
    #[serde(default)]
    pub month_buckets: [u8; 12],
    /// Initial state distribution; all mass on the first state when absent
    #[serde(default)]
    pub initial: Option<Vec<f64>>,
    pub rows: Vec<TransitionRowSpec>,
}

/// Validated, read-only transition table for one activity
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "TransitionTableSpec")]
pub struct TransitionTable {
    activity: Activity,
    states: Vec<StateSpec>,
    step_minutes: u32,
    bin_minutes: u32,
    month_buckets: [u8; 12],
    initial_cdf: Vec<f64>,
    rows: HashMap<RowKey, Vec<f64>>,
}

impl TransitionTable {
    pub fn builder(activity: Activity, states: Vec<StateSpec>) -> TransitionTableBuilder {
        TransitionTableBuilder {
            spec: TransitionTableSpec {
                activity,
                states,
                step_minutes: default_step_minutes(),
                bin_minutes: default_bin_minutes(),
                month_buckets: [0; 12],
                initial: None,
                rows: Vec::new(),
            },
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn states(&self) -> &[StateSpec] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> &StateSpec {
        &self.states[id]
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn bin_minutes(&self) -> u32 {
        self.bin_minutes
    }

    pub fn bins_per_day(&self) -> u16 {
        (MINUTES_PER_DAY / self.bin_minutes) as u16
    }

    pub fn bin_of(&self, minute_of_day: u32) -> u16 {
        ((minute_of_day % MINUTES_PER_DAY) / self.bin_minutes) as u16
    }

    /// Bucket for a calendar month (1-12)
    pub fn month_bucket(&self, month: u32) -> u8 {
        self.month_buckets[(month as usize - 1) % 12]
    }

    pub fn initial_cdf(&self) -> &[f64] {
        &self.initial_cdf
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn lookup(&self, key: RowKey) -> RowLookup<'_> {
        if let Some(cdf) = self.rows.get(&key) {
            return RowLookup::Exact(cdf);
        }
        (0..key.bin)
            .rev()
            .find_map(|bin| {
                self.rows
                    .get(&RowKey { bin, ..key })
                    .map(|cdf| RowLookup::PriorBin { bin, cdf })
            })
            .unwrap_or(RowLookup::Missing)
    }
}

/// Inverse-CDF draw: first state whose cumulative probability exceeds `u`
pub fn sample_cdf(cdf: &[f64], u: f64) -> StateId {
    cdf.iter()
        .position(|&c| u < c)
        .unwrap_or(cdf.len().saturating_sub(1))
}

fn cumulative(probabilities: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    let mut cdf: Vec<f64> = probabilities
        .iter()
        .map(|p| {
            total += p;
            total
        })
        .collect();
    // Absorb rounding so u < 1.0 always lands on a state
    if let Some(last) = cdf.last_mut() {
        *last = 1.0;
    }
    cdf
}

fn check_distribution(probabilities: &[f64], expected_len: usize) -> std::result::Result<(), String> {
    if probabilities.len() != expected_len {
        return Err(format!(
            "expected {} probabilities, got {}",
            expected_len,
            probabilities.len()
        ));
    }
    if let Some(p) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(format!("invalid probability {}", p));
    }
    let sum: f64 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(format!("probabilities sum to {}", sum));
    }
    Ok(())
}

impl TryFrom<TransitionTableSpec> for TransitionTable {
    type Error = ScheduleError;

    fn try_from(spec: TransitionTableSpec) -> Result<Self> {
        let activity = spec.activity;
        let table_error = |reason: String| ScheduleError::InvalidTransitionTable { activity, reason };

        if spec.states.is_empty() {
            return Err(table_error("empty state space".into()));
        }
        for (i, state) in spec.states.iter().enumerate() {
            if spec.states[..i].iter().any(|s| s.name == state.name) {
                return Err(table_error(format!("duplicate state {}", state.name)));
            }
        }
        for (label, minutes) in [("step", spec.step_minutes), ("bin", spec.bin_minutes)] {
            if minutes == 0 || MINUTES_PER_DAY % minutes != 0 {
                return Err(table_error(format!("{} of {} min does not divide a day", label, minutes)));
            }
        }

        let bins_per_day = MINUTES_PER_DAY / spec.bin_minutes;
        let n = spec.states.len();

        let initial_cdf = match &spec.initial {
            Some(initial) => {
                check_distribution(initial, n).map_err(|r| table_error(format!("initial: {}", r)))?;
                cumulative(initial)
            }
            None => vec![1.0; n],
        };

        let mut rows = HashMap::with_capacity(spec.rows.len());
        for row in &spec.rows {
            let row_error = |reason: String| ScheduleError::InvalidTransitionRow {
                activity,
                state: row.from.clone(),
                bin: row.bin,
                reason,
            };

            if u32::from(row.bin) >= bins_per_day {
                return Err(row_error(format!("bin beyond {} bins per day", bins_per_day)));
            }
            let state = spec
                .states
                .iter()
                .position(|s| s.name == row.from)
                .ok_or_else(|| row_error("unknown state".into()))?;
            check_distribution(&row.to, n).map_err(row_error)?;

            let key = RowKey {
                month_bucket: row.month_bucket,
                day_type: row.day_type,
                bin: row.bin,
                state,
            };
            if rows.insert(key, cumulative(&row.to)).is_some() {
                return Err(row_error(format!(
                    "duplicate row for bucket {} on {}",
                    row.month_bucket, row.day_type
                )));
            }
        }

        Ok(Self {
            activity,
            states: spec.states,
            step_minutes: spec.step_minutes,
            bin_minutes: spec.bin_minutes,
            month_buckets: spec.month_buckets,
            initial_cdf,
            rows,
        })
    }
}

/// Incremental construction of a validated table
#[derive(Debug, Clone)]
pub struct TransitionTableBuilder {
    spec: TransitionTableSpec,
}

impl TransitionTableBuilder {
    pub fn step_minutes(mut self, minutes: u32) -> Self {
        self.spec.step_minutes = minutes;
        self
    }

    pub fn bin_minutes(mut self, minutes: u32) -> Self {
        self.spec.bin_minutes = minutes;
        self
    }

    pub fn month_buckets(mut self, buckets: [u8; 12]) -> Self {
        self.spec.month_buckets = buckets;
        self
    }

    pub fn initial(mut self, probabilities: Vec<f64>) -> Self {
        self.spec.initial = Some(probabilities);
        self
    }

    pub fn row(mut self, day_type: DayType, bin: u16, from: &str, to: Vec<f64>) -> Self {
        self.spec.rows.push(TransitionRowSpec {
            month_bucket: 0,
            day_type,
            bin,
            from: from.to_string(),
            to,
        });
        self
    }

    pub fn bucket_row(
        mut self,
        month_bucket: u8,
        day_type: DayType,
        bin: u16,
        from: &str,
        to: Vec<f64>,
    ) -> Self {
        self.spec.rows.push(TransitionRowSpec {
            month_bucket,
            day_type,
            bin,
            from: from.to_string(),
            to,
        });
        self
    }

    pub fn build(self) -> Result<TransitionTable> {
        TransitionTable::try_from(self.spec)
    }
}
