use thiserror::Error;

use crate::domain::Activity;

/// Errors raised while configuring or running the schedule generator
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Unsupported state code: {0}")]
    UnsupportedState(String),

    #[error("Invalid timestep: {0} minutes (must be a positive divisor of 60)")]
    InvalidTimestep(u32),

    #[error("Invalid simulation year: {0}")]
    InvalidYear(i32),

    #[error("Invalid number of occupants: {0}")]
    InvalidOccupants(f64),

    #[error("Malformed vacancy period \"{input}\": {reason}")]
    InvalidVacancyPeriod { input: String, reason: String },

    #[error("Invalid transition row for {activity} (state {state}, bin {bin}): {reason}")]
    InvalidTransitionRow {
        activity: Activity,
        state: String,
        bin: u16,
        reason: String,
    },

    #[error("Invalid transition table for {activity}: {reason}")]
    InvalidTransitionTable { activity: Activity, reason: String },

    #[error("Invalid event distribution for {activity}: {reason}")]
    InvalidEventDistribution { activity: Activity, reason: String },

    #[error("No transition table for activity {0}")]
    MissingTransitionTable(Activity),

    #[error("Table for {activity} has a native step of {native} min, incompatible with {step} min timesteps")]
    IncompatibleResolution {
        activity: Activity,
        native: u32,
        step: u32,
    },

    #[error("Series length mismatch for {name}: expected {expected}, got {actual}")]
    SeriesLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid flexibility inputs: {0}")]
    InvalidFlexibility(String),

    #[error("Parameter file error: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
