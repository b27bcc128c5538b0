//! Stochastic residential occupancy and end-use schedules.
//!
//! - [`params`]: empirical Markov transition tables and event distributions
//! - [`simulation`]: per-occupant chains, event resampling, aggregation and vacancy
//! - [`flexibility`]: peak / pre-peak setpoint offsets
//! - [`export`]: CSV output and baseline setpoint input

pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod flexibility;
pub mod params;
pub mod simulation;
pub mod telemetry;

pub use error::{Result, ScheduleError};
