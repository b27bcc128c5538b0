//! # Stochastic Schedule Simulation
//!
//! Generates a year of residential occupancy and end-use schedules from the
//! empirical tables of a [`ParameterStore`](crate::params::ParameterStore).
//!
//! ## Components
//!
//! - **Chain**: per occupant, per activity Markov chain stepper
//! - **Resampler**: replaces raw Markov output with events of realistic length and level
//! - **Aggregator**: combines all chains into one series per end use, serializing shared fixtures
//! - **Vacancy**: substitutes away values over the configured vacancy period
//! - **Generator**: drives the components once per timestep
//!
//! ## Usage
//!
//! ```rust
//! use occupancy_schedules::domain::CalendarContext;
//! use occupancy_schedules::params::ParameterStore;
//! use occupancy_schedules::simulation::ScheduleGenerator;
//!
//! let store = ParameterStore::reference()?;
//! let ctx = CalendarContext::new(2023, 60, "CO".parse()?)?
//!     .with_occupants(2.0)?
//!     .with_random_seed(7);
//!
//! let generated = ScheduleGenerator::new(&ctx, store.for_state(ctx.state())).generate()?;
//! assert_eq!(generated.table.rows(), 8760);
//! # Ok::<(), occupancy_schedules::error::ScheduleError>(())
//! ```

pub mod aggregator;
pub mod chain;
pub mod generator;
pub mod resampler;
pub mod rng;
pub mod vacancy;

pub use aggregator::{AggregationDiagnostics, Aggregator, ChainStep};
pub use chain::{ActiveEvent, ChainId, MarkovStepper, OccupantChain, StepOutcome, StepperDiagnostics};
pub use generator::{GeneratedSchedules, GenerationDiagnostics, ScheduleGenerator};
pub use resampler::EventResampler;
pub use rng::{chain_rng, day_rng, splitmix64, stream_seed, ChainRng};
pub use vacancy::apply_vacancy;
