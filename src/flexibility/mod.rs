//! # Setpoint Flexibility
//!
//! Applies daily peak and pre-peak offsets to a baseline heating/cooling setpoint
//! series. Independent of schedule generation: it only shares the calendar and
//! the state code.
//!
//! ## Window
//!
//! For each day and setpoint kind the window is anchored at the state's
//! seasonal peak hour, moved by the configured shift and clamped to the day:
//!
//! ```text
//!  normal | pre-peak            | peak                | normal
//!         ^ peak_start - pre    ^ hour*sph + shift    ^ peak_start + duration
//! ```
//!
//! Heating is raised before the peak and lowered during it; cooling the reverse.

pub mod peak;
pub mod setpoint;

pub use peak::{
    DailyPeakIndices, OffsetType, PeakHourTable, PeakHours, PeakPhase, Season, SeasonalPeakHours,
    SetpointKind,
};
pub use setpoint::{
    FlexibilityDiagnostics, FlexibilityInputs, SetpointBounds, SetpointModifier, SetpointSeries, ShiftPolicy,
};
