use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::{DayType, StateCode, VacancyPeriod};
use crate::error::{Result, ScheduleError};

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

/// Seed used when none is configured
pub const DEFAULT_RANDOM_SEED: u64 = 1;

/// Immutable per-run calendar and household configuration.
///
/// Timestep indices count from midnight on January 1st of `sim_year`; every
/// calendar lookup (month, weekday, time of day) is derived from the real
/// calendar of that year, so leap years and the weekday of January 1st are
/// always honored.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarContext {
    sim_year: i32,
    minutes_per_step: u32,
    state: StateCode,
    random_seed: u64,
    num_occupants: f64,
    vacancy: Option<VacancyPeriod>,
    start: NaiveDateTime,
    days_in_year: usize,
}

impl CalendarContext {
    /// Create a calendar for one simulated year.
    ///
    /// Fails fast on a timestep that does not divide an hour or a year
    /// outside the supported calendar range.
    pub fn new(sim_year: i32, minutes_per_step: u32, state: StateCode) -> Result<Self> {
        if minutes_per_step == 0 || MINUTES_PER_HOUR % minutes_per_step != 0 {
            return Err(ScheduleError::InvalidTimestep(minutes_per_step));
        }

        let start = NaiveDate::from_ymd_opt(sim_year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(ScheduleError::InvalidYear(sim_year))?;
        let next_year = NaiveDate::from_ymd_opt(sim_year + 1, 1, 1)
            .ok_or(ScheduleError::InvalidYear(sim_year))?;
        let days_in_year = (next_year - start.date()).num_days() as usize;

        Ok(Self {
            sim_year,
            minutes_per_step,
            state,
            random_seed: DEFAULT_RANDOM_SEED,
            num_occupants: 0.0,
            vacancy: None,
            start,
            days_in_year,
        })
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set the (possibly fractional) number of occupants
    pub fn with_occupants(mut self, num_occupants: f64) -> Result<Self> {
        if !num_occupants.is_finite() || num_occupants < 0.0 {
            return Err(ScheduleError::InvalidOccupants(num_occupants));
        }
        self.num_occupants = num_occupants;
        Ok(self)
    }

    pub fn with_vacancy(mut self, vacancy: Option<VacancyPeriod>) -> Self {
        self.vacancy = vacancy;
        self
    }

    pub fn sim_year(&self) -> i32 {
        self.sim_year
    }

    pub fn minutes_per_step(&self) -> u32 {
        self.minutes_per_step
    }

    pub fn state(&self) -> &StateCode {
        &self.state
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn num_occupants(&self) -> f64 {
        self.num_occupants
    }

    pub fn vacancy(&self) -> Option<&VacancyPeriod> {
        self.vacancy.as_ref()
    }

    pub fn is_leap_year(&self) -> bool {
        self.days_in_year == 366
    }

    pub fn steps_per_hour(&self) -> usize {
        (MINUTES_PER_HOUR / self.minutes_per_step) as usize
    }

    pub fn steps_per_day(&self) -> usize {
        (MINUTES_PER_DAY / self.minutes_per_step) as usize
    }

    pub fn days_in_year(&self) -> usize {
        self.days_in_year
    }

    /// Number of timesteps in the simulated year
    pub fn total_steps(&self) -> usize {
        self.steps_per_day() * self.days_in_year
    }

    /// Zero-based day of year containing `index`
    pub fn day_of(&self, index: usize) -> usize {
        index / self.steps_per_day()
    }

    pub fn index_in_day(&self, index: usize) -> usize {
        index % self.steps_per_day()
    }

    pub fn minute_of_day(&self, index: usize) -> u32 {
        self.index_in_day(index) as u32 * self.minutes_per_step
    }

    pub fn date_of_day(&self, day: usize) -> NaiveDate {
        self.start.date() + Duration::days(day as i64)
    }

    pub fn date_of(&self, index: usize) -> NaiveDate {
        self.date_of_day(self.day_of(index))
    }

    /// Calendar month (1-12) of the timestep
    pub fn month_of(&self, index: usize) -> u32 {
        self.date_of(index).month()
    }

    pub fn day_type(&self, index: usize) -> DayType {
        DayType::of(self.date_of(index))
    }

    /// Start time of the timestep
    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::minutes(index as i64 * self.minutes_per_step as i64)
    }

    /// Number of simulated occupant chains: whole occupants, rounding up
    pub fn chain_count(&self) -> usize {
        self.num_occupants.ceil() as usize
    }

    /// Factor mapping the sum over simulated chains onto the configured occupancy
    pub fn occupancy_ratio(&self) -> f64 {
        match self.chain_count() {
            0 => 0.0,
            chains => self.num_occupants / chains as f64,
        }
    }
}
