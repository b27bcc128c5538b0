//! Peak / pre-peak setpoint offsets

use chrono::Datelike;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::peak::{DailyPeakIndices, OffsetType, PeakHourTable, PeakPhase, Season, SeasonalPeakHours, SetpointKind};
use crate::domain::{CalendarContext, DayType};
use crate::error::{Result, ScheduleError};
use crate::simulation::rng::{day_rng, SHIFT_JITTER_STREAM};

/// How the daily window shift is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShiftPolicy {
    /// `random_shift_steps` on every day
    #[default]
    Fixed,
    /// `random_shift_steps` plus a seeded per-day draw in `[-max_steps, max_steps]`
    DailyJitter { max_steps: u32 },
}

/// Safe setpoint range, in the units of the baseline series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointBounds {
    pub heating_min: f64,
    pub heating_max: f64,
    pub cooling_min: f64,
    pub cooling_max: f64,
}

impl Default for SetpointBounds {
    fn default() -> Self {
        Self {
            heating_min: 55.0,
            heating_max: 80.0,
            cooling_min: 60.0,
            cooling_max: 90.0,
        }
    }
}

impl SetpointBounds {
    pub fn range(&self, kind: SetpointKind) -> (f64, f64) {
        match kind {
            SetpointKind::Heating => (self.heating_min, self.heating_max),
            SetpointKind::Cooling => (self.cooling_min, self.cooling_max),
        }
    }

    /// Clamped value and whether clamping changed it
    pub fn clamp(&self, kind: SetpointKind, value: f64) -> (f64, bool) {
        let (min, max) = self.range(kind);
        let clamped = value.clamp(min, max);
        (clamped, clamped != value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexibilityInputs {
    pub peak_duration_steps: usize,
    /// Heating lowered / cooling raised by this much during the peak
    pub peak_offset: f64,
    pub pre_peak_duration_steps: usize,
    /// Heating raised / cooling lowered by this much before the peak
    pub pre_peak_offset: f64,
    /// Shifts the whole window; negative moves it earlier
    pub random_shift_steps: i64,
    pub offset_type: OffsetType,
    pub shift_policy: ShiftPolicy,
    pub apply_on_weekends: bool,
    pub bounds: SetpointBounds,
}

impl Default for FlexibilityInputs {
    fn default() -> Self {
        Self {
            peak_duration_steps: 16,
            peak_offset: 4.0,
            pre_peak_duration_steps: 0,
            pre_peak_offset: 0.0,
            random_shift_steps: 0,
            offset_type: OffsetType::Shed,
            shift_policy: ShiftPolicy::Fixed,
            apply_on_weekends: true,
            bounds: SetpointBounds::default(),
        }
    }
}

impl FlexibilityInputs {
    pub fn validate(&self, ctx: &CalendarContext) -> Result<()> {
        let steps_per_day = ctx.steps_per_day();
        if self.peak_duration_steps > steps_per_day || self.pre_peak_duration_steps > steps_per_day {
            return Err(ScheduleError::InvalidFlexibility(format!(
                "window durations must not exceed {} steps per day",
                steps_per_day
            )));
        }
        let max_shift = match self.shift_policy {
            ShiftPolicy::Fixed => self.random_shift_steps.unsigned_abs(),
            ShiftPolicy::DailyJitter { max_steps } => self.random_shift_steps.unsigned_abs() + max_steps as u64,
        };
        if max_shift > steps_per_day as u64 {
            return Err(ScheduleError::InvalidFlexibility(format!(
                "window shift of up to {} steps exceeds {} steps per day",
                max_shift, steps_per_day
            )));
        }
        if !self.peak_offset.is_finite() || !self.pre_peak_offset.is_finite() {
            return Err(ScheduleError::InvalidFlexibility("offsets must be finite".into()));
        }
        for kind in [SetpointKind::Heating, SetpointKind::Cooling] {
            let (min, max) = self.bounds.range(kind);
            if min.is_nan() || max.is_nan() || min > max {
                return Err(ScheduleError::InvalidFlexibility(format!(
                    "{} bounds [{}, {}] are empty",
                    kind, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Heating and cooling setpoints, one value per timestep each
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetpointSeries {
    pub heating: Vec<f64>,
    pub cooling: Vec<f64>,
}

impl SetpointSeries {
    pub fn new(heating: Vec<f64>, cooling: Vec<f64>) -> Self {
        Self { heating, cooling }
    }

    pub fn flat(len: usize, heating: f64, cooling: f64) -> Self {
        Self::new(vec![heating; len], vec![cooling; len])
    }

    pub fn len(&self) -> usize {
        self.heating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heating.is_empty()
    }

    fn values_mut(&mut self, kind: SetpointKind) -> &mut [f64] {
        match kind {
            SetpointKind::Heating => &mut self.heating,
            SetpointKind::Cooling => &mut self.cooling,
        }
    }

    fn check_len(&self, expected: usize) -> Result<()> {
        for (name, values) in [("heating_setpoint", &self.heating), ("cooling_setpoint", &self.cooling)] {
            if values.len() != expected {
                return Err(ScheduleError::SeriesLengthMismatch {
                    name: name.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlexibilityDiagnostics {
    pub days_modified: usize,
    pub weekend_days_skipped: usize,
    pub windows_clamped: usize,
    pub pre_peak_steps: usize,
    pub peak_steps: usize,
    pub heating_clamped: usize,
    pub cooling_clamped: usize,
}

/// Applies daily peak / pre-peak offsets to a baseline setpoint series
#[derive(Debug)]
pub struct SetpointModifier<'a> {
    ctx: &'a CalendarContext,
    inputs: FlexibilityInputs,
    hours: SeasonalPeakHours,
}

impl<'a> SetpointModifier<'a> {
    pub fn new(ctx: &'a CalendarContext, inputs: FlexibilityInputs, peak_hours: &PeakHourTable) -> Result<Self> {
        inputs.validate(ctx)?;
        Ok(Self {
            ctx,
            inputs,
            hours: peak_hours.lookup(ctx.state()),
        })
    }

    pub fn inputs(&self) -> &FlexibilityInputs {
        &self.inputs
    }

    /// Window shift for a zero-based day of the year
    pub fn daily_shift(&self, day: usize) -> i64 {
        match self.inputs.shift_policy {
            ShiftPolicy::Fixed => self.inputs.random_shift_steps,
            ShiftPolicy::DailyJitter { max_steps } => {
                let max = max_steps as i64;
                let jitter = day_rng(self.ctx.random_seed(), day, SHIFT_JITTER_STREAM).gen_range(-max..=max);
                self.inputs.random_shift_steps.saturating_add(jitter)
            }
        }
    }

    pub fn peak_indices(&self, day: usize, kind: SetpointKind) -> DailyPeakIndices {
        let hour = self.hours.for_kind(kind).hour(self.inputs.offset_type);
        DailyPeakIndices::compute(
            hour,
            self.ctx.steps_per_hour(),
            self.ctx.steps_per_day(),
            self.inputs.peak_duration_steps,
            self.inputs.pre_peak_duration_steps,
            self.daily_shift(day),
        )
    }

    fn offset(&self, kind: SetpointKind, phase: PeakPhase) -> f64 {
        match (kind, phase) {
            (_, PeakPhase::Normal) => 0.0,
            (SetpointKind::Heating, PeakPhase::PrePeak) => self.inputs.pre_peak_offset,
            (SetpointKind::Heating, PeakPhase::Peak) => -self.inputs.peak_offset,
            (SetpointKind::Cooling, PeakPhase::PrePeak) => -self.inputs.pre_peak_offset,
            (SetpointKind::Cooling, PeakPhase::Peak) => self.inputs.peak_offset,
        }
    }

    /// Offset the baseline inside each window and clamp the offset values to the bounds
    pub fn apply(&self, baseline: &SetpointSeries) -> Result<(SetpointSeries, FlexibilityDiagnostics)> {
        let ctx = self.ctx;
        baseline.check_len(ctx.total_steps())?;

        let steps_per_day = ctx.steps_per_day();
        let mut output = baseline.clone();
        let mut diagnostics = FlexibilityDiagnostics::default();

        for day in 0..ctx.days_in_year() {
            let date = ctx.date_of_day(day);
            if !self.inputs.apply_on_weekends && DayType::of(date) == DayType::Weekend {
                diagnostics.weekend_days_skipped += 1;
                continue;
            }

            let season = Season::of_month(date.month());
            let day_start = day * steps_per_day;
            for kind in [SetpointKind::Heating, SetpointKind::Cooling] {
                if !season.applies_to(kind) {
                    continue;
                }
                let indices = self.peak_indices(day, kind);
                if indices.clamped {
                    diagnostics.windows_clamped += 1;
                    debug!(%date, %kind, ?indices, "peak window clamped to the day");
                }
                diagnostics.pre_peak_steps += indices.peak_start - indices.pre_peak_start;
                diagnostics.peak_steps += indices.peak_end - indices.peak_start;

                // Only offset values are clamped; normal steps keep the baseline
                let values = &mut output.values_mut(kind)[day_start..day_start + steps_per_day];
                let mut clamped = 0;
                for (i, value) in values.iter_mut().enumerate() {
                    let phase = indices.phase(i);
                    if phase == PeakPhase::Normal {
                        continue;
                    }
                    let (offset, changed) = self.inputs.bounds.clamp(kind, *value + self.offset(kind, phase));
                    *value = offset;
                    clamped += changed as usize;
                }
                match kind {
                    SetpointKind::Heating => diagnostics.heating_clamped += clamped,
                    SetpointKind::Cooling => diagnostics.cooling_clamped += clamped,
                }
            }
            diagnostics.days_modified += 1;
        }

        info!(
            state = %ctx.state(),
            offset_type = %self.inputs.offset_type,
            days = diagnostics.days_modified,
            windows_clamped = diagnostics.windows_clamped,
            heating_clamped = diagnostics.heating_clamped,
            cooling_clamped = diagnostics.cooling_clamped,
            "applied setpoint flexibility"
        );
        Ok((output, diagnostics))
    }
}
