use serde::{Deserialize, Serialize};

use super::Activity;
use crate::error::{Result, ScheduleError};

/// How a series reacts to a configured vacancy period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "away_value", rename_all = "snake_case")]
pub enum VacancyTreatment {
    /// Not occupant driven; left untouched during vacancy
    Unaffected,
    /// Replaced by the given away value for every vacant timestep
    Substitute(f64),
}

/// Normalization applied to an aggregated end-use series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Divide by the configured number of occupants
    OccupantFraction,
    /// Divide by the series maximum so the peak is 1.0
    Peak,
    /// Keep absolute magnitudes
    Absolute,
}

/// Output column contract: one column per configured end use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndUseSpec {
    pub name: String,
    pub activity: Activity,
    /// At most one occupant may use the fixture at a time
    #[serde(default)]
    pub shared: bool,
    pub normalization: Normalization,
    pub vacancy: VacancyTreatment,
}

impl EndUseSpec {
    pub fn new(name: impl Into<String>, activity: Activity) -> Self {
        Self {
            name: name.into(),
            activity,
            shared: false,
            normalization: Normalization::Peak,
            vacancy: VacancyTreatment::Substitute(0.0),
        }
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_vacancy(mut self, vacancy: VacancyTreatment) -> Self {
        self.vacancy = vacancy;
        self
    }
}

/// End uses written when the host does not configure its own list
pub fn default_end_uses() -> Vec<EndUseSpec> {
    vec![
        EndUseSpec::new("occupants", Activity::Presence)
            .with_normalization(Normalization::OccupantFraction),
        EndUseSpec::new("showers", Activity::Shower).shared(),
        EndUseSpec::new("baths", Activity::Bath).shared(),
        EndUseSpec::new("cooking_range", Activity::Cooking).shared(),
        EndUseSpec::new("dishwasher", Activity::Dishwasher).shared(),
        EndUseSpec::new("clothes_washer", Activity::ClothesWasher).shared(),
        EndUseSpec::new("clothes_dryer", Activity::ClothesDryer).shared(),
        // Standby loads persist while the dwelling is vacant
        EndUseSpec::new("plug_loads", Activity::PlugLoads).with_vacancy(VacancyTreatment::Unaffected),
    ]
}

/// Named annual series, one value per timestep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub vacancy: VacancyTreatment,
}

impl ScheduleSeries {
    pub fn new(name: impl Into<String>, values: Vec<f64>, vacancy: VacancyTreatment) -> Self {
        Self {
            name: name.into(),
            values,
            vacancy,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// Rescale so the maximum becomes 1.0; all-zero series stay zero
    pub fn normalize_to_peak(&mut self) {
        let peak = self.peak();
        if peak > 0.0 {
            self.scale(1.0 / peak);
        }
    }
}

/// Aligned set of series produced by one run
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTable {
    rows: usize,
    series: Vec<ScheduleSeries>,
}

impl ScheduleTable {
    /// Every series must have exactly `rows` entries
    pub fn new(rows: usize, series: Vec<ScheduleSeries>) -> Result<Self> {
        if let Some(bad) = series.iter().find(|s| s.len() != rows) {
            return Err(ScheduleError::SeriesLengthMismatch {
                name: bad.name.clone(),
                expected: rows,
                actual: bad.len(),
            });
        }
        Ok(Self { rows, series })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn series(&self) -> &[ScheduleSeries] {
        &self.series
    }

    pub fn series_mut(&mut self) -> &mut [ScheduleSeries] {
        &mut self.series
    }

    pub fn get(&self, name: &str) -> Option<&ScheduleSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }
}
