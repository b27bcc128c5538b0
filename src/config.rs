use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::{default_end_uses, CalendarContext, EndUseSpec, StateCode, VacancyPeriod, DEFAULT_RANDOM_SEED};
use crate::flexibility::FlexibilityInputs;
use crate::params::ParameterStore;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "SCHEDGEN__";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub parameters: ParametersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Replaces the built-in end-use list when present
    #[serde(default)]
    pub end_uses: Option<Vec<EndUseSpec>>,
    #[serde(default)]
    pub flexibility: Option<FlexibilityConfig>,
}

fn default_seed() -> u64 {
    DEFAULT_RANDOM_SEED
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub state: String,
    pub sim_year: i32,
    pub minutes_per_step: u32,
    pub num_occupants: f64,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    /// "<Month> <Day> - <Month> <Day>"
    #[serde(default)]
    pub vacancy_period: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParametersConfig {
    /// JSON parameter store; the built-in reference set when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("schedules.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlexibilityConfig {
    pub baseline_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub inputs: FlexibilityInputs,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// TOML file overlaid with `SCHEDGEN__`-prefixed environment variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(figment.extract()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Ok(Figment::new().merge(Toml::string(toml)).extract()?)
    }

    pub fn calendar_context(&self) -> Result<CalendarContext> {
        let c = &self.calendar;
        let state: StateCode = c.state.parse()?;
        let vacancy = c
            .vacancy_period
            .as_deref()
            .map(str::parse::<VacancyPeriod>)
            .transpose()?;
        let ctx = CalendarContext::new(c.sim_year, c.minutes_per_step, state)?
            .with_random_seed(c.random_seed)
            .with_occupants(c.num_occupants)?
            .with_vacancy(vacancy);
        Ok(ctx)
    }

    pub fn parameter_store(&self) -> Result<ParameterStore> {
        match &self.parameters.path {
            Some(path) => ParameterStore::from_path(path)
                .with_context(|| format!("loading parameters from {}", path.display())),
            None => Ok(ParameterStore::reference()?),
        }
    }

    pub fn end_uses(&self) -> Vec<EndUseSpec> {
        self.end_uses.clone().unwrap_or_else(default_end_uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, Normalization, VacancyTreatment};
    use crate::flexibility::{OffsetType, ShiftPolicy};

    const MINIMAL: &str = r#"
        [calendar]
        state = "co"
        sim_year = 2024
        minutes_per_step = 15
        num_occupants = 2.5
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        let ctx = config.calendar_context().unwrap();
        assert_eq!(ctx.state().as_str(), "CO");
        assert_eq!(ctx.random_seed(), DEFAULT_RANDOM_SEED);
        assert_eq!(ctx.total_steps(), 35136);
        assert!(ctx.vacancy().is_none());
        assert_eq!(config.output.path, PathBuf::from("schedules.csv"));
        assert_eq!(config.end_uses(), default_end_uses());
        assert!(config.flexibility.is_none());
        assert!(config.parameter_store().is_ok());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
            [calendar]
            state = "TX"
            sim_year = 2023
            minutes_per_step = 60
            num_occupants = 3
            random_seed = 42
            vacancy_period = "Dec 20 - Jan 5"

            [output]
            path = "out/schedules.csv"

            [[end_uses]]
            name = "occupants"
            activity = "presence"
            normalization = "occupant_fraction"
            vacancy = { kind = "substitute", away_value = 0.0 }

            [[end_uses]]
            name = "showers"
            activity = "shower"
            shared = true
            normalization = "absolute"
            vacancy = { kind = "unaffected" }

            [flexibility]
            baseline_path = "baseline.csv"
            output_path = "flex.csv"

            [flexibility.inputs]
            pre_peak_duration_steps = 4
            pre_peak_offset = 3.0
            offset_type = "shift"
            apply_on_weekends = false
            shift_policy = { kind = "daily_jitter", max_steps = 2 }
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let ctx = config.calendar_context().unwrap();
        assert_eq!(ctx.random_seed(), 42);
        assert_eq!(ctx.vacancy().map(|v| v.to_string()).as_deref(), Some("Dec 20 - Jan 5"));

        let uses = config.end_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].normalization, Normalization::OccupantFraction);
        assert_eq!(uses[1].activity, Activity::Shower);
        assert_eq!(uses[1].vacancy, VacancyTreatment::Unaffected);

        let flex = config.flexibility.unwrap();
        assert_eq!(flex.inputs.offset_type, OffsetType::Shift);
        assert_eq!(flex.inputs.shift_policy, ShiftPolicy::DailyJitter { max_steps: 2 });
        assert_eq!(flex.inputs.peak_duration_steps, 16);
        assert!(!flex.inputs.apply_on_weekends);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let bad_state = MINIMAL.replace("\"co\"", "\"XX\"");
        assert!(Config::from_toml_str(&bad_state).unwrap().calendar_context().is_err());

        let bad_step = MINIMAL.replace("= 15", "= 7");
        assert!(Config::from_toml_str(&bad_step).unwrap().calendar_context().is_err());

        let bad_vacancy = format!("{}\nvacancy_period = \"Feb 30 - Mar 2\"", MINIMAL);
        assert!(Config::from_toml_str(&bad_vacancy).unwrap().calendar_context().is_err());

        assert!(Config::from_toml_str("[calendar]\nstate = \"CO\"").is_err());
    }

    #[test]
    fn test_missing_parameter_file() {
        let toml = format!("{}\n[parameters]\npath = \"/nonexistent/params.json\"", MINIMAL);
        let config = Config::from_toml_str(&toml).unwrap();
        assert!(config.parameter_store().is_err());
    }
}
