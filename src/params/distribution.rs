//! Empirical event duration and magnitude distributions

use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::domain::Activity;
use crate::error::{Result, ScheduleError};

/// A secondary event that may follow the end of this activity's event
/// (a dryer cycle after a washer cycle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowOn {
    pub activity: Activity,
    pub probability: f64,
    #[serde(default)]
    pub delay_minutes: u32,
}

/// Serialized form of an event distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDistributionSpec {
    pub activity: Activity,
    pub duration_minutes: Vec<u32>,
    #[serde(default)]
    pub duration_weights: Option<Vec<f64>>,
    /// Power level or flow rate samples
    pub magnitudes: Vec<f64>,
    #[serde(default)]
    pub magnitude_weights: Option<Vec<f64>>,
    #[serde(default)]
    pub follow_on: Option<FollowOn>,
}

/// One resampled event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventDraw {
    pub duration_steps: usize,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "EventDistributionSpec")]
pub struct EventDistribution {
    activity: Activity,
    duration_minutes: Vec<u32>,
    duration_index: WeightedIndex<f64>,
    magnitudes: Vec<f64>,
    magnitude_index: WeightedIndex<f64>,
    follow_on: Option<FollowOn>,
}

impl EventDistribution {
    /// Durations and magnitudes drawn with equal weights
    pub fn uniform(activity: Activity, duration_minutes: Vec<u32>, magnitudes: Vec<f64>) -> Result<Self> {
        Self::try_from(EventDistributionSpec {
            activity,
            duration_minutes,
            duration_weights: None,
            magnitudes,
            magnitude_weights: None,
            follow_on: None,
        })
    }

    pub fn weighted(
        activity: Activity,
        durations: &[(u32, f64)],
        magnitudes: Vec<f64>,
    ) -> Result<Self> {
        Self::try_from(EventDistributionSpec {
            activity,
            duration_minutes: durations.iter().map(|(d, _)| *d).collect(),
            duration_weights: Some(durations.iter().map(|(_, w)| *w).collect()),
            magnitudes,
            magnitude_weights: None,
            follow_on: None,
        })
    }

    pub fn with_follow_on(mut self, follow_on: FollowOn) -> Result<Self> {
        validate_follow_on(self.activity, &follow_on)?;
        self.follow_on = Some(follow_on);
        Ok(self)
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn follow_on(&self) -> Option<&FollowOn> {
        self.follow_on.as_ref()
    }

    pub fn max_duration_minutes(&self) -> u32 {
        self.duration_minutes.iter().copied().max().unwrap_or(0)
    }

    /// Draw a duration then a magnitude; always consumes exactly two samples
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, minutes_per_step: u32) -> EventDraw {
        let minutes = self.duration_minutes[self.duration_index.sample(rng)];
        let magnitude = self.magnitudes[self.magnitude_index.sample(rng)];
        EventDraw {
            duration_steps: minutes_to_steps(minutes, minutes_per_step),
            magnitude,
        }
    }
}

/// Whole timesteps covering `minutes`, at least one
pub fn minutes_to_steps(minutes: u32, minutes_per_step: u32) -> usize {
    (minutes.div_ceil(minutes_per_step)).max(1) as usize
}

fn validate_follow_on(activity: Activity, follow_on: &FollowOn) -> Result<()> {
    if !(0.0..=1.0).contains(&follow_on.probability) {
        return Err(ScheduleError::InvalidEventDistribution {
            activity,
            reason: format!("follow-on probability {} outside [0, 1]", follow_on.probability),
        });
    }
    if follow_on.activity == activity {
        return Err(ScheduleError::InvalidEventDistribution {
            activity,
            reason: "an activity cannot follow itself".into(),
        });
    }
    Ok(())
}

fn weighted_index(
    activity: Activity,
    label: &str,
    len: usize,
    weights: Option<Vec<f64>>,
) -> Result<WeightedIndex<f64>> {
    let weights = weights.unwrap_or_else(|| vec![1.0; len]);
    if weights.len() != len {
        return Err(ScheduleError::InvalidEventDistribution {
            activity,
            reason: format!("{} weights: expected {}, got {}", label, len, weights.len()),
        });
    }
    WeightedIndex::new(weights).map_err(|e| ScheduleError::InvalidEventDistribution {
        activity,
        reason: format!("{} weights: {}", label, e),
    })
}

impl TryFrom<EventDistributionSpec> for EventDistribution {
    type Error = ScheduleError;

    fn try_from(spec: EventDistributionSpec) -> Result<Self> {
        let activity = spec.activity;
        if spec.duration_minutes.iter().any(|d| *d == 0) {
            return Err(ScheduleError::InvalidEventDistribution {
                activity,
                reason: "zero-minute duration".into(),
            });
        }
        if let Some(m) = spec.magnitudes.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(ScheduleError::InvalidEventDistribution {
                activity,
                reason: format!("invalid magnitude {}", m),
            });
        }
        if let Some(follow_on) = &spec.follow_on {
            validate_follow_on(activity, follow_on)?;
        }

        let duration_index = weighted_index(
            activity,
            "duration",
            spec.duration_minutes.len(),
            spec.duration_weights,
        )?;
        let magnitude_index = weighted_index(
            activity,
            "magnitude",
            spec.magnitudes.len(),
            spec.magnitude_weights,
        )?;

        Ok(Self {
            activity,
            duration_minutes: spec.duration_minutes,
            duration_index,
            magnitudes: spec.magnitudes,
            magnitude_index,
            follow_on: spec.follow_on,
        })
    }
}
