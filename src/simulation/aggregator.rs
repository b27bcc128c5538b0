//! # Multi-Occupant Aggregator
//!
//! Combines the per-step output of every occupant chain into one annual series
//! per configured end use.
//!
//! - State levels are summed for chains not running an event
//! - Event magnitudes are written over the event's whole span when it starts
//! - A shared fixture serves one event at a time: occupants are served in id
//!   order and a colliding event is deferred to the fixture's next free step
//! - Sums are normalized per end use, then scaled by `num_occupants / chains`
//!   so a fractional household stays distinguishable from the next whole one

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use super::chain::{ChainId, StepOutcome};
use crate::domain::{Activity, CalendarContext, EndUseSpec, Normalization, ScheduleSeries, ScheduleTable};
use crate::error::Result;
use crate::params::EventDraw;

/// One chain's contribution to a timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainStep {
    pub occupant: usize,
    pub activity: Activity,
    pub level: f64,
    pub in_event: bool,
    pub started: Option<EventDraw>,
}

impl ChainStep {
    pub fn from_outcome(id: ChainId, outcome: &StepOutcome) -> Self {
        Self {
            occupant: id.occupant,
            activity: id.activity,
            level: outcome.level,
            in_event: outcome.in_event,
            started: outcome.started,
        }
    }

    /// An event started outside any chain (follow-on cycles)
    pub fn event(occupant: usize, activity: Activity, draw: EventDraw) -> Self {
        Self {
            occupant,
            activity,
            level: 0.0,
            in_event: true,
            started: Some(draw),
        }
    }
}

/// Where an event actually landed after shared-fixture deferral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedEvent {
    pub occupant: usize,
    pub activity: Activity,
    pub start: usize,
    /// Exclusive; clamped to the end of the year
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationDiagnostics {
    pub events_written: u64,
    /// Events moved later because a shared fixture was busy
    pub events_deferred: u64,
    pub deferred_steps: u64,
    /// Events cut short at the end of the year
    pub events_truncated: u64,
    /// Deferred past the end of the year entirely
    pub events_dropped: u64,
}

#[derive(Debug)]
struct EndUseAccumulator {
    spec: EndUseSpec,
    values: Vec<f64>,
    /// First step at which a shared fixture is free again
    lane_free_at: usize,
}

impl EndUseAccumulator {
    /// Returns the written `(start, end)` span, `None` when dropped
    fn place_event(
        &mut self,
        index: usize,
        occupant: usize,
        draw: EventDraw,
        diagnostics: &mut AggregationDiagnostics,
    ) -> Option<(usize, usize)> {
        let total = self.values.len();
        let start = if self.spec.shared {
            index.max(self.lane_free_at)
        } else {
            index
        };

        if start > index {
            diagnostics.events_deferred += 1;
            diagnostics.deferred_steps += (start - index) as u64;
            debug!(
                end_use = %self.spec.name,
                occupant,
                index,
                start,
                "shared fixture busy, deferring event"
            );
        }
        if start >= total {
            diagnostics.events_dropped += 1;
            return None;
        }

        let end = (start + draw.duration_steps).min(total);
        if end - start < draw.duration_steps {
            diagnostics.events_truncated += 1;
        }
        self.values[start..end].iter_mut().for_each(|v| *v += draw.magnitude);
        if self.spec.shared {
            self.lane_free_at = end;
        }
        diagnostics.events_written += 1;
        Some((start, end))
    }

    fn into_series(self, ratio: f64, chains: usize) -> ScheduleSeries {
        let mut series = ScheduleSeries::new(self.spec.name, self.values, self.spec.vacancy);
        match self.spec.normalization {
            Normalization::OccupantFraction if chains > 0 => series.scale(1.0 / chains as f64),
            Normalization::OccupantFraction | Normalization::Absolute => {}
            Normalization::Peak => series.normalize_to_peak(),
        }
        series.scale(ratio);
        series
    }
}

#[derive(Debug)]
pub struct Aggregator {
    total_steps: usize,
    chains: usize,
    ratio: f64,
    accumulators: Vec<EndUseAccumulator>,
    placed: Vec<PlacedEvent>,
    diagnostics: AggregationDiagnostics,
}

impl Aggregator {
    pub fn new(ctx: &CalendarContext, end_uses: &[EndUseSpec]) -> Self {
        let total_steps = ctx.total_steps();
        Self {
            total_steps,
            chains: ctx.chain_count(),
            ratio: ctx.occupancy_ratio(),
            accumulators: end_uses
                .iter()
                .map(|spec| EndUseAccumulator {
                    spec: spec.clone(),
                    values: vec![0.0; total_steps],
                    lane_free_at: 0,
                })
                .collect(),
            placed: Vec::new(),
            diagnostics: AggregationDiagnostics::default(),
        }
    }

    /// Distinct activities feeding at least one end use
    pub fn activities(&self) -> Vec<Activity> {
        self.accumulators
            .iter()
            .map(|a| a.spec.activity)
            .sorted()
            .dedup()
            .collect()
    }

    /// Accumulate every chain's output for timestep `index`.
    ///
    /// Returns the events started at this step with their placed spans. An
    /// event feeding several end uses is reported once, ending at its latest end.
    pub fn record(&mut self, index: usize, steps: &[ChainStep]) -> &[PlacedEvent] {
        let diagnostics = &mut self.diagnostics;
        let placed = &mut self.placed;
        placed.clear();
        for accumulator in self.accumulators.iter_mut() {
            let activity = accumulator.spec.activity;
            for step in steps
                .iter()
                .filter(|s| s.activity == activity)
                .sorted_by_key(|s| s.occupant)
            {
                if !step.in_event {
                    accumulator.values[index] += step.level;
                }
                let Some(draw) = step.started else {
                    continue;
                };
                let Some((start, end)) = accumulator.place_event(index, step.occupant, draw, diagnostics) else {
                    continue;
                };
                match placed
                    .iter_mut()
                    .find(|p| p.occupant == step.occupant && p.activity == activity)
                {
                    Some(existing) => {
                        existing.start = existing.start.max(start);
                        existing.end = existing.end.max(end);
                    }
                    None => placed.push(PlacedEvent {
                        occupant: step.occupant,
                        activity,
                        start,
                        end,
                    }),
                }
            }
        }
        placed
    }

    pub fn diagnostics(&self) -> &AggregationDiagnostics {
        &self.diagnostics
    }

    /// Scale, normalize and assemble the output table
    pub fn finish(self) -> Result<(ScheduleTable, AggregationDiagnostics)> {
        let (ratio, chains) = (self.ratio, self.chains);
        let series = self
            .accumulators
            .into_iter()
            .map(|a| a.into_series(ratio, chains))
            .collect();
        Ok((ScheduleTable::new(self.total_steps, series)?, self.diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VacancyTreatment;

    fn ctx(occupants: f64) -> CalendarContext {
        CalendarContext::new(2023, 60, "CO".parse().unwrap())
            .unwrap()
            .with_occupants(occupants)
            .unwrap()
    }

    fn shower(occupant: usize, steps: usize) -> ChainStep {
        ChainStep::event(occupant, Activity::Shower, EventDraw { duration_steps: steps, magnitude: 2.0 })
    }

    fn presence(occupant: usize, level: f64) -> ChainStep {
        ChainStep {
            occupant,
            activity: Activity::Presence,
            level,
            in_event: false,
            started: None,
        }
    }

    #[test]
    fn test_shared_fixture_defers_collisions() {
        let ctx = ctx(2.0);
        let uses = [EndUseSpec::new("showers", Activity::Shower)
            .shared()
            .with_normalization(Normalization::Absolute)];
        let mut aggregator = Aggregator::new(&ctx, &uses);

        // Listed out of order; occupant 0 is served first
        aggregator.record(10, &[shower(1, 2), shower(0, 3)]);
        let deferred = aggregator.diagnostics().clone();
        let (table, _) = aggregator.finish().unwrap();
        let values = &table.series()[0].values;

        assert_eq!(&values[9..16], &[0.0, 2.0, 2.0, 2.0, 2.0, 2.0, 0.0]);
        assert!(values.iter().all(|v| *v <= 2.0));
        assert_eq!(deferred.events_deferred, 1);
        assert_eq!(deferred.deferred_steps, 3);
    }

    #[test]
    fn test_unshared_events_overlap() {
        let ctx = ctx(2.0);
        let uses = [EndUseSpec::new("showers", Activity::Shower).with_normalization(Normalization::Absolute)];
        let mut aggregator = Aggregator::new(&ctx, &uses);
        aggregator.record(0, &[shower(0, 2), shower(1, 2)]);
        let (table, diagnostics) = aggregator.finish().unwrap();
        assert_eq!(&table.series()[0].values[..3], &[4.0, 4.0, 0.0]);
        assert_eq!(diagnostics.events_deferred, 0);
    }

    #[test]
    fn test_deferred_event_clamps_at_year_end() {
        let ctx = ctx(2.0);
        let last = ctx.total_steps() - 1;
        let uses = [EndUseSpec::new("showers", Activity::Shower).shared()];
        let mut aggregator = Aggregator::new(&ctx, &uses);
        aggregator.record(last - 1, &[shower(0, 1), shower(1, 3), shower(2, 1)]);
        let (table, diagnostics) = aggregator.finish().unwrap();
        assert_eq!(table.series()[0].len(), ctx.total_steps());
        assert_eq!(diagnostics.events_truncated, 1);
        assert_eq!(diagnostics.events_dropped, 1);
    }

    #[test]
    fn test_fractional_occupancy_scaling() {
        let ctx = ctx(2.5);
        let uses = [
            EndUseSpec::new("occupants", Activity::Presence).with_normalization(Normalization::OccupantFraction),
            EndUseSpec::new("people", Activity::Presence).with_normalization(Normalization::Absolute),
            EndUseSpec::new("profile", Activity::Presence),
        ];
        let mut aggregator = Aggregator::new(&ctx, &uses);
        aggregator.record(0, &[presence(0, 1.0), presence(1, 1.0), presence(2, 1.0)]);
        aggregator.record(1, &[presence(0, 1.0), presence(1, 0.0), presence(2, 0.0)]);
        let (table, _) = aggregator.finish().unwrap();

        let ratio = 2.5 / 3.0;
        let fraction = &table.get("occupants").unwrap().values;
        assert!((fraction[0] - ratio).abs() < 1e-12);
        assert!((fraction[1] - ratio / 3.0).abs() < 1e-12);
        let people = &table.get("people").unwrap().values;
        assert!((people[0] - 2.5).abs() < 1e-12);
        // The ratio survives peak normalization
        let profile = table.get("profile").unwrap();
        assert!((profile.peak() - ratio).abs() < 1e-12);
        assert!((profile.values[1] - ratio / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_whole_household_keeps_unit_fraction() {
        let ctx = ctx(3.0);
        let uses = [EndUseSpec::new("occupants", Activity::Presence).with_normalization(Normalization::OccupantFraction)];
        let mut aggregator = Aggregator::new(&ctx, &uses);
        aggregator.record(0, &[presence(0, 1.0), presence(1, 1.0), presence(2, 1.0)]);
        let (table, _) = aggregator.finish().unwrap();
        assert!((table.series()[0].values[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_reports_deferred_placement() {
        let ctx = ctx(2.0);
        let washer = |occupant| ChainStep::event(
            occupant,
            Activity::ClothesWasher,
            EventDraw { duration_steps: 3, magnitude: 500.0 },
        );
        let uses = [
            EndUseSpec::new("clothes_washer", Activity::ClothesWasher).shared(),
            EndUseSpec::new("washer_unshared", Activity::ClothesWasher),
        ];
        let mut aggregator = Aggregator::new(&ctx, &uses);

        let placed = aggregator.record(0, &[washer(1), washer(0)]).to_vec();
        assert_eq!(
            placed,
            vec![
                PlacedEvent { occupant: 0, activity: Activity::ClothesWasher, start: 0, end: 3 },
                PlacedEvent { occupant: 1, activity: Activity::ClothesWasher, start: 3, end: 6 },
            ]
        );
        assert!(aggregator.record(1, &[presence(0, 1.0)]).is_empty());
    }

    #[test]
    fn test_zero_occupants_yields_zero_series() {
        let ctx = ctx(0.0);
        let uses = vec![EndUseSpec::new("occupants", Activity::Presence)
            .with_normalization(Normalization::OccupantFraction)
            .with_vacancy(VacancyTreatment::Unaffected)];
        let (table, _) = Aggregator::new(&ctx, &uses).finish().unwrap();
        assert_eq!(table.rows(), 8760);
        assert!(table.series()[0].values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_activities_are_deduplicated() {
        let ctx = ctx(1.0);
        let uses = [
            EndUseSpec::new("a", Activity::Shower),
            EndUseSpec::new("b", Activity::Presence),
            EndUseSpec::new("c", Activity::Shower),
        ];
        assert_eq!(
            Aggregator::new(&ctx, &uses).activities(),
            vec![Activity::Presence, Activity::Shower]
        );
    }
}
