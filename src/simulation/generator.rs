//! Annual schedule generation
//!
//! Drives every occupant's chains through the year, one timestep at a time:
//! presence first (it decides whether the occupant may start events), then each
//! appliance and fixture activity, then queued follow-on cycles. Follow-on
//! cycles are scheduled from where the aggregator actually placed the source
//! event, so a deferred washer cycle also delays its dryer. The aggregated
//! table is finally passed through the vacancy post-processor.

use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use super::aggregator::{AggregationDiagnostics, Aggregator, ChainStep, PlacedEvent};
use super::chain::{ChainId, MarkovStepper, OccupantChain, StepperDiagnostics};
use super::resampler::EventResampler;
use super::rng::{chain_rng, ChainRng};
use super::vacancy::apply_vacancy;
use crate::domain::{default_end_uses, Activity, CalendarContext, EndUseSpec, ScheduleTable};
use crate::error::{Result, ScheduleError};
use crate::params::{FollowOn, TransitionTableProvider};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationDiagnostics {
    pub steps: usize,
    pub chains: usize,
    pub stepper: StepperDiagnostics,
    pub follow_on_events: u64,
    pub aggregation: AggregationDiagnostics,
    pub vacancy_steps: usize,
}

#[derive(Debug)]
pub struct GeneratedSchedules {
    pub table: ScheduleTable,
    pub diagnostics: GenerationDiagnostics,
}

/// Follow-on cycles of one source activity (dryer after washer)
struct FollowOnRule<'a> {
    source: Activity,
    rule: &'a FollowOn,
    resampler: EventResampler<'a>,
    /// One stream per occupant, keyed by the follow-on activity
    rngs: Vec<ChainRng>,
    scheduled: u64,
}

impl FollowOnRule<'_> {
    /// Queue a follow-on cycle after the placed end of `source`
    fn schedule(
        &mut self,
        source: &PlacedEvent,
        ctx: &CalendarContext,
        queue: &mut BTreeMap<usize, Vec<ChainStep>>,
    ) {
        let occupant = source.occupant;
        let rng = &mut self.rngs[occupant];
        if !rng.gen_bool(self.rule.probability) {
            return;
        }
        let delay = self.rule.delay_minutes.div_ceil(ctx.minutes_per_step()) as usize;
        let start = source.end + delay;
        if start >= ctx.total_steps() {
            return;
        }
        let draw = self.resampler.draw(rng, start, ctx);
        queue
            .entry(start)
            .or_default()
            .push(ChainStep::event(occupant, self.rule.activity, draw));
        self.scheduled += 1;
    }
}

pub struct ScheduleGenerator<'a, P: TransitionTableProvider + ?Sized> {
    ctx: &'a CalendarContext,
    params: &'a P,
    end_uses: Vec<EndUseSpec>,
}

impl<'a, P: TransitionTableProvider + ?Sized> ScheduleGenerator<'a, P> {
    pub fn new(ctx: &'a CalendarContext, params: &'a P) -> Self {
        Self {
            ctx,
            params,
            end_uses: default_end_uses(),
        }
    }

    pub fn with_end_uses(mut self, end_uses: Vec<EndUseSpec>) -> Self {
        self.end_uses = end_uses;
        self
    }

    pub fn end_uses(&self) -> &[EndUseSpec] {
        &self.end_uses
    }

    /// Run the full year and return the post-processed table
    pub fn generate(&self) -> Result<GeneratedSchedules> {
        let ctx = self.ctx;
        let params = self.params;
        let seed = ctx.random_seed();
        let chain_count = ctx.chain_count();
        let total_steps = ctx.total_steps();
        let mut aggregator = Aggregator::new(ctx, &self.end_uses);

        // Validate everything before any stepping
        let presence_table = params
            .transition_table(Activity::Presence)
            .ok_or(ScheduleError::MissingTransitionTable(Activity::Presence))?;
        let mut presence_stepper = MarkovStepper::new(
            presence_table,
            params.event_distribution(Activity::Presence),
            ctx,
        )?;

        let wanted: BTreeSet<Activity> = aggregator.activities().into_iter().collect();
        let mut steppers = Vec::new();
        let mut follow_only = Vec::new();
        for &activity in wanted.iter().filter(|a| **a != Activity::Presence) {
            match params.transition_table(activity) {
                Some(table) => steppers.push(MarkovStepper::new(
                    table,
                    params.event_distribution(activity),
                    ctx,
                )?),
                None => follow_only.push(activity),
            }
        }

        let mut follow_ons = Vec::new();
        for stepper in &steppers {
            let source = stepper.table().activity();
            let Some(rule) = params.event_distribution(source).and_then(|d| d.follow_on()) else {
                continue;
            };
            if !wanted.contains(&rule.activity) {
                continue;
            }
            let target = params.event_distribution(rule.activity).ok_or_else(|| {
                ScheduleError::InvalidEventDistribution {
                    activity: rule.activity,
                    reason: format!("follow-on of {} has no distribution", source),
                }
            })?;
            follow_ons.push(FollowOnRule {
                source,
                rule,
                resampler: EventResampler::new(target),
                rngs: (0..chain_count).map(|o| chain_rng(seed, o, rule.activity)).collect(),
                scheduled: 0,
            });
        }
        if let Some(orphan) = follow_only
            .iter()
            .find(|a| !follow_ons.iter().any(|f| f.rule.activity == **a))
        {
            return Err(ScheduleError::MissingTransitionTable(*orphan));
        }

        info!(
            state = %ctx.state(),
            year = ctx.sim_year(),
            minutes_per_step = ctx.minutes_per_step(),
            occupants = ctx.num_occupants(),
            chains = chain_count,
            seed,
            "generating schedules"
        );

        let mut presence_chains: Vec<OccupantChain> = (0..chain_count)
            .map(|occupant| {
                let id = ChainId {
                    occupant,
                    activity: Activity::Presence,
                };
                OccupantChain::new(id, presence_table, seed)
            })
            .collect();
        let mut activity_chains: Vec<Vec<OccupantChain>> = (0..chain_count)
            .map(|occupant| {
                steppers
                    .iter()
                    .map(|stepper| {
                        let table = stepper.table();
                        let id = ChainId {
                            occupant,
                            activity: table.activity(),
                        };
                        OccupantChain::new(id, table, seed)
                    })
                    .collect()
            })
            .collect();

        let mut queue: BTreeMap<usize, Vec<ChainStep>> = BTreeMap::new();
        let mut steps = Vec::with_capacity(chain_count * (steppers.len() + 2));

        for index in 0..total_steps {
            steps.clear();
            for (presence_chain, chains) in presence_chains.iter_mut().zip(activity_chains.iter_mut()) {
                let presence = presence_stepper.step(presence_chain, index, ctx, true);
                let events_allowed = presence_table.state(presence.state).accepts_events;
                steps.push(ChainStep::from_outcome(presence_chain.id(), &presence));

                for (chain, stepper) in chains.iter_mut().zip(steppers.iter_mut()) {
                    let outcome = stepper.step(chain, index, ctx, events_allowed);
                    steps.push(ChainStep::from_outcome(chain.id(), &outcome));
                }
            }
            if let Some(queued) = queue.remove(&index) {
                steps.extend(queued);
            }
            for placed in aggregator.record(index, &steps) {
                for rule in follow_ons.iter_mut().filter(|r| r.source == placed.activity) {
                    rule.schedule(placed, ctx, &mut queue);
                }
            }
        }

        let mut stepper_diagnostics = presence_stepper.diagnostics();
        for stepper in &steppers {
            stepper_diagnostics.absorb(&stepper.diagnostics());
        }
        stepper_diagnostics.events_clamped += follow_ons.iter().map(|f| f.resampler.clamped()).sum::<u64>();

        let (mut table, aggregation) = aggregator.finish()?;
        let vacancy_steps = apply_vacancy(&mut table, ctx.vacancy(), ctx);

        let diagnostics = GenerationDiagnostics {
            steps: total_steps,
            chains: chain_count * (steppers.len() + 1),
            stepper: stepper_diagnostics,
            follow_on_events: follow_ons.iter().map(|f| f.scheduled).sum(),
            aggregation,
            vacancy_steps,
        };
        info!(
            steps = diagnostics.steps,
            chains = diagnostics.chains,
            events = diagnostics.stepper.events_started,
            suppressed = diagnostics.stepper.events_suppressed,
            follow_ons = diagnostics.follow_on_events,
            deferred = diagnostics.aggregation.events_deferred,
            fallbacks = diagnostics.stepper.prior_bin_fallbacks,
            self_loops = diagnostics.stepper.self_loops,
            vacancy_steps,
            "schedule generation complete"
        );

        Ok(GeneratedSchedules { table, diagnostics })
    }
}
