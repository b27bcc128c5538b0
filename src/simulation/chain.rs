//! # Markov Chain Stepper
//!
//! Advances one occupant's chain for one activity by one timestep.
//!
//! ## Step
//!
//! - A held event blocks transitions until its duration elapses
//! - Month and day type come from the real calendar of the simulated year
//! - The row for (month bucket, day type, time bin, current state) is sampled
//!   with one uniform draw from the chain's own stream
//! - Missing rows fall back to the nearest earlier bin, then to a self-loop
//! - Entering an event-triggering state draws an event; the entry is rejected
//!   while the occupant cannot start events (asleep or away)
//!
//! ## Resolution
//!
//! Tables carry the step length their probabilities were estimated at. A shorter
//! native step is applied several times per simulation step; a longer one only
//! draws on its own boundaries.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::resampler::EventResampler;
use super::rng::{chain_rng, ChainRng};
use crate::domain::{Activity, CalendarContext};
use crate::error::{Result, ScheduleError};
use crate::params::{sample_cdf, EventDistribution, EventDraw, RowKey, RowLookup, StateId, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChainId {
    pub occupant: usize,
    pub activity: Activity,
}

/// An event being held by a chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEvent {
    pub draw: EventDraw,
    /// Steps still to run after the current one
    pub remaining: usize,
}

impl ActiveEvent {
    pub fn new(draw: EventDraw) -> Self {
        Self {
            draw,
            remaining: draw.duration_steps.saturating_sub(1),
        }
    }
}

/// Per occupant, per activity chain state
#[derive(Debug, Clone)]
pub struct OccupantChain {
    id: ChainId,
    pub(super) current_state: StateId,
    pub(super) elapsed_in_state: usize,
    pub(super) pending: Option<ActiveEvent>,
    pub(super) rng: ChainRng,
}

impl OccupantChain {
    /// Create a chain with its own stream and an initial state drawn from the
    /// table's initial distribution
    pub fn new(id: ChainId, table: &TransitionTable, seed: u64) -> Self {
        let mut rng = chain_rng(seed, id.occupant, id.activity);
        let current_state = sample_cdf(table.initial_cdf(), rng.gen());
        Self {
            id,
            current_state,
            elapsed_in_state: 0,
            pending: None,
            rng,
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn current_state(&self) -> StateId {
        self.current_state
    }

    pub fn elapsed_in_state(&self) -> usize {
        self.elapsed_in_state
    }

    pub fn pending(&self) -> Option<&ActiveEvent> {
        self.pending.as_ref()
    }

    pub fn in_event(&self) -> bool {
        self.pending.is_some()
    }
}

/// What a chain emitted for one timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub state: StateId,
    /// Level of the current state; superseded by the event while one runs
    pub level: f64,
    pub in_event: bool,
    /// Event that started on this step
    pub started: Option<EventDraw>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepperDiagnostics {
    pub draws: u64,
    pub prior_bin_fallbacks: u64,
    pub self_loops: u64,
    pub events_started: u64,
    pub events_suppressed: u64,
    pub events_clamped: u64,
}

impl StepperDiagnostics {
    pub fn absorb(&mut self, other: &StepperDiagnostics) {
        self.draws += other.draws;
        self.prior_bin_fallbacks += other.prior_bin_fallbacks;
        self.self_loops += other.self_loops;
        self.events_started += other.events_started;
        self.events_suppressed += other.events_suppressed;
        self.events_clamped += other.events_clamped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    /// Native transitions per simulation step
    SubSteps(u32),
    /// Draw only on steps that are multiples of this
    Every(usize),
}

/// Steps every chain of one activity
#[derive(Debug)]
pub struct MarkovStepper<'a> {
    table: &'a TransitionTable,
    resampler: Option<EventResampler<'a>>,
    cadence: Cadence,
    diagnostics: StepperDiagnostics,
}

impl<'a> MarkovStepper<'a> {
    pub fn new(
        table: &'a TransitionTable,
        events: Option<&'a EventDistribution>,
        ctx: &CalendarContext,
    ) -> Result<Self> {
        let activity = table.activity();
        let native = table.step_minutes();
        let step = ctx.minutes_per_step();

        let cadence = if native <= step && step % native == 0 {
            Cadence::SubSteps(step / native)
        } else if native > step && native % step == 0 {
            Cadence::Every((native / step) as usize)
        } else {
            return Err(ScheduleError::IncompatibleResolution {
                activity,
                native,
                step,
            });
        };

        if table.states().iter().any(|s| s.triggers_event) && events.is_none() {
            return Err(ScheduleError::InvalidEventDistribution {
                activity,
                reason: "table has event-triggering states but no distribution".into(),
            });
        }

        Ok(Self {
            table,
            resampler: events.map(EventResampler::new),
            cadence,
            diagnostics: StepperDiagnostics::default(),
        })
    }

    pub fn table(&self) -> &'a TransitionTable {
        self.table
    }

    pub fn diagnostics(&self) -> StepperDiagnostics {
        let mut diagnostics = self.diagnostics.clone();
        diagnostics.events_clamped = self.resampler.as_ref().map_or(0, EventResampler::clamped);
        diagnostics
    }

    /// Advance `chain` across timestep `index`
    pub fn step(
        &mut self,
        chain: &mut OccupantChain,
        index: usize,
        ctx: &CalendarContext,
        events_allowed: bool,
    ) -> StepOutcome {
        let table = self.table;

        if let Some(event) = chain.pending.as_mut() {
            if event.remaining > 0 {
                event.remaining -= 1;
                chain.elapsed_in_state += 1;
                return self.outcome(chain, true, None);
            }
            chain.pending = None;
        }

        let draws = match self.cadence {
            Cadence::SubSteps(n) => n,
            Cadence::Every(n) if index % n == 0 => 1,
            Cadence::Every(_) => 0,
        };

        let month_bucket = table.month_bucket(ctx.month_of(index));
        let day_type = ctx.day_type(index);
        let minute = ctx.minute_of_day(index);
        let mut changed = false;
        let mut started = None;

        for sub in 0..draws {
            let key = RowKey {
                month_bucket,
                day_type,
                bin: table.bin_of(minute + sub * table.step_minutes()),
                state: chain.current_state,
            };
            let cdf = match table.lookup(key) {
                RowLookup::Exact(cdf) => cdf,
                RowLookup::PriorBin { bin, cdf } => {
                    self.diagnostics.prior_bin_fallbacks += 1;
                    debug!(
                        activity = %table.activity(),
                        state = %table.state(key.state).name,
                        requested_bin = key.bin,
                        bin,
                        "transition row missing, using earlier bin"
                    );
                    cdf
                }
                RowLookup::Missing => {
                    self.diagnostics.self_loops += 1;
                    debug!(
                        activity = %table.activity(),
                        state = %table.state(key.state).name,
                        bin = key.bin,
                        "no transition row, holding state"
                    );
                    continue;
                }
            };

            self.diagnostics.draws += 1;
            let next = sample_cdf(cdf, chain.rng.gen());
            if next == chain.current_state {
                continue;
            }

            let entering_event =
                table.state(next).triggers_event && !table.state(chain.current_state).triggers_event;
            if entering_event && !events_allowed {
                self.diagnostics.events_suppressed += 1;
                continue;
            }

            chain.current_state = next;
            changed = true;

            if entering_event {
                if let Some(resampler) = self.resampler.as_mut() {
                    started = Some(resampler.on_state_entry(chain, index, ctx));
                    self.diagnostics.events_started += 1;
                    break;
                }
            }
        }

        chain.elapsed_in_state = if changed { 1 } else { chain.elapsed_in_state + 1 };
        self.outcome(chain, started.is_some(), started)
    }

    fn outcome(&self, chain: &OccupantChain, in_event: bool, started: Option<EventDraw>) -> StepOutcome {
        StepOutcome {
            state: chain.current_state,
            level: self.table.state(chain.current_state).level,
            in_event,
            started,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DayType;
    use crate::params::StateSpec;

    fn ctx(minutes: u32) -> CalendarContext {
        CalendarContext::new(2023, minutes, "CO".parse().unwrap()).unwrap()
    }

    fn always_on(step_minutes: u32) -> TransitionTable {
        let mut builder = TransitionTable::builder(
            Activity::Shower,
            vec![StateSpec::new("off", 0.0), StateSpec::new("on", 0.0).triggering()],
        )
        .step_minutes(step_minutes);
        for day_type in [DayType::Weekday, DayType::Weekend] {
            for hour in 0..24 {
                builder = builder
                    .row(day_type, hour, "off", vec![0.0, 1.0])
                    .row(day_type, hour, "on", vec![1.0, 0.0]);
            }
        }
        builder.build().unwrap()
    }

    fn shower_events(minutes: u32) -> EventDistribution {
        EventDistribution::uniform(Activity::Shower, vec![minutes], vec![2.0]).unwrap()
    }

    fn chain(table: &TransitionTable) -> OccupantChain {
        let id = ChainId {
            occupant: 0,
            activity: table.activity(),
        };
        OccupantChain::new(id, table, 42)
    }

    #[test]
    fn test_event_blocks_transitions_until_elapsed() {
        let table = always_on(15);
        let events = shower_events(45);
        let ctx = ctx(15);
        let mut stepper = MarkovStepper::new(&table, Some(&events), &ctx).unwrap();
        let mut chain = chain(&table);

        let first = stepper.step(&mut chain, 0, &ctx, true);
        assert_eq!(first.started, Some(EventDraw { duration_steps: 3, magnitude: 2.0 }));

        for index in 1..3 {
            let outcome = stepper.step(&mut chain, index, &ctx, true);
            assert!(outcome.in_event);
            assert!(outcome.started.is_none());
            assert_eq!(chain.elapsed_in_state(), index + 1);
        }

        // Event over: on -> off
        let after = stepper.step(&mut chain, 3, &ctx, true);
        assert!(!after.in_event);
        assert_eq!(after.state, 0);
        // off -> on again
        let again = stepper.step(&mut chain, 4, &ctx, true);
        assert!(again.started.is_some());
        assert_eq!(stepper.diagnostics().events_started, 2);
    }

    #[test]
    fn test_gating_suppresses_event_entry() {
        let table = always_on(15);
        let events = shower_events(15);
        let ctx = ctx(15);
        let mut stepper = MarkovStepper::new(&table, Some(&events), &ctx).unwrap();
        let mut chain = chain(&table);

        for index in 0..10 {
            let outcome = stepper.step(&mut chain, index, &ctx, false);
            assert_eq!(outcome.state, 0);
            assert!(outcome.started.is_none());
        }
        assert_eq!(chain.elapsed_in_state(), 10);
        assert_eq!(stepper.diagnostics().events_suppressed, 10);
    }

    #[test]
    fn test_missing_rows_self_loop() {
        let table = TransitionTable::builder(
            Activity::PlugLoads,
            vec![StateSpec::new("standby", 0.3), StateSpec::new("in_use", 1.0)],
        )
        .build()
        .unwrap();
        let ctx = ctx(60);
        let mut stepper = MarkovStepper::new(&table, None, &ctx).unwrap();
        let mut chain = chain(&table);

        let outcome = stepper.step(&mut chain, 5, &ctx, true);
        assert_eq!(outcome.state, 0);
        assert_eq!(outcome.level, 0.3);
        assert_eq!(stepper.diagnostics().self_loops, 1);
    }

    #[test]
    fn test_native_substeps_and_boundaries() {
        let events = shower_events(5);

        // 5-minute table on an hourly grid: many sub-draws until the event starts
        let fine = always_on(5);
        let hourly = ctx(60);
        let mut stepper = MarkovStepper::new(&fine, Some(&events), &hourly).unwrap();
        let mut chain = chain(&fine);
        assert!(stepper.step(&mut chain, 0, &hourly, true).started.is_some());
        assert_eq!(stepper.diagnostics().draws, 1);

        // 30-minute table on a 15-minute grid draws every other step
        let coarse = always_on(30);
        let quarter = ctx(15);
        let mut stepper = MarkovStepper::new(&coarse, Some(&events), &quarter).unwrap();
        let mut chain = self::chain(&coarse);
        assert!(stepper.step(&mut chain, 0, &quarter, true).started.is_some());
        assert_eq!(stepper.step(&mut chain, 1, &quarter, true).state, 1);
        assert_eq!(stepper.step(&mut chain, 2, &quarter, true).state, 0);
        assert_eq!(stepper.diagnostics().draws, 2);
    }

    #[test]
    fn test_incompatible_resolution() {
        let table = always_on(45);
        let events = shower_events(15);
        let result = MarkovStepper::new(&table, Some(&events), &ctx(30));
        assert!(matches!(
            result,
            Err(ScheduleError::IncompatibleResolution { native: 45, step: 30, .. })
        ));
    }

    #[test]
    fn test_triggering_table_requires_distribution() {
        let table = always_on(15);
        assert!(MarkovStepper::new(&table, None, &ctx(15)).is_err());
    }

    #[test]
    fn test_chains_are_reproducible() {
        let table = always_on(15);
        let events = EventDistribution::uniform(Activity::Shower, vec![15, 30, 45], vec![1.5, 2.5]).unwrap();
        let ctx = ctx(15);
        let run = || {
            let mut stepper = MarkovStepper::new(&table, Some(&events), &ctx).unwrap();
            let mut chain = chain(&table);
            (0..200)
                .map(|i| stepper.step(&mut chain, i, &ctx, true).started)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
