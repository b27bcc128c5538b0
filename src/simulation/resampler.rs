//! Event duration and magnitude resampling
//!
//! When a chain enters an event-triggering state the raw per-step Markov output
//! is replaced by one event drawn from the activity's empirical distribution.
//! The chain holds the event until its duration elapses.

use rand::Rng;

use super::chain::{ActiveEvent, OccupantChain};
use crate::domain::{Activity, CalendarContext};
use crate::params::{EventDistribution, EventDraw, FollowOn};

#[derive(Debug)]
pub struct EventResampler<'a> {
    distribution: &'a EventDistribution,
    clamped: u64,
}

impl<'a> EventResampler<'a> {
    pub fn new(distribution: &'a EventDistribution) -> Self {
        Self {
            distribution,
            clamped: 0,
        }
    }

    pub fn activity(&self) -> Activity {
        self.distribution.activity()
    }

    pub fn follow_on(&self) -> Option<&'a FollowOn> {
        self.distribution.follow_on()
    }

    /// Draw an event for a chain entering a triggering state at `index` and
    /// hand it to the chain; uses the chain's own stream
    pub fn on_state_entry(
        &mut self,
        chain: &mut OccupantChain,
        index: usize,
        ctx: &CalendarContext,
    ) -> EventDraw {
        let draw = self.draw(&mut chain.rng, index, ctx);
        chain.pending = Some(ActiveEvent::new(draw));
        draw
    }

    /// Draw one event starting at `index`, clamped to the end of the year
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R, index: usize, ctx: &CalendarContext) -> EventDraw {
        let mut draw = self.distribution.sample(rng, ctx.minutes_per_step());
        let remaining = ctx.total_steps().saturating_sub(index).max(1);
        if draw.duration_steps > remaining {
            draw.duration_steps = remaining;
            self.clamped += 1;
        }
        draw
    }

    /// Events shortened at the year boundary
    pub fn clamped(&self) -> u64 {
        self.clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::rng::chain_rng;

    fn ctx() -> CalendarContext {
        CalendarContext::new(2023, 60, "CO".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_draw_clamps_at_year_end() {
        let dist = EventDistribution::uniform(Activity::Dishwasher, vec![180], vec![1200.0]).unwrap();
        let mut resampler = EventResampler::new(&dist);
        let ctx = ctx();
        let mut rng = chain_rng(1, 0, Activity::Dishwasher);

        let draw = resampler.draw(&mut rng, ctx.total_steps() - 2, &ctx);
        assert_eq!(draw.duration_steps, 2);
        assert_eq!(resampler.clamped(), 1);

        let draw = resampler.draw(&mut rng, 0, &ctx);
        assert_eq!(draw.duration_steps, 3);
        assert_eq!(resampler.clamped(), 1);
    }

    #[test]
    fn test_magnitude_held_for_event() {
        let dist = EventDistribution::uniform(Activity::Cooking, vec![30], vec![1800.0]).unwrap();
        let mut resampler = EventResampler::new(&dist);
        let ctx = CalendarContext::new(2023, 15, "CO".parse().unwrap()).unwrap();
        let draw = resampler.draw(&mut chain_rng(3, 1, Activity::Cooking), 100, &ctx);
        assert_eq!(draw, EventDraw { duration_steps: 2, magnitude: 1800.0 });
    }
}
