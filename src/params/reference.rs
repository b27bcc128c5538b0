//! Built-in reference parameter set
//!
//! Synthetic tables shaped after typical residential survey patterns: a 15-minute
//! Markov chain with hourly bins, split by weekday and weekend. Used when no
//! parameter file is configured and as the fallback state in tests.

use crate::domain::{Activity, DayType};
use crate::error::Result;

use super::{EventDistribution, FollowOn, ParameterStore, StateParameters, StateSpec, TransitionTable};

pub const REFERENCE_STATE: &str = "CO";

const DAY_TYPES: [DayType; 2] = [DayType::Weekday, DayType::Weekend];

/// Per-15-minute probability of waking when asleep
fn wake_probability(hour: u16) -> f64 {
    match hour {
        0..=4 => 0.01,
        5 => 0.10,
        6 | 7 => 0.30,
        8..=21 => 0.40,
        _ => 0.05,
    }
}

fn sleep_probability(day_type: DayType, hour: u16) -> f64 {
    match (day_type, hour) {
        (_, 0..=2) => 0.35,
        (_, 3 | 4) => 0.50,
        (DayType::Weekday, 22) => 0.25,
        (DayType::Weekend, 22) => 0.15,
        (_, 23) => 0.30,
        (DayType::Weekend, 13 | 14) => 0.01,
        _ => 0.0,
    }
}

fn leave_probability(day_type: DayType, hour: u16) -> f64 {
    match (day_type, hour) {
        (DayType::Weekday, 7 | 8) => 0.15,
        (DayType::Weekday, 9..=11) => 0.04,
        (DayType::Weekday, 12..=17) => 0.03,
        (DayType::Weekday, 18..=20) => 0.02,
        (DayType::Weekend, 9..=18) => 0.04,
        (DayType::Weekend, 19..=21) => 0.02,
        _ => 0.0,
    }
}

fn return_probability(day_type: DayType, hour: u16) -> f64 {
    match (day_type, hour) {
        (DayType::Weekday, 0..=6) => 0.05,
        (DayType::Weekday, 7..=14) => 0.01,
        (DayType::Weekday, 15) => 0.06,
        (DayType::Weekday, 16..=18) => 0.15,
        (DayType::Weekday, _) => 0.12,
        (DayType::Weekend, 0..=8) => 0.05,
        (DayType::Weekend, 9..=14) => 0.06,
        (DayType::Weekend, _) => 0.10,
    }
}

fn presence_table() -> Result<TransitionTable> {
    let states = vec![
        StateSpec::new("asleep", 1.0),
        StateSpec::new("active", 1.0).accepting_events(),
        StateSpec::new("away", 0.0),
    ];
    let mut builder = TransitionTable::builder(Activity::Presence, states).initial(vec![0.9, 0.05, 0.05]);

    for day_type in DAY_TYPES {
        for hour in 0..24u16 {
            let wake = wake_probability(hour);
            let sleep = sleep_probability(day_type, hour);
            let leave = leave_probability(day_type, hour);
            let back = return_probability(day_type, hour);
            builder = builder
                .row(day_type, hour, "asleep", vec![1.0 - wake, wake, 0.0])
                .row(day_type, hour, "active", vec![sleep, 1.0 - sleep - leave, leave])
                .row(day_type, hour, "away", vec![0.0, back, 1.0 - back]);
        }
    }
    builder.build()
}

/// Off/on fixture chain whose "on" entry starts a resampled event.
///
/// `weekday` and `weekend` are per-15-minute start probabilities by hour.
fn fixture_table(activity: Activity, weekday: [f64; 24], weekend: [f64; 24]) -> Result<TransitionTable> {
    let states = vec![StateSpec::new("off", 0.0), StateSpec::new("on", 0.0).triggering()];
    let mut builder = TransitionTable::builder(activity, states);

    for (day_type, profile) in [(DayType::Weekday, weekday), (DayType::Weekend, weekend)] {
        for (hour, start) in profile.iter().enumerate() {
            builder = builder
                .row(day_type, hour as u16, "off", vec![1.0 - start, *start])
                .row(day_type, hour as u16, "on", vec![1.0, 0.0]);
        }
    }
    builder.build()
}

fn plug_load_table() -> Result<TransitionTable> {
    let states = vec![StateSpec::new("standby", 0.3), StateSpec::new("in_use", 1.0)];
    let mut builder = TransitionTable::builder(Activity::PlugLoads, states);

    for day_type in DAY_TYPES {
        for hour in 0..24u16 {
            let (up, down) = match (day_type, hour) {
                (_, 0..=5) => (0.01, 0.40),
                (DayType::Weekday, 9..=15) => (0.04, 0.20),
                (_, 17..=22) => (0.20, 0.08),
                _ => (0.10, 0.15),
            };
            builder = builder
                .row(day_type, hour, "standby", vec![1.0 - up, up])
                .row(day_type, hour, "in_use", vec![down, 1.0 - down]);
        }
    }
    builder.build()
}

#[rustfmt::skip]
const SHOWER_WEEKDAY: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.02, 0.08, 0.08, 0.04, 0.01, 0.005, 0.005,
    0.005, 0.005, 0.005, 0.005, 0.005, 0.01, 0.01, 0.01, 0.02, 0.03, 0.02, 0.005,
];
#[rustfmt::skip]
const SHOWER_WEEKEND: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.01, 0.03, 0.06, 0.06, 0.04, 0.02,
    0.01, 0.005, 0.005, 0.005, 0.005, 0.01, 0.01, 0.01, 0.02, 0.03, 0.02, 0.005,
];
#[rustfmt::skip]
const BATH_PROFILE: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.001, 0.001, 0.001, 0.001, 0.001, 0.001,
    0.001, 0.001, 0.001, 0.001, 0.001, 0.002, 0.003, 0.005, 0.006, 0.005, 0.002, 0.0,
];
#[rustfmt::skip]
const COOKING_WEEKDAY: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.005, 0.02, 0.03, 0.01, 0.005, 0.005, 0.02,
    0.03, 0.01, 0.005, 0.005, 0.01, 0.04, 0.06, 0.03, 0.01, 0.005, 0.0, 0.0,
];
#[rustfmt::skip]
const COOKING_WEEKEND: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.005, 0.02, 0.04, 0.04, 0.02, 0.03,
    0.03, 0.02, 0.01, 0.01, 0.02, 0.04, 0.06, 0.03, 0.01, 0.005, 0.0, 0.0,
];
#[rustfmt::skip]
const DISHWASHER_PROFILE: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.002, 0.004, 0.003, 0.002, 0.002,
    0.002, 0.004, 0.003, 0.002, 0.002, 0.002, 0.003, 0.008, 0.010, 0.008, 0.004, 0.001,
];
#[rustfmt::skip]
const WASHER_WEEKDAY: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.001, 0.002, 0.002, 0.002, 0.002, 0.002,
    0.002, 0.002, 0.002, 0.002, 0.002, 0.003, 0.004, 0.004, 0.003, 0.002, 0.0, 0.0,
];
#[rustfmt::skip]
const WASHER_WEEKEND: [f64; 24] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.002, 0.005, 0.008, 0.008, 0.006,
    0.005, 0.005, 0.004, 0.004, 0.003, 0.003, 0.003, 0.002, 0.002, 0.001, 0.0, 0.0,
];

fn reference_parameters() -> Result<StateParameters> {
    let washer = EventDistribution::weighted(
        Activity::ClothesWasher,
        &[(45, 0.3), (60, 0.5), (75, 0.2)],
        vec![400.0, 500.0, 600.0],
    )?
    .with_follow_on(FollowOn {
        activity: Activity::ClothesDryer,
        probability: 0.8,
        delay_minutes: 10,
    })?;

    StateParameters::new()
        .with_table(presence_table()?)?
        .with_table(fixture_table(Activity::Shower, SHOWER_WEEKDAY, SHOWER_WEEKEND)?)?
        .with_table(fixture_table(Activity::Bath, BATH_PROFILE, BATH_PROFILE)?)?
        .with_table(fixture_table(Activity::Cooking, COOKING_WEEKDAY, COOKING_WEEKEND)?)?
        .with_table(fixture_table(Activity::Dishwasher, DISHWASHER_PROFILE, DISHWASHER_PROFILE)?)?
        .with_table(fixture_table(Activity::ClothesWasher, WASHER_WEEKDAY, WASHER_WEEKEND)?)?
        .with_table(plug_load_table()?)?
        // gallons per minute
        .with_events(EventDistribution::weighted(
            Activity::Shower,
            &[(5, 0.15), (8, 0.25), (10, 0.30), (12, 0.20), (15, 0.10)],
            vec![1.5, 1.8, 2.0, 2.2, 2.5],
        )?)?
        .with_events(EventDistribution::weighted(
            Activity::Bath,
            &[(10, 0.3), (15, 0.5), (20, 0.2)],
            vec![4.0, 5.0],
        )?)?
        // watts
        .with_events(EventDistribution::weighted(
            Activity::Cooking,
            &[(15, 0.30), (30, 0.35), (45, 0.20), (60, 0.15)],
            vec![1200.0, 1800.0, 2400.0],
        )?)?
        .with_events(EventDistribution::weighted(
            Activity::Dishwasher,
            &[(60, 0.3), (90, 0.5), (120, 0.2)],
            vec![1000.0, 1200.0, 1400.0],
        )?)?
        .with_events(washer)?
        .with_events(EventDistribution::weighted(
            Activity::ClothesDryer,
            &[(45, 0.3), (60, 0.5), (75, 0.2)],
            vec![2500.0, 3000.0, 3500.0],
        )?)
}

pub(super) fn reference_store() -> Result<ParameterStore> {
    Ok(ParameterStore::new(REFERENCE_STATE.parse()?, reference_parameters()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TransitionTableProvider;

    #[test]
    fn test_reference_store_builds() {
        let store = ParameterStore::reference().unwrap();
        let params = store.for_state(store.default_state());
        for activity in [
            Activity::Presence,
            Activity::Shower,
            Activity::Bath,
            Activity::Cooking,
            Activity::Dishwasher,
            Activity::ClothesWasher,
            Activity::PlugLoads,
        ] {
            let table = params.transition_table(activity).unwrap();
            // Every (day type, hour, state) combination has a row
            assert_eq!(table.row_count(), 2 * 24 * table.states().len());
        }
        assert!(params.transition_table(Activity::ClothesDryer).is_none());
        assert!(params.event_distribution(Activity::ClothesDryer).is_some());
    }

    #[test]
    fn test_only_active_presence_accepts_events() {
        let table = presence_table().unwrap();
        let accepting: Vec<&str> = table
            .states()
            .iter()
            .filter(|s| s.accepts_events)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(accepting, vec!["active"]);
    }
}
