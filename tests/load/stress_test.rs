//! Schedule generation under load
//!
//! - One-minute resolution with a large household
//! - Many independent runs on parallel threads
//! - Shared fixtures saturated by occupants

use std::thread;
use std::time::{Duration, Instant};

use occupancy_schedules::domain::{default_end_uses, CalendarContext};
use occupancy_schedules::export::schedules_to_string;
use occupancy_schedules::params::ParameterStore;
use occupancy_schedules::simulation::{GeneratedSchedules, ScheduleGenerator};

fn run(year: i32, minutes_per_step: u32, occupants: f64, seed: u64) -> (CalendarContext, GeneratedSchedules) {
    let store = ParameterStore::reference().unwrap();
    let ctx = CalendarContext::new(year, minutes_per_step, "CO".parse().unwrap())
        .unwrap()
        .with_occupants(occupants)
        .unwrap()
        .with_random_seed(seed);
    let generated = ScheduleGenerator::new(&ctx, store.for_state(ctx.state()))
        .generate()
        .unwrap();
    (ctx, generated)
}

/// A year at one-minute steps for eight occupants stays within a minute
#[test]
#[ignore]
fn test_minute_resolution_large_household() {
    let start = Instant::now();
    let (ctx, generated) = run(2024, 1, 8.0, 1);
    let elapsed = start.elapsed();

    println!(
        "{} steps x {} chains in {:?} ({} events, {} deferred)",
        generated.diagnostics.steps,
        generated.diagnostics.chains,
        elapsed,
        generated.diagnostics.stepper.events_started,
        generated.diagnostics.aggregation.events_deferred,
    );
    assert_eq!(generated.table.rows(), ctx.total_steps());
    assert_eq!(ctx.total_steps(), 527_040);
    assert!(elapsed < Duration::from_secs(60), "generation took {:?}", elapsed);
}

/// Parallel runs produce exactly what sequential runs produce
#[test]
#[ignore]
fn test_parallel_runs_match_sequential() {
    let seeds: Vec<u64> = (1..=8).collect();

    let sequential: Vec<String> = seeds
        .iter()
        .map(|&seed| {
            let (ctx, generated) = run(2023, 10, 3.0, seed);
            schedules_to_string(&generated.table, &ctx).unwrap()
        })
        .collect();

    let handles: Vec<_> = seeds
        .iter()
        .map(|&seed| {
            thread::spawn(move || {
                let (ctx, generated) = run(2023, 10, 3.0, seed);
                schedules_to_string(&generated.table, &ctx).unwrap()
            })
        })
        .collect();
    let parallel: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(sequential, parallel);
}

/// Many occupants contend for every shared fixture
#[test]
#[ignore]
fn test_saturated_shared_fixtures() {
    let (_, generated) = run(2023, 5, 12.0, 3);
    let aggregation = &generated.diagnostics.aggregation;
    println!("{:?}", aggregation);

    assert!(aggregation.events_deferred > 0);
    for spec in default_end_uses().iter().filter(|s| s.shared) {
        let series = generated.table.get(&spec.name).unwrap();
        assert!(series.peak() <= 1.0 + 1e-9, "{} normalized peak", spec.name);
    }
}
