use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use occupancy_schedules::domain::CalendarContext;
use occupancy_schedules::flexibility::{FlexibilityInputs, PeakHourTable, SetpointModifier, SetpointSeries};
use occupancy_schedules::params::ParameterStore;
use occupancy_schedules::simulation::ScheduleGenerator;

fn bench_generate_year(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_year");
    group.sample_size(10);

    let store = ParameterStore::reference().unwrap();
    for minutes in [60u32, 15] {
        let ctx = CalendarContext::new(2023, minutes, "CO".parse().unwrap())
            .unwrap()
            .with_occupants(2.64)
            .unwrap();
        group.bench_with_input(BenchmarkId::new("minutes_per_step", minutes), &ctx, |b, ctx| {
            b.iter(|| {
                ScheduleGenerator::new(ctx, store.for_state(ctx.state()))
                    .generate()
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_setpoint_flexibility(c: &mut Criterion) {
    let ctx = CalendarContext::new(2023, 15, "CO".parse().unwrap()).unwrap();
    let modifier = SetpointModifier::new(&ctx, FlexibilityInputs::default(), PeakHourTable::builtin()).unwrap();
    let baseline = SetpointSeries::flat(ctx.total_steps(), 71.0, 78.0);

    c.bench_function("setpoint_flexibility_15min", |b| {
        b.iter(|| modifier.apply(black_box(&baseline)).unwrap());
    });
}

criterion_group!(benches, bench_generate_year, bench_setpoint_flexibility);
criterion_main!(benches);
