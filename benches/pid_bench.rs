// Cost of one control step: the pure arithmetic, and a full engine tick
// (lock, read row, compute, write back) against a pre-filled store.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::{hint::black_box, time::Duration};

use pendulum_pid::{
    AxisConfig, ControllerState, PidConfig, PidEngine, Sample, TimeSeriesStore,
    control::engine::compute_step,
};

const ROWS: usize = 1_000;
const DT: f64 = 0.1;

fn full_pid() -> PidConfig {
    PidConfig::new(
        AxisConfig::enabled(0.8),
        AxisConfig::enabled(0.05),
        AxisConfig::enabled(0.01),
    )
}

fn compute_step_bench(c: &mut Criterion) {
    let gains = full_pid().effective_gains();
    let mut state = ControllerState::default();

    c.bench_function("pid_compute_step", |b| {
        b.iter(|| {
            compute_step(
                black_box(&gains),
                &mut state,
                black_box(50.0),
                black_box(40.0),
                black_box(DT),
            )
        })
    });
}

fn engine_tick_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("pid_engine_tick");
    group.measurement_time(Duration::from_secs(2));
    let config = full_pid();

    group.bench_function("tick", |b| {
        b.iter_batched(
            || {
                // SETUP: fresh store and engine so every tick has a row to process
                let store = TimeSeriesStore::with_samples(
                    (0..ROWS).map(|k| Sample::new(k as f64 * DT, 50.0, 40.0)),
                );
                (store, PidEngine::new())
            },
            |(store, mut engine)| {
                for _ in 0..ROWS {
                    black_box(engine.tick(&store, &config, DT));
                }
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, compute_step_bench, engine_tick_bench);
criterion_main!(benches);
