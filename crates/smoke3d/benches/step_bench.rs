//! Per-frame cost of a full simulation step, by pressure solver.

use criterion::{criterion_group, criterion_main, Criterion};
use smoke3d::{FluidConfig, FluidSimulator, PoissonMethod};

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_48");
    group.sample_size(10);

    for (name, method) in [
        ("jacobi", PoissonMethod::DampedJacobi),
        ("multigrid", PoissonMethod::MultiGrid),
        ("fmg", PoissonMethod::FullMultiGrid),
        ("mgpcg", PoissonMethod::Mgpcg),
    ] {
        group.bench_function(name, |bench| {
            let mut config = FluidConfig::default();
            config.grid_size = [48, 48, 48];
            config.domain_size = 1.0;
            config.poisson_method = method;
            let mut sim = FluidSimulator::new(config);

            let mut frame = 0u32;
            bench.iter(|| {
                sim.update(1.0 / 60.0, frame as f64 / 60.0, frame);
                frame += 1;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
