//! Compare residual decay across the Poisson solvers on one synthetic
//! right-hand side.
//!
//! Run with: cargo run --release --example solver_convergence

use smoke3d::poisson::{residual_norm, PressureSolver};
use smoke3d::{GridVolume, PoissonMethod};

fn main() {
    env_logger::init();

    let n = 64;
    let h = 1.0 / n as f32;

    // A mixed-frequency RHS, centred so the Neumann problem is solvable.
    let mut b = GridVolume::new(n, n, n);
    b.fill_with(|i, j, k| {
        let x = (i as f32 + 0.5) / n as f32;
        let y = (j as f32 + 0.5) / n as f32;
        let z = (k as f32 + 0.5) / n as f32;
        let pi = std::f32::consts::PI;
        (pi * x).sin() * (pi * y).sin() * (pi * z).sin()
            + 0.25 * (8.0 * pi * x).sin() * (8.0 * pi * z).cos()
    });
    let mean = (b.sum() / b.data().len() as f64) as f32;
    for v in b.data_mut() {
        *v -= mean;
    }
    let b_max = b.max_abs();

    println!("{:>14} {:>6} {:>14} {:>14}", "solver", "iters", "avg |r|", "max |r|");
    for (name, method, schedule) in [
        ("jacobi", PoissonMethod::DampedJacobi, [10, 40, 160].as_slice()),
        ("multigrid", PoissonMethod::MultiGrid, [1, 2, 4].as_slice()),
        ("fmg", PoissonMethod::FullMultiGrid, [1, 2, 4].as_slice()),
        ("mgpcg", PoissonMethod::Mgpcg, [1, 2, 4, 8].as_slice()),
    ] {
        for &iterations in schedule {
            let mut solver = PressureSolver::new(method, n, n, n, 8);
            let mut u = GridVolume::new(n, n, n);
            let start = std::time::Instant::now();
            solver.solve(&mut u, &b, h, iterations);
            let elapsed = start.elapsed();
            let (avg, max) = residual_norm(&u, &b, h);
            println!(
                "{:>14} {:>6} {:>14.3e} {:>14.3e}   ({:.1?})",
                name, iterations, avg, max, elapsed
            );
        }
    }
    println!("\ninitial max |b| = {:.3e}", b_max);
}
