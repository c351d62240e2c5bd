//! Headless plume run: step the simulator and print field statistics so a
//! solver change can be sanity-checked without the renderer.
//!
//! Run with: cargo run --release --example smoke_plume

use smoke3d::{FluidConfig, FluidSimulator, Operation};

fn main() {
    env_logger::init();

    let mut config = FluidConfig::default();
    config.grid_size = [64, 64, 64];
    config.domain_size = 1.0;

    let mut sim = FluidSimulator::new(config);
    let dt = 1.0 / 60.0;

    println!(
        "{:>6} {:>12} {:>12} {:>12} {:>12}",
        "frame", "max rho", "sum rho", "max |v|", "max |r|"
    );
    for frame in 0..120u32 {
        sim.update(dt, frame as f64 * dt as f64, frame);

        if frame % 10 == 9 {
            let max_velocity = sim
                .velocity
                .x
                .max_abs()
                .max(sim.velocity.y.max_abs())
                .max(sim.velocity.z.max_abs());
            let (_, max_residual) = sim.pressure_residual_norm();
            println!(
                "{:>6} {:>12.4} {:>12.1} {:>12.4} {:>12.3e}",
                frame + 1,
                sim.density.max_abs(),
                sim.density.sum(),
                max_velocity,
                max_residual
            );
        }
    }

    println!("\nper-phase cost (rolling average, us):");
    for op in Operation::ALL {
        println!("{:>20?} {:>10.0}", op, sim.metrics().average_cost(op));
    }
    println!("{:>20} {:>10.1}", "fps", sim.metrics().frame_rate());
}
