//! Grid-based smoke simulation with a multi-resolution pressure core.
//!
//! Each frame advects density, temperature, and the velocity itself,
//! injects heat and smoke at an emitter, and projects the velocity back
//! onto the divergence-free subspace by solving the pressure Poisson
//! equation. The Poisson solve is where the engineering lives: a damped
//! Jacobi baseline, a geometric multigrid V-cycle, a full-multigrid
//! cascade, and a multigrid-preconditioned conjugate gradient all sit
//! behind one interface.
//!
//! # Example
//!
//! ```
//! use smoke3d::{FluidConfig, FluidSimulator};
//!
//! let mut config = FluidConfig::default();
//! config.grid_size = [32, 32, 32];
//! config.domain_size = 1.0;
//!
//! let mut sim = FluidSimulator::new(config);
//! for frame in 0..3 {
//!     sim.update(1.0 / 60.0, frame as f64 / 60.0, frame);
//! }
//! let (_, max_residual) = sim.pressure_residual_norm();
//! assert!(max_residual.is_finite());
//! ```

pub mod advection;
pub mod config;
pub mod constants;
pub mod forcing;
pub mod metrics;
pub mod poisson;
pub mod projection;
pub mod simulator;
pub mod volume;
pub mod vorticity;

pub use config::{AdvectionMethod, FluidConfig, FluidImpulse, PoissonMethod};
pub use metrics::{FrameMetrics, Operation};
pub use glam::Vec3;
pub use poisson::PressureSolver;
pub use projection::BoundaryParams;
pub use simulator::FluidSimulator;
pub use volume::{GridVolume, VectorVolume};
