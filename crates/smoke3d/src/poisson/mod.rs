//! Poisson solvers for the pressure projection.
//!
//! Four interchangeable strategies sit behind [`PressureSolver`], a tagged
//! enum dispatched statically inside the frame loop. All of them solve the
//! 7-point Laplacian system `A u = b` in place on `u`, treating `u` as the
//! initial guess.

pub mod full_multigrid;
pub mod jacobi;
pub mod mgpcg;
pub mod multigrid;
pub mod stencil;

pub use full_multigrid::FullMultigridSolver;
pub use jacobi::DampedJacobiSolver;
pub use mgpcg::MgpcgSolver;
pub use multigrid::MultigridSolver;
pub use stencil::residual_norm;

use crate::config::PoissonMethod;
use crate::volume::GridVolume;

/// A pressure solver constructed for one grid size.
pub enum PressureSolver {
    DampedJacobi(DampedJacobiSolver),
    MultiGrid(MultigridSolver),
    FullMultiGrid(FullMultigridSolver),
    Mgpcg(MgpcgSolver),
}

impl PressureSolver {
    /// Build the solver for `method` on a `width x height x depth` grid.
    /// `min_grid_width` bounds the coarsest multigrid level.
    pub fn new(
        method: PoissonMethod,
        width: usize,
        height: usize,
        depth: usize,
        min_grid_width: usize,
    ) -> Self {
        match method {
            // Plain Jacobi shares the damped implementation; the damping
            // only helps it.
            PoissonMethod::Jacobi | PoissonMethod::DampedJacobi => {
                Self::DampedJacobi(DampedJacobiSolver::new(width, height, depth))
            }
            PoissonMethod::MultiGrid => {
                Self::MultiGrid(MultigridSolver::new(width, height, depth, min_grid_width))
            }
            PoissonMethod::FullMultiGrid => Self::FullMultiGrid(FullMultigridSolver::new(
                width,
                height,
                depth,
                min_grid_width,
            )),
            PoissonMethod::Mgpcg => {
                Self::Mgpcg(MgpcgSolver::new(width, height, depth, min_grid_width))
            }
        }
    }

    /// Solve `A u = b` in place; `iterations` is the solver's outer-loop
    /// count (sweeps, V-cycles, cascade passes, or CG steps).
    pub fn solve(
        &mut self,
        u: &mut GridVolume,
        b: &GridVolume,
        cell_size: f32,
        iterations: usize,
    ) {
        match self {
            Self::DampedJacobi(solver) => solver.solve(u, b, cell_size, iterations),
            Self::MultiGrid(solver) => solver.solve(u, b, cell_size, iterations),
            Self::FullMultiGrid(solver) => solver.solve(u, b, cell_size, iterations),
            Self::Mgpcg(solver) => solver.solve(u, b, cell_size, iterations),
        }
    }
}
