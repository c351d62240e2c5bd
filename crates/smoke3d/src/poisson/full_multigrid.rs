//! Full multigrid: a cascade that solves the coarsest level first and
//! refines upward, handing each intermediate level to a nested V-cycle
//! solver.
//!
//! Fewer sweeps per level with more V-cycles per refinement beats the
//! opposite split, especially on high-divergence frames; the cascade's
//! whole point is the superior initial guess it delivers at the finest
//! level.

use crate::constants::COARSEST_LEVEL_SWEEPS;
use crate::poisson::multigrid::{level_dims, MultigridSolver};
use crate::poisson::stencil::{
    downsample, prolongate_overwrite, relax, relax_with_zero_guess, residual_norm, restrict_volume,
};
use crate::volume::GridVolume;

/// Grids narrower than this skip the cascade and fall back to a plain
/// V-cycle.
const MIN_CASCADE_WIDTH: usize = 32;

const DEFAULT_NESTED_ITERATIONS: usize = 2;

struct FmgLevel {
    u: GridVolume,
    b: GridVolume,
    /// Relaxation ping buffer.
    ping: GridVolume,
}

impl FmgLevel {
    fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            u: GridVolume::new(width, height, depth),
            b: GridVolume::new(width, height, depth),
            ping: GridVolume::new(width, height, depth),
        }
    }
}

pub struct FullMultigridSolver {
    nested: MultigridSolver,
    dims: Vec<(usize, usize, usize)>,
    /// Hierarchy levels 1.. (level 0 is the caller's pair).
    levels: Vec<FmgLevel>,
    /// Full-size ping buffer for the level-0 down-sweep relaxation.
    temp: GridVolume,
    num_nested_iterations: usize,
}

impl FullMultigridSolver {
    pub fn new(width: usize, height: usize, depth: usize, min_grid_width: usize) -> Self {
        let dims = level_dims(width, height, depth, min_grid_width);
        let levels = dims[1..]
            .iter()
            .map(|&(w, h, d)| FmgLevel::new(w, h, d))
            .collect();
        Self {
            nested: MultigridSolver::new(width, height, depth, min_grid_width),
            dims,
            levels,
            temp: GridVolume::new(width, height, depth),
            num_nested_iterations: DEFAULT_NESTED_ITERATIONS,
        }
    }

    /// V-cycle count the cascade runs per refined level.
    pub fn set_nested_iterations(&mut self, iterations: usize) {
        self.num_nested_iterations = iterations.max(1);
    }

    pub fn solve(
        &mut self,
        u: &mut GridVolume,
        b: &GridVolume,
        cell_size: f32,
        iterations: usize,
    ) {
        assert!(
            u.dims() == self.dims[0] && b.dims() == self.dims[0],
            "solver initialized for {:?}, got {:?}",
            self.dims[0],
            u.dims()
        );

        if self.dims[0].0 < MIN_CASCADE_WIDTH || self.levels.is_empty() {
            self.nested.solve(u, b, cell_size, 1);
            return;
        }

        for i in 0..iterations {
            self.iterate(u, b, cell_size, i == 0);
        }
        if log::log_enabled!(log::Level::Debug) {
            let (avg, max) = residual_norm(u, b, cell_size);
            log::debug!("full multigrid: avg |r| = {:.8}, max |r| = {:.8}", avg, max);
        }
    }

    fn iterate(
        &mut self,
        u0: &mut GridVolume,
        b0: &GridVolume,
        cell_size: f32,
        apply_initial_guess: bool,
    ) {
        let l = self.levels.len();

        // Down: one smoothing sweep per level, then push u (and, on the
        // first pass, b) to the next coarser level.
        if apply_initial_guess {
            relax_with_zero_guess(u0, b0, cell_size);
        } else {
            relax(&mut self.temp, u0, b0, cell_size);
            std::mem::swap(u0, &mut self.temp);
        }
        {
            let first = &mut self.levels[0];
            if apply_initial_guess {
                downsample(&mut first.u, u0);
                restrict_volume(&mut first.b, b0);
            } else {
                restrict_volume(&mut first.u, u0);
            }
        }

        let mut h = cell_size * 2.0;
        for i in 1..l {
            let (head, tail) = self.levels.split_at_mut(i);
            let fine = &mut head[i - 1];
            let coarse = &mut tail[0];

            relax(&mut fine.ping, &fine.u, &fine.b, h);
            std::mem::swap(&mut fine.u, &mut fine.ping);

            if apply_initial_guess {
                downsample(&mut coarse.u, &fine.u);
                restrict_volume(&mut coarse.b, &fine.b);
            } else {
                restrict_volume(&mut coarse.u, &fine.u);
            }
            h *= 2.0;
        }

        // Coarsest level: solve outright from zero.
        {
            let last = &mut self.levels[l - 1];
            relax_with_zero_guess(&mut last.u, &last.b, h);
            for _ in 0..COARSEST_LEVEL_SWEEPS {
                relax(&mut last.ping, &last.u, &last.b, h);
                std::mem::swap(&mut last.u, &mut last.ping);
            }
        }

        // Up: upsample the solution and let the nested solver polish it.
        for i in (1..l).rev() {
            h *= 0.5;
            let (head, tail) = self.levels.split_at_mut(i);
            let fine = &mut head[i - 1];
            prolongate_overwrite(&mut fine.u, &tail[0].u);
            self.nested
                .solve(&mut fine.u, &fine.b, h, self.num_nested_iterations);
        }

        prolongate_overwrite(u0, &self.levels[0].u);
        self.nested
            .solve(u0, b0, cell_size, self.num_nested_iterations);
    }
}
