//! Geometric multigrid V-cycle solver.
//!
//! The hierarchy halves every dimension per level until the smallest would
//! drop below the configured floor. Level 0 is the caller's (u, b) pair;
//! coarser levels own their volumes. Relaxation counts follow the
//! down-sweep schedule 2, 4, 6, ... with the mirror image on the way up,
//! and the coarsest level gets one zero-guess sweep plus
//! `COARSEST_LEVEL_SWEEPS` plain ones.
//!
//! `solve` may also be called with a volume matching any coarser level of
//! the hierarchy; the cycle then starts at that level. The full-multigrid
//! cascade leans on this to smooth its intermediate levels.

use crate::constants::COARSEST_LEVEL_SWEEPS;
use crate::poisson::stencil::{
    prolongate_add, relax, relax_with_zero_guess, residual, residual_norm, restrict_volume,
};
use crate::volume::GridVolume;

/// One coarse level of the hierarchy: solution, right-hand side, and a
/// residual volume that doubles as the relaxation ping buffer.
struct MgLevel {
    u: GridVolume,
    b: GridVolume,
    r: GridVolume,
}

impl MgLevel {
    fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            u: GridVolume::new(width, height, depth),
            b: GridVolume::new(width, height, depth),
            r: GridVolume::new(width, height, depth),
        }
    }
}

/// Dimension chain for a hierarchy: full size first, halved per level while
/// the smallest dimension stays at or above the floor.
pub(crate) fn level_dims(
    width: usize,
    height: usize,
    depth: usize,
    min_grid_width: usize,
) -> Vec<(usize, usize, usize)> {
    let floor = min_grid_width.max(2);
    let mut dims = vec![(width, height, depth)];
    let (mut w, mut h, mut d) = (width, height, depth);
    while w.min(h).min(d) / 2 >= floor {
        w /= 2;
        h /= 2;
        d /= 2;
        dims.push((w, h, d));
    }
    dims
}

pub struct MultigridSolver {
    dims: Vec<(usize, usize, usize)>,
    /// Relaxation ping buffer for the finest level.
    finest_scratch: GridVolume,
    /// Hierarchy levels 1.. (level 0 belongs to the caller).
    levels: Vec<MgLevel>,
}

/// `sweeps` damped Jacobi sweeps on (u, b), the first optionally collapsed
/// to the zero-guess form. `ping` is clobbered.
fn smooth(
    u: &mut GridVolume,
    b: &GridVolume,
    ping: &mut GridVolume,
    cell_size: f32,
    zero_guess: bool,
    sweeps: usize,
) {
    if sweeps == 0 {
        return;
    }
    let mut remaining = sweeps;
    if zero_guess {
        relax_with_zero_guess(u, b, cell_size);
        remaining -= 1;
    }
    for _ in 0..remaining {
        relax(ping, u, b, cell_size);
        std::mem::swap(u, ping);
    }
}

impl MultigridSolver {
    pub fn new(width: usize, height: usize, depth: usize, min_grid_width: usize) -> Self {
        let dims = level_dims(width, height, depth, min_grid_width);
        let levels = dims[1..]
            .iter()
            .map(|&(w, h, d)| MgLevel::new(w, h, d))
            .collect();
        Self {
            dims,
            finest_scratch: GridVolume::new(width, height, depth),
            levels,
        }
    }

    pub fn num_levels(&self) -> usize {
        self.dims.len()
    }

    fn start_level(&self, u: &GridVolume) -> usize {
        self.dims
            .iter()
            .position(|&d| d == u.dims())
            .unwrap_or_else(|| {
                panic!(
                    "solver initialized for {:?}, got a {:?} volume",
                    self.dims[0],
                    u.dims()
                )
            })
    }

    /// Run `iterations` V-cycles on (u, b), keeping `u` as the initial
    /// guess.
    pub fn solve(
        &mut self,
        u: &mut GridVolume,
        b: &GridVolume,
        cell_size: f32,
        iterations: usize,
    ) {
        assert!(u.same_dims(b), "u and b must share dimensions");
        let start = self.start_level(u);
        for _ in 0..iterations {
            self.v_cycle(start, u, b, cell_size, false);
        }
        if log::log_enabled!(log::Level::Debug) {
            let (avg, max) = residual_norm(u, b, cell_size);
            log::debug!("multigrid: avg |r| = {:.8}, max |r| = {:.8}", avg, max);
        }
    }

    /// One V-cycle that overwrites `u`, routing the first sweep through the
    /// zero-guess relaxation. This is the preconditioner entry point.
    pub fn solve_as_preconditioner(&mut self, u: &mut GridVolume, b: &GridVolume, cell_size: f32) {
        assert!(u.same_dims(b), "u and b must share dimensions");
        let start = self.start_level(u);
        self.v_cycle(start, u, b, cell_size, true);
    }

    fn v_cycle(
        &mut self,
        start: usize,
        u0: &mut GridVolume,
        b0: &GridVolume,
        cell_size: f32,
        zero_guess: bool,
    ) {
        let (ping, chain) = if start == 0 {
            (&mut self.finest_scratch, &mut self.levels[..])
        } else {
            let (head, tail) = self.levels.split_at_mut(start);
            (&mut head[start - 1].r, tail)
        };

        if chain.is_empty() {
            // Degenerate hierarchy: relax as if this were the coarsest level.
            smooth(u0, b0, ping, cell_size, zero_guess, 1 + COARSEST_LEVEL_SWEEPS);
            return;
        }

        let mut times_to_iterate = 2usize;
        let mut h = cell_size;
        let l = chain.len();

        // Finest level down-sweep.
        smooth(u0, b0, ping, h, zero_guess, times_to_iterate);
        residual(ping, u0, b0, h);
        restrict_volume(&mut chain[0].b, ping);
        times_to_iterate += 2;
        h *= 2.0;

        for idx in 0..l - 1 {
            let (head, tail) = chain.split_at_mut(idx + 1);
            let cur = &mut head[idx];
            let next = &mut tail[0];

            smooth(&mut cur.u, &cur.b, &mut cur.r, h, true, times_to_iterate);
            residual(&mut cur.r, &cur.u, &cur.b, h);
            restrict_volume(&mut next.b, &cur.r);
            times_to_iterate += 2;
            h *= 2.0;
        }

        // Coarsest solve.
        {
            let last = &mut chain[l - 1];
            smooth(
                &mut last.u,
                &last.b,
                &mut last.r,
                h,
                true,
                1 + COARSEST_LEVEL_SWEEPS,
            );
        }

        // Up-sweep: prolongate the correction and re-smooth.
        for idx in (0..l - 1).rev() {
            times_to_iterate -= 2;
            h *= 0.5;
            let (head, tail) = chain.split_at_mut(idx + 1);
            let cur = &mut head[idx];
            prolongate_add(&mut cur.u, &tail[0].u);
            smooth(&mut cur.u, &cur.b, &mut cur.r, h, false, times_to_iterate);
        }

        times_to_iterate -= 2;
        h *= 0.5;
        prolongate_add(u0, &chain[0].u);
        smooth(u0, b0, ping, h, false, times_to_iterate);
    }
}
