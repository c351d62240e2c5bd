//! Multigrid-preconditioned conjugate gradient.
//!
//! A standard PCG loop over the 7-point Laplacian, with one multigrid
//! V-cycle as the preconditioner application. The `aux` volume carries the
//! stencil product q and the preconditioned residual z in turn; their live
//! ranges never overlap. The scalars rho/alpha/beta stay in locals between
//! iterations.

use crate::poisson::multigrid::MultigridSolver;
use crate::poisson::stencil::{apply_stencil, axpy, dot, residual_norm, scaled_add, xpay};
use crate::volume::GridVolume;

pub struct MgpcgSolver {
    preconditioner: MultigridSolver,
    residual: GridVolume,
    aux: GridVolume,
    search: GridVolume,
}

impl MgpcgSolver {
    pub fn new(width: usize, height: usize, depth: usize, min_grid_width: usize) -> Self {
        Self {
            preconditioner: MultigridSolver::new(width, height, depth, min_grid_width),
            residual: GridVolume::new(width, height, depth),
            aux: GridVolume::new(width, height, depth),
            search: GridVolume::new(width, height, depth),
        }
    }

    /// Run `iterations` CG steps on `A u = b`, preconditioned by one
    /// V-cycle per application. `u` doubles as the initial guess.
    pub fn solve(&mut self, u: &mut GridVolume, b: &GridVolume, cell_size: f32, iterations: usize) {
        assert!(
            u.same_dims(&self.residual) && b.same_dims(&self.residual),
            "solver initialized for {:?}, got {:?}",
            self.residual.dims(),
            u.dims()
        );

        // r = b - A u
        apply_stencil(&mut self.aux, u, cell_size);
        scaled_add(&mut self.residual, Some(b), &self.aux, 1.0, -1.0);

        // z = M^-1 r, s = z
        self.preconditioner
            .solve_as_preconditioner(&mut self.aux, &self.residual, cell_size);
        self.search.copy_from(&self.aux);
        let mut rho = dot(&self.residual, &self.aux);

        for iteration in 0..iterations {
            // An exactly-zero rho means the residual already vanished (the
            // zero-RHS case lands here on the first pass).
            if rho == 0.0 || !rho.is_finite() {
                log::debug!("mgpcg: converged after {} iterations", iteration);
                break;
            }

            // q = A s
            apply_stencil(&mut self.aux, &self.search, cell_size);
            let sq = dot(&self.search, &self.aux);
            if sq == 0.0 || !sq.is_finite() {
                break;
            }
            let alpha = rho / sq;

            axpy(u, alpha, &self.search); // p += alpha s
            axpy(&mut self.residual, -alpha, &self.aux); // r -= alpha q

            // z = M^-1 r
            self.preconditioner
                .solve_as_preconditioner(&mut self.aux, &self.residual, cell_size);
            let rho_new = dot(&self.residual, &self.aux);
            let beta = rho_new / rho;

            xpay(&mut self.search, beta, &self.aux); // s = z + beta s
            rho = rho_new;
        }

        if log::log_enabled!(log::Level::Debug) {
            let (avg, max) = residual_norm(u, b, cell_size);
            log::debug!("mgpcg: avg |r| = {:.8}, max |r| = {:.8}", avg, max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poisson::stencil::residual_norm;

    #[test]
    fn test_zero_rhs_fixed_point() {
        let mut solver = MgpcgSolver::new(32, 32, 32, 8);
        let mut u = GridVolume::new(32, 32, 32);
        let b = GridVolume::new(32, 32, 32);
        solver.solve(&mut u, &b, 1.0 / 32.0, 10);
        for v in u.data() {
            assert_eq!(*v, 0.0, "zero RHS must keep u identically zero");
        }
    }

    #[test]
    fn test_converges_fast() {
        let mut b = GridVolume::new(32, 32, 32);
        for k in 0..32 {
            for j in 0..32 {
                for i in 0..32 {
                    let v = ((i * 11 + j * 5 + k * 17) % 23) as f32 / 23.0 - 0.5;
                    b.set(i, j, k, v);
                }
            }
        }
        // Zero-mean load, so the Neumann system is consistent.
        let mean = (b.sum() / b.data().len() as f64) as f32;
        for v in b.data_mut() {
            *v -= mean;
        }
        let h = 1.0 / 32.0;

        let mut solver = MgpcgSolver::new(32, 32, 32, 8);
        let mut u = GridVolume::new(32, 32, 32);
        let (_, before) = residual_norm(&u, &b, h);
        solver.solve(&mut u, &b, h, 8);
        let (_, after) = residual_norm(&u, &b, h);

        assert!(
            after < before * 0.01,
            "8 preconditioned iterations should drop the residual 100x: {} -> {}",
            before,
            after
        );
    }

    #[test]
    fn test_warm_start_converges_further() {
        let mut b = GridVolume::new(32, 32, 32);
        b.set(16, 16, 16, 1.0);
        b.set(8, 16, 16, -1.0);
        let h = 1.0 / 32.0;

        let mut solver = MgpcgSolver::new(32, 32, 32, 8);
        let mut u = GridVolume::new(32, 32, 32);
        solver.solve(&mut u, &b, h, 4);
        let (_, first) = residual_norm(&u, &b, h);
        solver.solve(&mut u, &b, h, 4);
        let (_, second) = residual_norm(&u, &b, h);

        assert!(
            second <= first,
            "a warm-started solve must not regress: {} -> {}",
            first,
            second
        );
    }
}
