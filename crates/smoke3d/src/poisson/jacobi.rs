//! Damped Jacobi as a standalone solver.
//!
//! The sweep is double-buffered through an internal ping volume, so the
//! result is independent of cell visit order. Slow, but the baseline every
//! other solver is measured against.

use crate::poisson::stencil;
use crate::volume::GridVolume;

pub struct DampedJacobiSolver {
    ping: GridVolume,
}

impl DampedJacobiSolver {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            ping: GridVolume::new(width, height, depth),
        }
    }

    /// Run `iterations` damped sweeps on `u` in place.
    pub fn solve(&mut self, u: &mut GridVolume, b: &GridVolume, cell_size: f32, iterations: usize) {
        assert!(
            u.same_dims(&self.ping) && b.same_dims(&self.ping),
            "solver initialized for {:?}, got {:?}",
            self.ping.dims(),
            u.dims()
        );
        for _ in 0..iterations {
            stencil::relax(&mut self.ping, u, b, cell_size);
            std::mem::swap(u, &mut self.ping);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rhs_fixed_point() {
        let mut solver = DampedJacobiSolver::new(8, 8, 8);
        let mut u = GridVolume::new(8, 8, 8);
        let b = GridVolume::new(8, 8, 8);
        solver.solve(&mut u, &b, 0.5, 20);
        for v in u.data() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_reduces_residual() {
        let mut solver = DampedJacobiSolver::new(16, 16, 16);
        let mut u = GridVolume::new(16, 16, 16);
        let mut b = GridVolume::new(16, 16, 16);
        b.set(8, 8, 8, 1.0);
        b.set(4, 8, 8, -1.0);

        let (_, max_before) = stencil::residual_norm(&u, &b, 0.5);
        solver.solve(&mut u, &b, 0.5, 50);
        let (_, max_after) = stencil::residual_norm(&u, &b, 0.5);

        assert!(
            max_after < max_before * 0.5,
            "50 sweeps should halve the residual: {} -> {}",
            max_before,
            max_after
        );
    }
}
