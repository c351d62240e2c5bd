//! Stencil kernels shared by the Poisson solvers.
//!
//! All operators use the 7-point Laplacian with homogeneous-Neumann
//! boundaries: the clamped volume read substitutes the centre value for an
//! out-of-range neighbour. `relax` is the damped Jacobi sweep with
//! omega = 2/3, double-buffered so the result does not depend on sweep
//! order.

use rayon::prelude::*;

use crate::constants::{OMEGA_OVER_BETA, ONE_MINUS_OMEGA};
use crate::volume::GridVolume;

#[inline]
fn neighbor_sum(p: &GridVolume, i: i32, j: i32, k: i32) -> f32 {
    p.at(i - 1, j, k)
        + p.at(i + 1, j, k)
        + p.at(i, j - 1, k)
        + p.at(i, j + 1, k)
        + p.at(i, j, k - 1)
        + p.at(i, j, k + 1)
}

/// One damped Jacobi sweep: `out = (1 - w) p + w (sum_n - h^2 b) / 6`.
pub fn relax(out: &mut GridVolume, p: &GridVolume, b: &GridVolume, cell_size: f32) {
    debug_assert!(out.same_dims(p) && out.same_dims(b));
    let alpha = -(cell_size * cell_size);
    out.fill_with(|i, j, k| {
        let (ii, jj, kk) = (i as i32, j as i32, k as i32);
        let pc = p.get(i, j, k);
        let sum = neighbor_sum(p, ii, jj, kk);
        ONE_MINUS_OMEGA * pc + (sum + alpha * b.get(i, j, k)) * OMEGA_OVER_BETA
    });
}

/// The first damped sweep starting from p = 0, collapsed to a single
/// pointwise scale: `p = -h^2 b / 9`.
pub fn relax_with_zero_guess(p: &mut GridVolume, b: &GridVolume, cell_size: f32) {
    debug_assert!(p.same_dims(b));
    let alpha_omega_over_beta = -(cell_size * cell_size) * OMEGA_OVER_BETA;
    p.fill_with(|i, j, k| alpha_omega_over_beta * b.get(i, j, k));
}

/// Residual `r = b - (sum_n - 6 p) / h^2`.
pub fn residual(r: &mut GridVolume, p: &GridVolume, b: &GridVolume, cell_size: f32) {
    debug_assert!(r.same_dims(p) && r.same_dims(b));
    let inv_h_square = 1.0 / (cell_size * cell_size);
    r.fill_with(|i, j, k| {
        let (ii, jj, kk) = (i as i32, j as i32, k as i32);
        let pc = p.get(i, j, k);
        let sum = neighbor_sum(p, ii, jj, kk);
        b.get(i, j, k) - (sum - 6.0 * pc) * inv_h_square
    });
}

/// The Laplacian itself, `q = (sum_n - 6 s) / h^2`, applied by the
/// conjugate-gradient loop.
pub fn apply_stencil(q: &mut GridVolume, s: &GridVolume, cell_size: f32) {
    debug_assert!(q.same_dims(s));
    let inv_h_square = 1.0 / (cell_size * cell_size);
    q.fill_with(|i, j, k| {
        let (ii, jj, kk) = (i as i32, j as i32, k as i32);
        let sc = s.get(i, j, k);
        let sum = neighbor_sum(s, ii, jj, kk);
        (sum - 6.0 * sc) * inv_h_square
    });
}

/// Full-weighting restriction: a 27-tap average of the fine neighbourhood
/// centred on `2c`, with weights 1/8, 1/16, 1/32, 1/64 summing to one.
pub fn restrict_volume(coarse: &mut GridVolume, fine: &GridVolume) {
    coarse.fill_with(|i, j, k| {
        let ci = 2 * i as i32;
        let cj = 2 * j as i32;
        let ck = 2 * k as i32;
        let mut sum = 0.0;
        for dk in -1..=1i32 {
            for dj in -1..=1i32 {
                for di in -1..=1i32 {
                    let taps = (di != 0) as u32 + (dj != 0) as u32 + (dk != 0) as u32;
                    let weight = 0.125 * 0.5f32.powi(taps as i32);
                    sum += weight * fine.at(ci + di, cj + dj, ck + dk);
                }
            }
        }
        sum
    });
}

/// Straight injection: `coarse(c) = fine(2c)`. Used by the FMG cascade to
/// push a warm solution down without smearing it.
pub fn downsample(coarse: &mut GridVolume, fine: &GridVolume) {
    coarse.fill_with(|i, j, k| fine.at(2 * i as i32, 2 * j as i32, 2 * k as i32));
}

#[inline]
fn prolongate_value(coarse: &GridVolume, i: usize, j: usize, k: usize) -> f32 {
    // Even fine indices map straight onto a coarse cell; odd ones average
    // the two straddling coarse cells along that axis.
    let base = [(i / 2) as i32, (j / 2) as i32, (k / 2) as i32];
    let odd = [i % 2 == 1, j % 2 == 1, k % 2 == 1];

    let mut value = 0.0;
    for dk in 0..2i32 {
        if dk == 1 && !odd[2] {
            continue;
        }
        let wz = if odd[2] { 0.5 } else { 1.0 };
        for dj in 0..2i32 {
            if dj == 1 && !odd[1] {
                continue;
            }
            let wy = if odd[1] { 0.5 } else { 1.0 };
            for di in 0..2i32 {
                if di == 1 && !odd[0] {
                    continue;
                }
                let wx = if odd[0] { 0.5 } else { 1.0 };
                value += wx * wy * wz * coarse.at(base[0] + di, base[1] + dj, base[2] + dk);
            }
        }
    }
    value
}

/// Trilinear prolongation added onto the fine field (the correction step of
/// the V-cycle up-sweep).
pub fn prolongate_add(fine: &mut GridVolume, coarse: &GridVolume) {
    fine.update_with(|i, j, k, v| v + prolongate_value(coarse, i, j, k));
}

/// Trilinear prolongation overwriting the fine field (the FMG upsample).
pub fn prolongate_overwrite(fine: &mut GridVolume, coarse: &GridVolume) {
    fine.fill_with(|i, j, k| prolongate_value(coarse, i, j, k));
}

/// Dot product with f64 accumulation.
pub fn dot(a: &GridVolume, b: &GridVolume) -> f32 {
    debug_assert!(a.same_dims(b));
    a.data()
        .par_chunks(4096)
        .zip(b.data().par_chunks(4096))
        .map(|(ca, cb)| {
            ca.iter()
                .zip(cb)
                .map(|(x, y)| *x as f64 * *y as f64)
                .sum::<f64>()
        })
        .sum::<f64>() as f32
}

/// `dest = v0 + sign * coef * v1`; `v0 = None` yields a pure scaling.
pub fn scaled_add(
    dest: &mut GridVolume,
    v0: Option<&GridVolume>,
    v1: &GridVolume,
    coef: f32,
    sign: f32,
) {
    debug_assert!(dest.same_dims(v1));
    let factor = sign * coef;
    match v0 {
        Some(v0) => {
            debug_assert!(dest.same_dims(v0));
            dest.data_mut()
                .par_iter_mut()
                .zip(v0.data().par_iter().zip(v1.data().par_iter()))
                .for_each(|(d, (a, b))| *d = a + factor * b);
        }
        None => {
            dest.data_mut()
                .par_iter_mut()
                .zip(v1.data().par_iter())
                .for_each(|(d, b)| *d = factor * b);
        }
    }
}

/// `dest += coef * v` in place.
pub fn axpy(dest: &mut GridVolume, coef: f32, v: &GridVolume) {
    debug_assert!(dest.same_dims(v));
    dest.data_mut()
        .par_iter_mut()
        .zip(v.data().par_iter())
        .for_each(|(d, s)| *d += coef * s);
}

/// `dest = v + coef * dest` in place (the search-direction update).
pub fn xpay(dest: &mut GridVolume, coef: f32, v: &GridVolume) {
    debug_assert!(dest.same_dims(v));
    dest.data_mut()
        .par_iter_mut()
        .zip(v.data().par_iter())
        .for_each(|(d, s)| *d = s + coef * *d);
}

/// Average and maximum of |r| for `r = b - A u`, computed without
/// materialising the residual. The one diagnostic probe the solvers expose.
pub fn residual_norm(u: &GridVolume, b: &GridVolume, cell_size: f32) -> (f32, f32) {
    let (w, h, d) = u.dims();
    let inv_h_square = 1.0 / (cell_size * cell_size);

    let (sum, max) = (0..d)
        .into_par_iter()
        .map(|k| {
            let mut sum = 0.0f64;
            let mut max = 0.0f32;
            for j in 0..h {
                for i in 0..w {
                    let (ii, jj, kk) = (i as i32, j as i32, k as i32);
                    let pc = u.get(i, j, k);
                    let r = b.get(i, j, k) - (neighbor_sum(u, ii, jj, kk) - 6.0 * pc) * inv_h_square;
                    sum += r.abs() as f64;
                    max = max.max(r.abs());
                }
            }
            (sum, max)
        })
        .reduce(|| (0.0, 0.0f32), |a, b| (a.0 + b.0, a.1.max(b.1)));

    ((sum / (w * h * d) as f64) as f32, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relax_fixed_point_on_constant_field() {
        // With b = 0 a constant p solves the Neumann problem; one sweep must
        // leave it untouched, boundaries included.
        let mut p = GridVolume::new(8, 8, 8);
        p.fill(3.0);
        let b = GridVolume::new(8, 8, 8);
        let mut out = GridVolume::new(8, 8, 8);

        relax(&mut out, &p, &b, 0.5);
        for v in out.data() {
            assert!((v - 3.0).abs() < 1e-5, "constant field drifted to {}", v);
        }
    }

    #[test]
    fn test_zero_guess_matches_first_sweep() {
        let mut b = GridVolume::new(8, 8, 8);
        for (idx, v) in b.data_mut().iter_mut().enumerate() {
            *v = (idx % 17) as f32 - 8.0;
        }

        let zero = GridVolume::new(8, 8, 8);
        let mut swept = GridVolume::new(8, 8, 8);
        relax(&mut swept, &zero, &b, 0.5);

        let mut direct = GridVolume::new(8, 8, 8);
        direct.copy_from(&zero);
        relax_with_zero_guess(&mut direct, &b, 0.5);

        for (a, b) in direct.data().iter().zip(swept.data()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_residual_of_exact_solution_is_zero() {
        // p linear in x has zero Laplacian in the interior.
        let mut p = GridVolume::new(8, 8, 8);
        for k in 0..8 {
            for j in 0..8 {
                for i in 0..8 {
                    p.set(i, j, k, i as f32);
                }
            }
        }
        let b = GridVolume::new(8, 8, 8);
        let mut r = GridVolume::new(8, 8, 8);
        residual(&mut r, &p, &b, 1.0);

        for k in 1..7 {
            for j in 1..7 {
                for i in 1..7 {
                    assert!(
                        r.get(i, j, k).abs() < 1e-5,
                        "interior residual should vanish for a linear field"
                    );
                }
            }
        }
    }

    #[test]
    fn test_restrict_weights_sum_to_one() {
        let mut fine = GridVolume::new(16, 16, 16);
        fine.fill(2.0);
        let mut coarse = GridVolume::new(8, 8, 8);
        restrict_volume(&mut coarse, &fine);
        for v in coarse.data() {
            assert!((v - 2.0).abs() < 1e-6, "restriction must preserve constants");
        }
    }

    #[test]
    fn test_prolongate_preserves_ramp() {
        // Restriction followed by prolongation reproduces a linear ramp in
        // the interior to round-off.
        let mut fine = GridVolume::new(16, 16, 16);
        for k in 0..16 {
            for j in 0..16 {
                for i in 0..16 {
                    fine.set(i, j, k, i as f32);
                }
            }
        }
        let mut coarse = GridVolume::new(8, 8, 8);
        restrict_volume(&mut coarse, &fine);
        let mut rebuilt = GridVolume::new(16, 16, 16);
        prolongate_overwrite(&mut rebuilt, &coarse);

        for k in 2..14 {
            for j in 2..14 {
                for i in 2..14 {
                    assert!(
                        (rebuilt.get(i, j, k) - fine.get(i, j, k)).abs() < 1e-4,
                        "ramp broke at ({}, {}, {}): {} vs {}",
                        i,
                        j,
                        k,
                        rebuilt.get(i, j, k),
                        fine.get(i, j, k)
                    );
                }
            }
        }
    }

    #[test]
    fn test_prolongate_add_accumulates() {
        let mut fine = GridVolume::new(8, 8, 8);
        fine.fill(1.0);
        let mut coarse = GridVolume::new(4, 4, 4);
        coarse.fill(0.5);
        prolongate_add(&mut fine, &coarse);
        for v in fine.data() {
            assert!((v - 1.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scaled_add_forms() {
        let mut a = GridVolume::new(4, 4, 4);
        a.fill(1.0);
        let mut b = GridVolume::new(4, 4, 4);
        b.fill(2.0);
        let mut dest = GridVolume::new(4, 4, 4);

        scaled_add(&mut dest, Some(&a), &b, 3.0, -1.0);
        assert!((dest.get(0, 0, 0) + 5.0).abs() < 1e-6);

        scaled_add(&mut dest, None, &b, 3.0, 1.0);
        assert!((dest.get(0, 0, 0) - 6.0).abs() < 1e-6);

        axpy(&mut a, 2.0, &b);
        assert!((a.get(0, 0, 0) - 5.0).abs() < 1e-6);

        xpay(&mut b, 0.5, &a);
        assert!((b.get(0, 0, 0) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot() {
        let mut a = GridVolume::new(4, 4, 4);
        a.fill(2.0);
        let mut b = GridVolume::new(4, 4, 4);
        b.fill(0.5);
        assert!((dot(&a, &b) - 64.0).abs() < 1e-4);
    }

    #[test]
    fn test_residual_norm_matches_residual() {
        let mut p = GridVolume::new(8, 8, 8);
        let mut b = GridVolume::new(8, 8, 8);
        for (idx, v) in p.data_mut().iter_mut().enumerate() {
            *v = ((idx * 7) % 13) as f32 * 0.1;
        }
        for (idx, v) in b.data_mut().iter_mut().enumerate() {
            *v = ((idx * 3) % 11) as f32 * 0.1;
        }

        let mut r = GridVolume::new(8, 8, 8);
        residual(&mut r, &p, &b, 0.5);
        let (avg, max) = residual_norm(&p, &b, 0.5);

        let expected_max = r.max_abs();
        let expected_avg =
            (r.data().iter().map(|v| v.abs() as f64).sum::<f64>() / r.data().len() as f64) as f32;
        assert!((max - expected_max).abs() < 1e-4);
        assert!((avg - expected_avg).abs() < 1e-4);
    }
}
