//! Velocity divergence and pressure-gradient subtraction.
//!
//! Boundary handling follows the free-slip closed box: in collocated mode a
//! missing neighbour velocity is replaced by the reflection of the centre
//! value, and the affected velocity component of the boundary cell is masked
//! to zero after the gradient update. In staggered mode wall faces simply
//! carry zero velocity. The `outflow` flag opens the floor (y-minus): no
//! reflection, no mask, zero-gradient pressure.

use crate::volume::{GridVolume, VectorVolume};

/// Boundary flags shared by the projection kernels.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundaryParams {
    pub staggered: bool,
    pub outflow: bool,
}

/// Divergence of the velocity field into `div`, in 1/s.
pub fn compute_divergence(
    div: &mut GridVolume,
    velocity: &VectorVolume,
    cell_size: f32,
    bp: BoundaryParams,
) {
    assert!(div.same_dims(&velocity.x), "divergence must match the grid");
    let (w, h, d) = div.dims();
    let (wi, hi, di) = (w as i32, h as i32, d as i32);

    if bp.staggered {
        let inv_h = 1.0 / cell_size;
        div.fill_with(|i, j, k| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            let left = if i == 0 { 0.0 } else { velocity.x.at(i, j, k) };
            let right = if i + 1 >= wi { 0.0 } else { velocity.x.at(i + 1, j, k) };
            let bottom = if j == 0 {
                if bp.outflow { velocity.y.at(i, 0, k) } else { 0.0 }
            } else {
                velocity.y.at(i, j, k)
            };
            let top = if j + 1 >= hi { 0.0 } else { velocity.y.at(i, j + 1, k) };
            let back = if k == 0 { 0.0 } else { velocity.z.at(i, j, k) };
            let front = if k + 1 >= di { 0.0 } else { velocity.z.at(i, j, k + 1) };

            inv_h * ((right - left) + (top - bottom) + (front - back))
        });
    } else {
        let half_inv_h = 0.5 / cell_size;
        div.fill_with(|i, j, k| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            let xc = velocity.x.at(i, j, k);
            let yc = velocity.y.at(i, j, k);
            let zc = velocity.z.at(i, j, k);

            let mut diff_ew = velocity.x.at(i + 1, j, k) - velocity.x.at(i - 1, j, k);
            let mut diff_ns = velocity.y.at(i, j + 1, k) - velocity.y.at(i, j - 1, k);
            let mut diff_ud = velocity.z.at(i, j, k + 1) - velocity.z.at(i, j, k - 1);

            if i >= wi - 1 {
                diff_ew = -xc - velocity.x.at(i - 1, j, k);
            }
            if i <= 0 {
                diff_ew = velocity.x.at(i + 1, j, k) + xc;
            }
            if j >= hi - 1 {
                diff_ns = -yc - velocity.y.at(i, j - 1, k);
            }
            if j <= 0 {
                diff_ns = if bp.outflow {
                    velocity.y.at(i, j + 1, k) - yc
                } else {
                    velocity.y.at(i, j + 1, k) + yc
                };
            }
            if k >= di - 1 {
                diff_ud = -zc - velocity.z.at(i, j, k - 1);
            }
            if k <= 0 {
                diff_ud = velocity.z.at(i, j, k + 1) + zc;
            }

            half_inv_h * (diff_ew + diff_ns + diff_ud)
        });
    }
}

/// Subtract the pressure gradient from the velocity, leaving it
/// divergence-free up to the solver residual.
pub fn subtract_gradient(
    velocity: &mut VectorVolume,
    pressure: &GridVolume,
    cell_size: f32,
    bp: BoundaryParams,
) {
    assert!(
        pressure.same_dims(&velocity.x),
        "pressure must match the grid"
    );
    if bp.staggered {
        subtract_gradient_staggered(velocity, pressure, cell_size, bp);
    } else {
        subtract_gradient_collocated(velocity, pressure, cell_size, bp);
    }
}

fn subtract_gradient_collocated(
    velocity: &mut VectorVolume,
    pressure: &GridVolume,
    cell_size: f32,
    bp: BoundaryParams,
) {
    let (w, h, d) = pressure.dims();
    let (wi, hi, di) = (w as i32, h as i32, d as i32);
    let gradient_scale = 0.5 / cell_size;

    // The clamped read already substitutes the centre pressure for the
    // missing neighbour; only the free-slip mask needs explicit handling.
    velocity.x.update_with(|i, j, k, v| {
        let (i, j, k) = (i as i32, j as i32, k as i32);
        if i <= 0 || i >= wi - 1 {
            return 0.0;
        }
        v - (pressure.at(i + 1, j, k) - pressure.at(i - 1, j, k)) * gradient_scale
    });

    velocity.y.update_with(|i, j, k, v| {
        let (i, j, k) = (i as i32, j as i32, k as i32);
        let open_floor = bp.outflow && j <= 0;
        if (j <= 0 && !open_floor) || j >= hi - 1 {
            return 0.0;
        }
        v - (pressure.at(i, j + 1, k) - pressure.at(i, j - 1, k)) * gradient_scale
    });

    velocity.z.update_with(|i, j, k, v| {
        let (i, j, k) = (i as i32, j as i32, k as i32);
        if k <= 0 || k >= di - 1 {
            return 0.0;
        }
        v - (pressure.at(i, j, k + 1) - pressure.at(i, j, k - 1)) * gradient_scale
    });
}

fn subtract_gradient_staggered(
    velocity: &mut VectorVolume,
    pressure: &GridVolume,
    cell_size: f32,
    bp: BoundaryParams,
) {
    let inv_h = 1.0 / cell_size;

    velocity.x.update_with(|i, j, k, v| {
        if i == 0 {
            return 0.0;
        }
        let (i, j, k) = (i as i32, j as i32, k as i32);
        v - (pressure.at(i, j, k) - pressure.at(i - 1, j, k)) * inv_h
    });

    velocity.y.update_with(|i, j, k, v| {
        if j == 0 {
            // Open floor keeps the stored face value; the pressure gradient
            // across the boundary is zero by the clamped read anyway.
            return if bp.outflow { v } else { 0.0 };
        }
        let (i, j, k) = (i as i32, j as i32, k as i32);
        v - (pressure.at(i, j, k) - pressure.at(i, j - 1, k)) * inv_h
    });

    velocity.z.update_with(|i, j, k, v| {
        if k == 0 {
            return 0.0;
        }
        let (i, j, k) = (i as i32, j as i32, k as i32);
        v - (pressure.at(i, j, k) - pressure.at(i, j, k - 1)) * inv_h
    });
}
