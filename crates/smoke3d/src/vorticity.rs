//! Vorticity kernels: curl, confinement forcing, vortex stretching and
//! decay, and re-injection of restored circulation through a
//! streamfunction.
//!
//! Vorticity lives at cell centres in both grid modes; staggered velocities
//! are averaged to centres before differencing, and centre-valued forces
//! are averaged back onto faces when applied.

use glam::Vec3;

use crate::volume::{GridVolume, VectorVolume};

#[inline]
fn curl_of_velocity(
    velocity: &VectorVolume,
    i: i32,
    j: i32,
    k: i32,
    half_inv_h: f32,
    staggered: bool,
) -> Vec3 {
    let c = |i, j, k| velocity.at_center(i, j, k, staggered);
    let dz_dy = c(i, j + 1, k).z - c(i, j - 1, k).z;
    let dy_dz = c(i, j, k + 1).y - c(i, j, k - 1).y;
    let dx_dz = c(i, j, k + 1).x - c(i, j, k - 1).x;
    let dz_dx = c(i + 1, j, k).z - c(i - 1, j, k).z;
    let dy_dx = c(i + 1, j, k).y - c(i - 1, j, k).y;
    let dx_dy = c(i, j + 1, k).x - c(i, j - 1, k).x;
    Vec3::new(dz_dy - dy_dz, dx_dz - dz_dx, dy_dx - dx_dy) * half_inv_h
}

/// Curl of a centre-valued vector field (the streamfunction).
#[inline]
fn curl_of_field(field: &VectorVolume, i: i32, j: i32, k: i32, half_inv_h: f32) -> Vec3 {
    let dz_dy = field.z.at(i, j + 1, k) - field.z.at(i, j - 1, k);
    let dy_dz = field.y.at(i, j, k + 1) - field.y.at(i, j, k - 1);
    let dx_dz = field.x.at(i, j, k + 1) - field.x.at(i, j, k - 1);
    let dz_dx = field.z.at(i + 1, j, k) - field.z.at(i - 1, j, k);
    let dy_dx = field.y.at(i + 1, j, k) - field.y.at(i - 1, j, k);
    let dx_dy = field.x.at(i, j + 1, k) - field.x.at(i, j - 1, k);
    Vec3::new(dz_dy - dy_dz, dx_dz - dz_dx, dy_dx - dx_dy) * half_inv_h
}

/// Vorticity of the velocity field, at cell centres.
pub fn compute_curl(
    out: &mut VectorVolume,
    velocity: &VectorVolume,
    cell_size: f32,
    staggered: bool,
) {
    let half_inv_h = 0.5 / cell_size;
    out.x.fill_with(|i, j, k| {
        curl_of_velocity(velocity, i as i32, j as i32, k as i32, half_inv_h, staggered).x
    });
    out.y.fill_with(|i, j, k| {
        curl_of_velocity(velocity, i as i32, j as i32, k as i32, half_inv_h, staggered).y
    });
    out.z.fill_with(|i, j, k| {
        curl_of_velocity(velocity, i as i32, j as i32, k as i32, half_inv_h, staggered).z
    });
}

/// Confinement force `coeff * h * (N x omega)` with `N = grad|omega|`
/// normalised. `coeff` already carries the time step.
pub fn build_vorticity_confinement(
    out: &mut VectorVolume,
    curl: &VectorVolume,
    coeff: f32,
    cell_size: f32,
) {
    let mag = |i: i32, j: i32, k: i32| {
        Vec3::new(curl.x.at(i, j, k), curl.y.at(i, j, k), curl.z.at(i, j, k)).length()
    };
    let force = move |i: i32, j: i32, k: i32| -> Vec3 {
        let eta = Vec3::new(
            mag(i + 1, j, k) - mag(i - 1, j, k),
            mag(i, j + 1, k) - mag(i, j - 1, k),
            mag(i, j, k + 1) - mag(i, j, k - 1),
        );
        let len = eta.length();
        if len < 1e-6 {
            return Vec3::ZERO;
        }
        let n = eta / len;
        let omega = Vec3::new(curl.x.at(i, j, k), curl.y.at(i, j, k), curl.z.at(i, j, k));
        coeff * cell_size * n.cross(omega)
    };

    out.x
        .fill_with(|i, j, k| force(i as i32, j as i32, k as i32).x);
    out.y
        .fill_with(|i, j, k| force(i as i32, j as i32, k as i32).y);
    out.z
        .fill_with(|i, j, k| force(i as i32, j as i32, k as i32).z);
}

/// Add a centre-valued vector field onto the velocity; staggered faces take
/// the average of the two adjacent centres.
fn add_center_field(velocity: &mut VectorVolume, field: &VectorVolume, staggered: bool) {
    if staggered {
        velocity.x.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            v + 0.5 * (field.x.at(i - 1, j, k) + field.x.at(i, j, k))
        });
        velocity.y.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            v + 0.5 * (field.y.at(i, j - 1, k) + field.y.at(i, j, k))
        });
        velocity.z.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            v + 0.5 * (field.z.at(i, j, k - 1) + field.z.at(i, j, k))
        });
    } else {
        velocity.x.update_with(|i, j, k, v| v + field.x.get(i, j, k));
        velocity.y.update_with(|i, j, k, v| v + field.y.get(i, j, k));
        velocity.z.update_with(|i, j, k, v| v + field.z.get(i, j, k));
    }
}

/// Apply the confinement force built by [`build_vorticity_confinement`].
pub fn apply_vorticity_confinement(
    velocity: &mut VectorVolume,
    confinement: &VectorVolume,
    staggered: bool,
) {
    add_center_field(velocity, confinement, staggered);
}

/// Vortex stretching: `omega' = omega + dt (omega . grad) u`.
pub fn stretch_vortices(
    out: &mut VectorVolume,
    velocity: &VectorVolume,
    vorticity: &VectorVolume,
    cell_size: f32,
    dt: f32,
    staggered: bool,
) {
    let half_inv_h = 0.5 / cell_size;
    let stretched = move |i: i32, j: i32, k: i32| -> Vec3 {
        let omega = Vec3::new(
            vorticity.x.at(i, j, k),
            vorticity.y.at(i, j, k),
            vorticity.z.at(i, j, k),
        );
        let c = |i, j, k| velocity.at_center(i, j, k, staggered);
        let du_dx = (c(i + 1, j, k) - c(i - 1, j, k)) * half_inv_h;
        let du_dy = (c(i, j + 1, k) - c(i, j - 1, k)) * half_inv_h;
        let du_dz = (c(i, j, k + 1) - c(i, j, k - 1)) * half_inv_h;
        omega + dt * (omega.x * du_dx + omega.y * du_dy + omega.z * du_dz)
    };

    out.x
        .fill_with(|i, j, k| stretched(i as i32, j as i32, k as i32).x);
    out.y
        .fill_with(|i, j, k| stretched(i as i32, j as i32, k as i32).y);
    out.z
        .fill_with(|i, j, k| stretched(i as i32, j as i32, k as i32).z);
}

/// Damp vorticity where the carrier flow expands:
/// `omega *= max(1 - dt * div, 0)`.
pub fn decay_vortices(vorticity: &mut VectorVolume, divergence: &GridVolume, dt: f32) {
    let factor = |i: usize, j: usize, k: usize| (1.0 - dt * divergence.get(i, j, k)).max(0.0);
    vorticity.x.update_with(|i, j, k, v| v * factor(i, j, k));
    vorticity.y.update_with(|i, j, k, v| v * factor(i, j, k));
    vorticity.z.update_with(|i, j, k, v| v * factor(i, j, k));
}

/// `delta = target - delta`, in place on `delta` (which arrives holding the
/// curl of the projected velocity).
pub fn compute_delta_vorticity(delta: &mut VectorVolume, target: &VectorVolume) {
    delta
        .x
        .update_with(|i, j, k, v| target.x.get(i, j, k) - v);
    delta
        .y
        .update_with(|i, j, k, v| target.y.get(i, j, k) - v);
    delta
        .z
        .update_with(|i, j, k, v| target.z.get(i, j, k) - v);
}

/// Add the curl of the streamfunction to the velocity, restoring the
/// circulation the advection step lost.
pub fn add_curl_psi(
    velocity: &mut VectorVolume,
    psi: &VectorVolume,
    cell_size: f32,
    staggered: bool,
) {
    let half_inv_h = 0.5 / cell_size;
    if staggered {
        velocity.x.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            let a = curl_of_field(psi, i - 1, j, k, half_inv_h).x;
            let b = curl_of_field(psi, i, j, k, half_inv_h).x;
            v + 0.5 * (a + b)
        });
        velocity.y.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            let a = curl_of_field(psi, i, j - 1, k, half_inv_h).y;
            let b = curl_of_field(psi, i, j, k, half_inv_h).y;
            v + 0.5 * (a + b)
        });
        velocity.z.update_with(|i, j, k, v| {
            let (i, j, k) = (i as i32, j as i32, k as i32);
            let a = curl_of_field(psi, i, j, k - 1, half_inv_h).z;
            let b = curl_of_field(psi, i, j, k, half_inv_h).z;
            v + 0.5 * (a + b)
        });
    } else {
        velocity.x.update_with(|i, j, k, v| {
            v + curl_of_field(psi, i as i32, j as i32, k as i32, half_inv_h).x
        });
        velocity.y.update_with(|i, j, k, v| {
            v + curl_of_field(psi, i as i32, j as i32, k as i32, half_inv_h).y
        });
        velocity.z.update_with(|i, j, k, v| {
            v + curl_of_field(psi, i as i32, j as i32, k as i32, half_inv_h).z
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rigid rotation about the z-axis: u = (-y, x, 0).
    fn rigid_rotation(n: usize) -> VectorVolume {
        let mut vel = VectorVolume::new(n, n, n);
        let c = (n as f32 - 1.0) * 0.5;
        vel.x.fill_with(|_, j, _| -(j as f32 - c));
        vel.y.fill_with(|i, _, _| i as f32 - c);
        vel
    }

    #[test]
    fn test_curl_of_rigid_rotation() {
        // curl(-y, x, 0) = (0, 0, 2), scaled by 1/h.
        let vel = rigid_rotation(16);
        let mut curl = VectorVolume::new(16, 16, 16);
        compute_curl(&mut curl, &vel, 1.0, false);

        for k in 2..14 {
            for j in 2..14 {
                for i in 2..14 {
                    assert!(curl.x.get(i, j, k).abs() < 1e-5);
                    assert!(curl.y.get(i, j, k).abs() < 1e-5);
                    assert!(
                        (curl.z.get(i, j, k) - 2.0).abs() < 1e-5,
                        "rigid rotation has curl 2, got {}",
                        curl.z.get(i, j, k)
                    );
                }
            }
        }
    }

    #[test]
    fn test_curl_of_zero_velocity_is_zero() {
        let vel = VectorVolume::new(8, 8, 8);
        let mut curl = VectorVolume::new(8, 8, 8);
        curl.x.fill(1.0);
        compute_curl(&mut curl, &vel, 0.5, true);
        for v in curl.x.data() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_confinement_force_is_zero_for_uniform_curl() {
        // With |omega| constant the gradient, and hence the force, vanishes.
        let mut curl = VectorVolume::new(8, 8, 8);
        curl.z.fill(2.0);
        let mut force = VectorVolume::new(8, 8, 8);
        force.x.fill(9.0);
        build_vorticity_confinement(&mut force, &curl, 0.1, 1.0);
        for v in force.x.data() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_decay_damps_expanding_regions() {
        let mut vort = VectorVolume::new(4, 4, 4);
        vort.z.fill(1.0);
        let mut div = GridVolume::new(4, 4, 4);
        div.set(1, 1, 1, 5.0);

        decay_vortices(&mut vort, &div, 0.1);
        assert!((vort.z.get(1, 1, 1) - 0.5).abs() < 1e-6);
        assert!((vort.z.get(2, 2, 2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_delta_vorticity() {
        let mut delta = VectorVolume::new(4, 4, 4);
        delta.x.fill(1.0);
        let mut target = VectorVolume::new(4, 4, 4);
        target.x.fill(3.0);
        compute_delta_vorticity(&mut delta, &target);
        for v in delta.x.data() {
            assert!((v - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_add_curl_psi_restores_rotation() {
        // psi = (0, 0, psi_z) with psi_z a paraboloid bump produces a
        // swirling velocity; the injected field must have non-zero curl of
        // the same sign as the bump.
        let mut psi = VectorVolume::new(16, 16, 16);
        psi.z.fill_with(|i, j, _| {
            let x = i as f32 - 7.5;
            let y = j as f32 - 7.5;
            (-(x * x + y * y) / 16.0).exp()
        });
        let mut vel = VectorVolume::new(16, 16, 16);
        add_curl_psi(&mut vel, &psi, 1.0, false);

        let mut curl = VectorVolume::new(16, 16, 16);
        compute_curl(&mut curl, &vel, 1.0, false);
        assert!(
            curl.z.get(7, 7, 8) > 0.0,
            "injected swirl should carry positive curl at the bump centre"
        );
    }
}
