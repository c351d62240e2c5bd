//! External forcing: impulse splats, buoyancy, density revision.

use glam::{Vec2, Vec3};

use crate::volume::{GridVolume, VectorVolume};

/// Additive splat confined to the thin band of rows just above the floor
/// (the hot-floor emitter). Cells within `radius` of `center` in the x-z
/// plane receive `value` scaled by the distance to the moving hotspot, with
/// a falloff floor of 0.5.
pub fn apply_impulse(dest: &mut GridVolume, center: Vec3, hotspot: Vec3, radius: f32, value: f32) {
    let center_xz = Vec2::new(center.x, center.z);
    let hotspot_xz = Vec2::new(hotspot.x, hotspot.z);

    dest.update_with(|i, j, k, prev| {
        let y = j as f32 + 0.5;
        if y <= 1.0 || y >= 3.0 {
            return prev;
        }
        let p = Vec2::new(i as f32 + 0.5, k as f32 + 0.5);
        if p.distance(center_xz) >= radius {
            return prev;
        }
        let scale = ((radius - p.distance(hotspot_xz)) / radius).max(0.5);
        prev + scale * value
    });
}

/// Additive spherical splat with linear radial falloff.
pub fn apply_impulse_sphere(dest: &mut GridVolume, center: Vec3, radius: f32, value: f32) {
    dest.update_with(|i, j, k, prev| {
        let p = Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
        let d = p.distance(center);
        if d >= radius {
            return prev;
        }
        prev + (radius - d) / radius * value
    });
}

/// Buoyancy acceleration for one cell; zero at or below ambient.
#[inline]
fn buoyancy_accel(
    temperature: f32,
    density: f32,
    ambient_temperature: f32,
    sigma: f32,
    kappa: f32,
) -> f32 {
    if temperature > ambient_temperature {
        (temperature - ambient_temperature) * sigma - kappa * density
    } else {
        0.0
    }
}

/// Add the buoyancy force to the vertical velocity. Staggered faces take
/// the average of the two adjacent cell accelerations.
#[allow(clippy::too_many_arguments)]
pub fn apply_buoyancy(
    velocity: &mut VectorVolume,
    temperature: &GridVolume,
    density: &GridVolume,
    dt: f32,
    ambient_temperature: f32,
    sigma: f32,
    kappa: f32,
    staggered: bool,
) {
    let accel = |i: i32, j: i32, k: i32| {
        buoyancy_accel(
            temperature.at(i, j, k),
            density.at(i, j, k),
            ambient_temperature,
            sigma,
            kappa,
        )
    };

    velocity.y.update_with(|i, j, k, v| {
        let (i, j, k) = (i as i32, j as i32, k as i32);
        let a = if staggered {
            0.5 * (accel(i, j - 1, k) + accel(i, j, k))
        } else {
            accel(i, j, k)
        };
        v + dt * a
    });
}

/// Hot-floor cleanup: inside `radius` of the emitter, densities below the
/// clip threshold collapse to zero so the band splat does not leave a haze
/// hanging over the floor.
pub fn revise_density(density: &mut GridVolume, center: Vec3, radius: f32, threshold: f32) {
    density.update_with(|i, j, k, v| {
        let p = Vec3::new(i as f32 + 0.5, j as f32 + 0.5, k as f32 + 0.5);
        if p.distance(center) < radius && v < threshold {
            0.0
        } else {
            v
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_band_only() {
        let mut dest = GridVolume::new(16, 16, 16);
        let center = Vec3::new(8.0, 0.0, 8.0);
        apply_impulse(&mut dest, center, center, 4.0, 1.0);

        // Rows 1 and 2 carry the splat, everything else is untouched.
        assert!(dest.get(8, 1, 8) > 0.0);
        assert!(dest.get(8, 2, 8) > 0.0);
        assert_eq!(dest.get(8, 0, 8), 0.0);
        assert_eq!(dest.get(8, 3, 8), 0.0);
        // Outside the radius nothing is written.
        assert_eq!(dest.get(14, 1, 8), 0.0);
    }

    #[test]
    fn test_impulse_peaks_at_hotspot() {
        let mut dest = GridVolume::new(16, 16, 16);
        let center = Vec3::new(8.0, 0.0, 8.0);
        let hotspot = Vec3::new(6.0, 0.0, 8.0);
        apply_impulse(&mut dest, center, hotspot, 4.0, 1.0);

        let near = dest.get(6, 1, 8);
        let far = dest.get(10, 1, 8);
        assert!(
            near > far,
            "splat should peak at the hotspot: near={} far={}",
            near,
            far
        );
        // The falloff floor keeps every in-disc cell at half value or more.
        assert!(far >= 0.5);
    }

    #[test]
    fn test_impulse_is_additive() {
        let mut dest = GridVolume::new(16, 16, 16);
        let center = Vec3::new(8.0, 0.0, 8.0);
        apply_impulse(&mut dest, center, center, 4.0, 1.0);
        let once = dest.get(8, 1, 8);
        apply_impulse(&mut dest, center, center, 4.0, 1.0);
        assert!((dest.get(8, 1, 8) - 2.0 * once).abs() < 1e-6);
    }

    #[test]
    fn test_buoyancy_only_above_ambient() {
        let mut velocity = VectorVolume::new(8, 8, 8);
        let mut temperature = GridVolume::new(8, 8, 8);
        let density = GridVolume::new(8, 8, 8);
        temperature.set(4, 4, 4, 10.0);

        apply_buoyancy(
            &mut velocity,
            &temperature,
            &density,
            0.1,
            0.0,
            1.0,
            0.0,
            false,
        );
        assert!((velocity.y.get(4, 4, 4) - 1.0).abs() < 1e-6);
        assert_eq!(velocity.y.get(2, 2, 2), 0.0, "cold cells gain nothing");
    }

    #[test]
    fn test_smoke_weight_pulls_down() {
        let mut velocity = VectorVolume::new(8, 8, 8);
        let mut temperature = GridVolume::new(8, 8, 8);
        let mut density = GridVolume::new(8, 8, 8);
        temperature.set(4, 4, 4, 1.0);
        density.set(4, 4, 4, 100.0);

        apply_buoyancy(
            &mut velocity,
            &temperature,
            &density,
            0.1,
            0.0,
            1.0,
            0.05,
            false,
        );
        assert!(
            velocity.y.get(4, 4, 4) < 0.0,
            "heavy smoke outweighs weak heat"
        );
    }

    #[test]
    fn test_revise_density_clips_haze() {
        let mut density = GridVolume::new(16, 16, 16);
        density.set(8, 2, 8, 0.05);
        density.set(8, 3, 8, 0.9);
        density.set(0, 15, 0, 0.05);

        revise_density(&mut density, Vec3::new(8.0, 0.0, 8.0), 8.0, 0.1);
        assert_eq!(density.get(8, 2, 8), 0.0, "haze inside radius clips");
        assert_eq!(density.get(8, 3, 8), 0.9, "dense smoke survives");
        assert_eq!(density.get(0, 15, 0), 0.05, "far cells are untouched");
    }
}
