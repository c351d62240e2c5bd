//! 3-D scalar and vector volumes with boundary-aware sampling.
//!
//! All fields in the simulation are dense row-major arrays indexed by
//! `k * W * H + j * W + i`. Reads through [`GridVolume::at`] clamp the
//! indices to the valid range, so every stencil sees a defined value for
//! neighbours one cell outside the domain (the clamped read *is* the
//! homogeneous-Neumann boundary extension used by the pressure stencils).

use glam::Vec3;
use rayon::prelude::*;

/// A dense scalar field of `width * height * depth` cells.
#[derive(Clone, Debug)]
pub struct GridVolume {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

impl GridVolume {
    /// Create a zero-filled volume.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        assert!(
            width >= 2 && height >= 2 && depth >= 2,
            "volume dimensions must be at least 2, got {}x{}x{}",
            width,
            height,
            depth
        );
        Self {
            width,
            height,
            depth,
            data: vec![0.0; width * height * depth],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    pub fn same_dims(&self, other: &GridVolume) -> bool {
        self.dims() == other.dims()
    }

    /// Index into the flat buffer.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.width * self.height + j * self.width + i
    }

    /// Unchecked in-range read.
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f32 {
        self.data[self.index(i, j, k)]
    }

    /// Unchecked in-range write.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f32) {
        let idx = self.index(i, j, k);
        self.data[idx] = value;
    }

    /// Clamped read: out-of-range indices read the nearest in-range cell.
    #[inline]
    pub fn at(&self, i: i32, j: i32, k: i32) -> f32 {
        let i = i.clamp(0, self.width as i32 - 1) as usize;
        let j = j.clamp(0, self.height as i32 - 1) as usize;
        let k = k.clamp(0, self.depth as i32 - 1) as usize;
        self.data[self.index(i, j, k)]
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    pub fn copy_from(&mut self, other: &GridVolume) {
        assert!(self.same_dims(other), "copy between mismatched volumes");
        self.data.copy_from_slice(&other.data);
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Trilinear sample in cell-index space. Integer coordinates are cell
    /// centres; samples outside the domain clamp to the boundary cells.
    pub fn sample(&self, pos: Vec3) -> f32 {
        let i0 = pos.x.floor() as i32;
        let j0 = pos.y.floor() as i32;
        let k0 = pos.z.floor() as i32;
        let tx = pos.x - i0 as f32;
        let ty = pos.y - j0 as f32;
        let tz = pos.z - k0 as f32;

        let mut value = 0.0;
        for dk in 0..2i32 {
            let wz = if dk == 0 { 1.0 - tz } else { tz };
            for dj in 0..2i32 {
                let wy = if dj == 0 { 1.0 - ty } else { ty };
                for di in 0..2i32 {
                    let wx = if di == 0 { 1.0 - tx } else { tx };
                    value += wx * wy * wz * self.at(i0 + di, j0 + dj, k0 + dk);
                }
            }
        }
        value
    }

    /// Min and max of the 8 cells surrounding a sample position. Used by the
    /// MacCormack/BFECC limiter to keep corrected values monotone.
    pub fn sample_bounds(&self, pos: Vec3) -> (f32, f32) {
        let i0 = pos.x.floor() as i32;
        let j0 = pos.y.floor() as i32;
        let k0 = pos.z.floor() as i32;

        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for dk in 0..2i32 {
            for dj in 0..2i32 {
                for di in 0..2i32 {
                    let v = self.at(i0 + di, j0 + dj, k0 + dk);
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
            }
        }
        (lo, hi)
    }

    /// Evaluate `f(i, j, k)` for every cell, in parallel over z-slabs.
    ///
    /// This is the cell-parallel launch shape every stencil kernel uses;
    /// the slab partition is fixed, so results do not depend on thread
    /// scheduling.
    pub fn fill_with<F>(&mut self, f: F)
    where
        F: Fn(usize, usize, usize) -> f32 + Sync,
    {
        let (w, h, _) = self.dims();
        self.data
            .par_chunks_mut(w * h)
            .enumerate()
            .for_each(|(k, slab)| {
                for j in 0..h {
                    for i in 0..w {
                        slab[j * w + i] = f(i, j, k);
                    }
                }
            });
    }

    /// Pointwise in-place update: `f` receives the cell coordinates and the
    /// current value. The closure must not depend on other cells of this
    /// volume, so the update order cannot matter.
    pub fn update_with<F>(&mut self, f: F)
    where
        F: Fn(usize, usize, usize, f32) -> f32 + Sync,
    {
        let (w, h, _) = self.dims();
        self.data
            .par_chunks_mut(w * h)
            .enumerate()
            .for_each(|(k, slab)| {
                for j in 0..h {
                    for i in 0..w {
                        let idx = j * w + i;
                        slab[idx] = f(i, j, k, slab[idx]);
                    }
                }
            });
    }

    /// Multiply every cell by a factor.
    pub fn scale(&mut self, factor: f32) {
        self.data.par_iter_mut().for_each(|v| *v *= factor);
    }

    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|v| *v as f64).sum()
    }
}

/// A triple of scalar volumes forming a vector field.
///
/// In staggered (MAC) mode component `x[i]` sits on the minus face
/// `(i - 1/2, j, k)` of cell `i`, and likewise for `y` and `z`; in
/// collocated mode all three components share the cell centre. All three
/// buffers are sized `W x H x D` in either mode.
#[derive(Clone, Debug)]
pub struct VectorVolume {
    pub x: GridVolume,
    pub y: GridVolume,
    pub z: GridVolume,
}

impl VectorVolume {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            x: GridVolume::new(width, height, depth),
            y: GridVolume::new(width, height, depth),
            z: GridVolume::new(width, height, depth),
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.x.dims()
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
    }

    /// Vector value at a cell centre; staggered mode averages the two faces
    /// of the cell, with out-of-range faces clamping.
    #[inline]
    pub fn at_center(&self, i: i32, j: i32, k: i32, staggered: bool) -> Vec3 {
        if staggered {
            Vec3::new(
                0.5 * (self.x.at(i, j, k) + self.x.at(i + 1, j, k)),
                0.5 * (self.y.at(i, j, k) + self.y.at(i, j + 1, k)),
                0.5 * (self.z.at(i, j, k) + self.z.at(i, j, k + 1)),
            )
        } else {
            Vec3::new(self.x.at(i, j, k), self.y.at(i, j, k), self.z.at(i, j, k))
        }
    }

    /// Trilinear sample of the full vector at an arbitrary position in
    /// cell-index space. Staggered components shift by the half-cell face
    /// offset before lookup.
    pub fn sample(&self, pos: Vec3, staggered: bool) -> Vec3 {
        if staggered {
            Vec3::new(
                self.x.sample(pos + Vec3::new(0.5, 0.0, 0.0)),
                self.y.sample(pos + Vec3::new(0.0, 0.5, 0.0)),
                self.z.sample(pos + Vec3::new(0.0, 0.0, 0.5)),
            )
        } else {
            Vec3::new(self.x.sample(pos), self.y.sample(pos), self.z.sample(pos))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_creation() {
        let v = GridVolume::new(16, 32, 8);
        assert_eq!(v.dims(), (16, 32, 8));
        assert_eq!(v.data().len(), 16 * 32 * 8);
    }

    #[test]
    fn test_index_layout() {
        let v = GridVolume::new(4, 5, 6);
        assert_eq!(v.index(0, 0, 0), 0);
        assert_eq!(v.index(1, 0, 0), 1);
        assert_eq!(v.index(0, 1, 0), 4);
        assert_eq!(v.index(0, 0, 1), 20);
        assert_eq!(v.index(3, 4, 5), 5 * 20 + 4 * 4 + 3);
    }

    #[test]
    fn test_clamped_reads() {
        let mut v = GridVolume::new(4, 4, 4);
        v.set(0, 0, 0, 7.0);
        v.set(3, 3, 3, 9.0);

        assert_eq!(v.at(-1, -2, 0), 7.0);
        assert_eq!(v.at(4, 3, 5), 9.0);
    }

    #[test]
    fn test_sample_exact_at_centers() {
        let mut v = GridVolume::new(4, 4, 4);
        v.set(2, 1, 3, 5.5);
        let s = v.sample(Vec3::new(2.0, 1.0, 3.0));
        assert!((s - 5.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_interpolates_linearly() {
        let mut v = GridVolume::new(4, 4, 4);
        // Linear ramp in x
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    v.set(i, j, k, i as f32);
                }
            }
        }
        let s = v.sample(Vec3::new(1.25, 2.0, 2.0));
        assert!((s - 1.25).abs() < 1e-6, "expected 1.25, got {}", s);
    }

    #[test]
    fn test_staggered_center_average() {
        let mut vel = VectorVolume::new(4, 4, 4);
        vel.x.set(1, 1, 1, 2.0);
        vel.x.set(2, 1, 1, 4.0);
        let c = vel.at_center(1, 1, 1, true);
        assert!((c.x - 3.0).abs() < 1e-6);

        let c = vel.at_center(1, 1, 1, false);
        assert!((c.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_bounds() {
        let mut v = GridVolume::new(4, 4, 4);
        v.set(1, 1, 1, -2.0);
        v.set(2, 2, 2, 3.0);
        let (lo, hi) = v.sample_bounds(Vec3::new(1.5, 1.5, 1.5));
        assert_eq!(lo, -2.0);
        assert_eq!(hi, 3.0);
    }
}
