use glam::Vec3;
use skirmish_common::{BoundingVolume, SceneRng};

/// Regular grid of height samples on the XZ plane.
///
/// Sample `(i, j)` sits at `origin + (i * cell_size, h, j * cell_size)`.
/// Heights between samples are bilinearly interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    width: usize,
    depth: usize,
    cell_size: f32,
    origin: Vec3,
    heights: Vec<f32>,
}

impl HeightField {
    /// Returns `None` unless there are at least 2x2 samples and
    /// `heights.len() == width * depth`.
    pub fn from_samples(
        width: usize,
        depth: usize,
        cell_size: f32,
        origin: Vec3,
        heights: Vec<f32>,
    ) -> Option<Self> {
        if width < 2 || depth < 2 || heights.len() != width * depth || cell_size <= 0.0 {
            return None;
        }
        Some(Self {
            width,
            depth,
            cell_size,
            origin,
            heights,
        })
    }

    pub fn flat(width: usize, depth: usize, cell_size: f32, height: f32) -> Self {
        Self {
            width: width.max(2),
            depth: depth.max(2),
            cell_size,
            origin: Vec3::ZERO,
            heights: vec![height; width.max(2) * depth.max(2)],
        }
    }

    /// Rolling hills from a few seeded sine octaves.
    pub fn generate(width: usize, depth: usize, cell_size: f32, amplitude: f32, seed: u64) -> Self {
        let width = width.max(2);
        let depth = depth.max(2);
        let mut rng = SceneRng::new(seed);
        let octaves: Vec<(f32, f32, f32, f32)> = (0..3)
            .map(|i| {
                let freq = 0.08 * (i + 1) as f32;
                (
                    freq * rng.range(0.6, 1.4),
                    freq * rng.range(0.6, 1.4),
                    rng.range(0.0, std::f32::consts::TAU),
                    1.0 / (i + 1) as f32,
                )
            })
            .collect();
        let norm: f32 = octaves.iter().map(|o| o.3).sum();

        let mut heights = Vec::with_capacity(width * depth);
        for j in 0..depth {
            for i in 0..width {
                let (x, z) = (i as f32, j as f32);
                let mut h = 0.0;
                for &(fx, fz, phase, weight) in &octaves {
                    h += weight * (0.5 + 0.25 * (x * fx + phase).sin() + 0.25 * (z * fz - phase).cos());
                }
                heights.push(amplitude * h / norm);
            }
        }
        Self {
            width,
            depth,
            cell_size,
            origin: Vec3::ZERO,
            heights,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// World-space XZ span as (min corner, max corner) with Y at the height range.
    pub fn extent(&self) -> (Vec3, Vec3) {
        let lo = self.heights.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = self.heights.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span_x = (self.width - 1) as f32 * self.cell_size;
        let span_z = (self.depth - 1) as f32 * self.cell_size;
        (
            self.origin + Vec3::new(0.0, lo, 0.0),
            self.origin + Vec3::new(span_x, hi, span_z),
        )
    }

    pub fn center(&self) -> Vec3 {
        let (min, max) = self.extent();
        (min + max) * 0.5
    }

    /// Box enclosing the playfield, from one unit under the lowest sample to
    /// `headroom` above the highest.
    pub fn bounding_volume(&self, headroom: f32) -> BoundingVolume {
        let (mut min, mut max) = self.extent();
        min.y -= 1.0;
        max.y += headroom;
        BoundingVolume::Box {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    fn sample(&self, i: usize, j: usize) -> f32 {
        self.heights[j * self.width + i]
    }

    /// Interpolated height at world `(x, z)`, or `None` outside the field.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let fx = (x - self.origin.x) / self.cell_size;
        let fz = (z - self.origin.z) / self.cell_size;
        let max_x = (self.width - 1) as f32;
        let max_z = (self.depth - 1) as f32;
        if !(0.0..=max_x).contains(&fx) || !(0.0..=max_z).contains(&fz) {
            return None;
        }
        let i = (fx.floor() as usize).min(self.width - 2);
        let j = (fz.floor() as usize).min(self.depth - 2);
        let tx = fx - i as f32;
        let tz = fz - j as f32;
        let near = self.sample(i, j) * (1.0 - tx) + self.sample(i + 1, j) * tx;
        let far = self.sample(i, j + 1) * (1.0 - tx) + self.sample(i + 1, j + 1) * tx;
        Some(self.origin.y + near * (1.0 - tz) + far * tz)
    }
}
