use super::raster::capsule_row_span;
use super::spline::SplineCurve;
use bevy::math::{UVec2, Vec2};

const SUPERSAMPLE: u32 = 4;

/// Maps world coordinates into minimap pixels. Axes scale independently
/// because the crop is stretched to a fixed output size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapProjection {
    pub crop_offset: Vec2,
    pub crop_size: Vec2,
    pub output_size: UVec2,
}

impl MinimapProjection {
    /// Curve bounds grown by `padding`, clamped to the world square.
    pub fn fit_curve(curve: &SplineCurve, padding: f32, world_size: u32, output_size: UVec2) -> Self {
        let (min, max) = curve.bounds();
        let world = Vec2::splat(world_size as f32);
        let crop_offset = (min - Vec2::splat(padding)).max(Vec2::ZERO);
        let crop_size = (world - crop_offset)
            .min(max - min + Vec2::splat(padding * 2.0))
            .max(Vec2::ONE);

        Self {
            crop_offset,
            crop_size,
            output_size,
        }
    }

    pub fn scale(&self) -> Vec2 {
        self.output_size.as_vec2() / self.crop_size
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        (world - self.crop_offset) * self.scale()
    }
}

#[derive(Debug, Clone)]
pub struct Minimap {
    projection: MinimapProjection,
    alpha: Vec<u8>,
}

impl Minimap {
    pub fn render(curve: &SplineCurve, projection: MinimapProjection, outline_width: f32) -> Self {
        let grid = projection.output_size * SUPERSAMPLE;
        let cell = projection.crop_size / grid.as_vec2();
        let radius = outline_width * 0.5;
        let mut coverage = vec![false; (grid.x * grid.y) as usize];

        let points = curve.points();
        let closing = points
            .last()
            .zip(points.first())
            .map(|(&last, &first)| (last, first));

        for (a, b) in curve.segments().chain(closing) {
            let a = a - projection.crop_offset;
            let b = b - projection.crop_offset;
            let row_min = ((a.y.min(b.y) - radius) / cell.y - 0.5).ceil().max(0.0) as u32;
            let row_max = ((a.y.max(b.y) + radius) / cell.y - 0.5).floor();
            if row_max < 0.0 {
                continue;
            }
            let row_max = (row_max as u32).min(grid.y.saturating_sub(1));

            for row in row_min..=row_max {
                let y = (row as f32 + 0.5) * cell.y;
                let Some((lo, hi)) = capsule_row_span(a, b, radius, y) else {
                    continue;
                };
                let col_min = (lo / cell.x - 0.5).ceil().max(0.0) as u32;
                let col_max = (hi / cell.x - 0.5).floor();
                if col_max < 0.0 {
                    continue;
                }
                let col_max = (col_max as u32).min(grid.x.saturating_sub(1));
                if col_min > col_max {
                    continue;
                }
                let start = (row * grid.x) as usize;
                coverage[start + col_min as usize..=start + col_max as usize].fill(true);
            }
        }

        let output = projection.output_size;
        let samples_per_pixel = SUPERSAMPLE * SUPERSAMPLE;
        let mut alpha = Vec::with_capacity((output.x * output.y) as usize);
        for py in 0..output.y {
            for px in 0..output.x {
                let mut covered = 0;
                for sy in 0..SUPERSAMPLE {
                    let row = ((py * SUPERSAMPLE + sy) * grid.x) as usize;
                    for sx in 0..SUPERSAMPLE {
                        if coverage[row + (px * SUPERSAMPLE + sx) as usize] {
                            covered += 1;
                        }
                    }
                }
                alpha.push((covered * 255 / samples_per_pixel) as u8);
            }
        }

        Self { projection, alpha }
    }

    pub fn projection(&self) -> &MinimapProjection {
        &self.projection
    }

    pub fn size(&self) -> UVec2 {
        self.projection.output_size
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        self.projection.project(world)
    }

    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        let size = self.size();
        (x < size.x && y < size.y).then(|| self.alpha[(y * size.x + x) as usize])
    }

    pub fn rgba_bytes(&self) -> Vec<u8> {
        self.alpha
            .iter()
            .flat_map(|&alpha| [255, 255, 255, alpha])
            .collect()
    }
}
