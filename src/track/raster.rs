use bevy::math::{UVec2, Vec2};

pub const TILE_SIZE: u32 = 256;

/// Sparse raster split into square tiles. Untouched tiles are not allocated
/// and read back as the background value.
///
/// Pixel `(x, y)` is the integer world coordinate `(x, y)`; shapes cover a
/// pixel when that point lies inside them.
#[derive(Debug, Clone)]
pub struct TileLayer<T> {
    width: u32,
    height: u32,
    tiles_x: u32,
    tiles_y: u32,
    background: T,
    tiles: Vec<Option<Box<[T]>>>,
}

impl<T: Copy> TileLayer<T> {
    pub fn new(width: u32, height: u32, background: T) -> Self {
        let tiles_x = width.div_ceil(TILE_SIZE);
        let tiles_y = height.div_ceil(TILE_SIZE);
        Self {
            width,
            height,
            tiles_x,
            tiles_y,
            background,
            tiles: vec![None; (tiles_x * tiles_y) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> T {
        self.background
    }

    pub fn tile_grid(&self) -> UVec2 {
        UVec2::new(self.tiles_x, self.tiles_y)
    }

    pub fn allocated_tiles(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.is_some()).count()
    }

    /// Row-major `TILE_SIZE * TILE_SIZE` cells of tile `(tx, ty)`, if any pixel
    /// of it was ever painted.
    pub fn tile(&self, tx: u32, ty: u32) -> Option<&[T]> {
        if tx >= self.tiles_x || ty >= self.tiles_y {
            return None;
        }
        self.tiles[(ty * self.tiles_x + tx) as usize].as_deref()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<T> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        let tile = self.tile(x / TILE_SIZE, y / TILE_SIZE);
        Some(tile.map_or(self.background, |cells| {
            cells[((y % TILE_SIZE) * TILE_SIZE + x % TILE_SIZE) as usize]
        }))
    }

    pub fn set(&mut self, x: i32, y: i32, value: T) {
        self.fill_span(y, x, x, value);
    }

    pub fn fill_span(&mut self, y: i32, x_start: i32, x_end: i32, value: T) {
        if y < 0 || y as u32 >= self.height || self.width == 0 {
            return;
        }
        let x0 = x_start.max(0);
        let x1 = x_end.min(self.width as i32 - 1);
        if x0 > x1 {
            return;
        }

        let y = y as u32;
        let (ty, row) = (y / TILE_SIZE, ((y % TILE_SIZE) * TILE_SIZE) as usize);
        let (mut x, x1) = (x0 as u32, x1 as u32);
        while x <= x1 {
            let tx = x / TILE_SIZE;
            let run_end = ((tx + 1) * TILE_SIZE - 1).min(x1);
            let cells = self.tile_mut(tx, ty);
            cells[row + (x % TILE_SIZE) as usize..=row + (run_end % TILE_SIZE) as usize]
                .fill(value);
            x = run_end + 1;
        }
    }

    /// Paints every pixel within `radius` of segment `a..b` (a round-capped stroke).
    pub fn fill_capsule(&mut self, a: Vec2, b: Vec2, radius: f32, value: T) {
        if self.height == 0 {
            return;
        }
        let y0 = ((a.y.min(b.y) - radius).ceil() as i32).max(0);
        let y1 = ((a.y.max(b.y) + radius).floor() as i32).min(self.height as i32 - 1);
        for y in y0..=y1 {
            if let Some((lo, hi)) = capsule_row_span(a, b, radius, y as f32) {
                self.fill_span(y, lo.ceil() as i32, hi.floor() as i32, value);
            }
        }
    }

    pub fn fill_disc(&mut self, center: Vec2, radius: f32, value: T) {
        self.fill_capsule(center, center, radius, value);
    }

    pub fn stroke_polyline(&mut self, points: &[Vec2], radius: f32, value: T) {
        match points {
            [] => {}
            [single] => self.fill_disc(*single, radius, value),
            _ => {
                for pair in points.windows(2) {
                    self.fill_capsule(pair[0], pair[1], radius, value);
                }
            }
        }
    }

    pub fn paint_region(
        &mut self,
        min: Vec2,
        max: Vec2,
        mut paint: impl FnMut(Vec2) -> Option<T>,
    ) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let x0 = (min.x.ceil() as i32).max(0);
        let y0 = (min.y.ceil() as i32).max(0);
        let x1 = (max.x.floor() as i32).min(self.width as i32 - 1);
        let y1 = (max.y.floor() as i32).min(self.height as i32 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if let Some(value) = paint(Vec2::new(x as f32, y as f32)) {
                    self.set(x, y, value);
                }
            }
        }
    }

    fn tile_mut(&mut self, tx: u32, ty: u32) -> &mut [T] {
        let background = self.background;
        self.tiles[(ty * self.tiles_x + tx) as usize]
            .get_or_insert_with(|| vec![background; (TILE_SIZE * TILE_SIZE) as usize].into())
    }
}

pub fn capsule_row_span(a: Vec2, b: Vec2, radius: f32, y: f32) -> Option<(f32, f32)> {
    let mut span = None;

    for center in [a, b] {
        let dy = y - center.y;
        let half_sq = radius * radius - dy * dy;
        if half_sq >= 0.0 {
            let half = half_sq.sqrt();
            span = merge_span(span, center.x - half, center.x + half);
        }
    }

    let delta = b - a;
    let length = delta.length();
    if length > f32::EPSILON {
        let along = delta / length;
        let across = along.perp();
        let band_along = linear_band(along.x, (y - a.y) * along.y - a.x * along.x, 0.0, length);
        let band_across = linear_band(
            across.x,
            (y - a.y) * across.y - a.x * across.x,
            -radius,
            radius,
        );
        if let (Some((lo_a, hi_a)), Some((lo_b, hi_b))) = (band_along, band_across) {
            let (lo, hi) = (lo_a.max(lo_b), hi_a.min(hi_b));
            if lo <= hi {
                span = merge_span(span, lo, hi);
            }
        }
    }

    span
}

fn merge_span(span: Option<(f32, f32)>, lo: f32, hi: f32) -> Option<(f32, f32)> {
    Some(match span {
        Some((current_lo, current_hi)) => (current_lo.min(lo), current_hi.max(hi)),
        None => (lo, hi),
    })
}

fn linear_band(coef: f32, offset: f32, lo: f32, hi: f32) -> Option<(f32, f32)> {
    if coef.abs() <= f32::EPSILON {
        return (lo..=hi)
            .contains(&offset)
            .then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let x0 = (lo - offset) / coef;
    let x1 = (hi - offset) / coef;
    Some((x0.min(x1), x0.max(x1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_are_none() {
        let layer = TileLayer::new(300, 300, 0u8);

        assert_eq!(layer.get(-1, 0), None);
        assert_eq!(layer.get(0, 300), None);
        assert_eq!(layer.get(299, 299), Some(0));
    }

    #[test]
    fn spans_cross_tile_boundaries_and_allocate_lazily() {
        let mut layer = TileLayer::new(1_000, 1_000, false);
        assert_eq!(layer.allocated_tiles(), 0);

        layer.fill_span(10, 250, 520, true);

        assert_eq!(layer.allocated_tiles(), 3);
        assert_eq!(layer.get(249, 10), Some(false));
        assert_eq!(layer.get(250, 10), Some(true));
        assert_eq!(layer.get(256, 10), Some(true));
        assert_eq!(layer.get(520, 10), Some(true));
        assert_eq!(layer.get(521, 10), Some(false));
        assert_eq!(layer.get(300, 11), Some(false));
    }

    #[test]
    fn spans_are_clipped_to_layer() {
        let mut layer = TileLayer::new(100, 100, 0u8);

        layer.fill_span(5, -50, 500, 7);
        layer.fill_span(-3, 0, 10, 9);

        assert_eq!(layer.get(0, 5), Some(7));
        assert_eq!(layer.get(99, 5), Some(7));
        assert_eq!(layer.allocated_tiles(), 1);
    }

    #[test]
    fn capsule_covers_points_within_radius_only() {
        let mut layer = TileLayer::new(400, 400, false);
        let (a, b) = (Vec2::new(100.0, 200.0), Vec2::new(300.0, 200.0));

        layer.fill_capsule(a, b, 20.0, true);

        assert_eq!(layer.get(200, 200), Some(true));
        assert_eq!(layer.get(200, 220), Some(true));
        assert_eq!(layer.get(200, 221), Some(false));
        assert_eq!(layer.get(80, 200), Some(true));
        assert_eq!(layer.get(79, 200), Some(false));
        assert_eq!(layer.get(315, 215), Some(false));
    }

    #[test]
    fn diagonal_capsule_row_span_matches_distance_test() {
        let (a, b) = (Vec2::new(10.0, 10.0), Vec2::new(90.0, 70.0));
        let radius = 12.0;

        for y in 0..90 {
            let span = capsule_row_span(a, b, radius, y as f32);
            for x in 0..110 {
                let point = Vec2::new(x as f32, y as f32);
                let inside = distance_to_segment(point, a, b) <= radius - 1e-3;
                if inside {
                    let (lo, hi) = span.expect("row crossing the capsule has a span");
                    assert!(lo <= point.x && point.x <= hi, "({x}, {y}) outside {lo}..{hi}");
                }
            }
        }
    }

    fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
        let delta = b - a;
        let t = ((point - a).dot(delta) / delta.length_squared()).clamp(0.0, 1.0);
        point.distance(a + delta * t)
    }
}
