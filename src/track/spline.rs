use super::TrackError;
use bevy::math::{IVec2, Vec2};

pub const MIN_CONTROL_POINTS: usize = 4;

/// Closed loop of integer control points; insertion order is the racing direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPolygon {
    points: Vec<IVec2>,
}

impl ControlPolygon {
    pub fn new(points: Vec<IVec2>) -> Result<Self, TrackError> {
        if points.len() < MIN_CONTROL_POINTS {
            return Err(TrackError::DegeneratePolygon {
                count: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn from_pairs(pairs: &[[i32; 2]]) -> Result<Self, TrackError> {
        Self::new(pairs.iter().map(|&[x, y]| IVec2::new(x, y)).collect())
    }

    pub fn points(&self) -> &[IVec2] {
        &self.points
    }

    fn wrapped(&self, index: isize) -> Vec2 {
        let len = self.points.len() as isize;
        self.points[index.rem_euclid(len) as usize].as_vec2()
    }
}

/// Dense closed centerline. The first and last samples coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineCurve {
    points: Vec<Vec2>,
}

impl SplineCurve {
    #[cfg(test)]
    pub(crate) fn from_points(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn arc_length(&self) -> f32 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    pub fn bounds(&self) -> (Vec2, Vec2) {
        self.points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), &point| (min.min(point), max.max(point)),
        )
    }
}

/// Samples a uniform Catmull-Rom spline through every control point of the loop.
pub fn catmull_rom_closed(
    polygon: &ControlPolygon,
    subdivisions: u32,
) -> Result<SplineCurve, TrackError> {
    if subdivisions == 0 {
        return Err(TrackError::InvalidSubdivision);
    }

    let count = polygon.points.len();
    let mut points = Vec::with_capacity(count * subdivisions as usize + 1);

    for window in 0..count as isize {
        let p0 = polygon.wrapped(window - 1);
        let p1 = polygon.wrapped(window);
        let p2 = polygon.wrapped(window + 1);
        let p3 = polygon.wrapped(window + 2);

        for step in 0..subdivisions {
            let t = step as f32 / subdivisions as f32;
            points.push(catmull_rom_point(p0, p1, p2, p3, t));
        }
    }

    let last = count as isize - 1;
    points.push(catmull_rom_point(
        polygon.wrapped(last - 1),
        polygon.wrapped(last),
        polygon.wrapped(last + 1),
        polygon.wrapped(last + 2),
        1.0,
    ));

    Ok(SplineCurve { points })
}

fn catmull_rom_point(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    let q0 = -t3 + 2.0 * t2 - t;
    let q1 = 3.0 * t3 - 5.0 * t2 + 2.0;
    let q2 = -3.0 * t3 + 4.0 * t2 + t;
    let q3 = t3 - t2;

    0.5 * (p0 * q0 + p1 * q1 + p2 * q2 + p3 * q3)
}
