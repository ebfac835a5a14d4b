use super::minimap::MinimapProjection;
use super::raster::TileLayer;
use super::spline::SplineCurve;
use super::surface::Paint;
use super::TrackError;
use crate::config::TrackConfig;
use crate::gameplay::laps::LapZones;
use bevy::math::{Rect, Vec2};

#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub start_point: Vec2,
    pub checkpoint_point: Vec2,
    pub start_zone: Rect,
    pub checkpoint_zone: Rect,
    pub spawns: [Vec2; 2],
    /// Radians, counter-clockwise on screen; forward is `(cos, -sin)` in world space.
    pub spawn_heading: f32,
    pub start_direction: Vec2,
    pub minimap: MinimapProjection,
}

impl TrackMetadata {
    pub fn place(
        curve: &SplineCurve,
        config: &TrackConfig,
        minimap: MinimapProjection,
    ) -> Result<Self, TrackError> {
        let points = curve.points();
        let Some(&start_point) = points.first() else {
            return Err(TrackError::DegenerateCurve);
        };

        let lookahead = config.heading_lookahead_samples.max(1);
        let direction = points
            .iter()
            .skip(lookahead.min(points.len() - 1))
            .chain(points.iter().skip(1))
            .map(|&point| point - start_point)
            .find(|delta| delta.length_squared() > f32::EPSILON)
            .ok_or(TrackError::DegenerateCurve)?
            .normalize();

        let right = Vec2::new(-direction.y, direction.x);
        let spawns = [
            start_point - right * config.spawn_spacing,
            start_point + right * config.spawn_spacing,
        ];
        let checkpoint_point = points[points.len() / 2];

        Ok(Self {
            start_point,
            checkpoint_point,
            start_zone: Rect::from_center_size(start_point, Vec2::splat(config.start_zone_size)),
            checkpoint_zone: Rect::from_center_size(
                checkpoint_point,
                Vec2::splat(config.checkpoint_zone_size),
            ),
            spawns,
            spawn_heading: (-direction.y).atan2(direction.x),
            start_direction: direction,
            minimap,
        })
    }

    pub fn lap_zones(&self) -> LapZones {
        LapZones {
            start: self.start_zone,
            checkpoint: self.checkpoint_zone,
        }
    }

    /// Across-track unit vector, pointing from the first spawn to the second.
    pub fn start_right(&self) -> Vec2 {
        Vec2::new(-self.start_direction.y, self.start_direction.x)
    }
}

pub fn paint_start_line(layer: &mut TileLayer<Paint>, metadata: &TrackMetadata, config: &TrackConfig) {
    let width = config.track_width as f32;
    let thickness = config.start_line_thickness as f32;
    let check = config.start_line_check_size.max(1) as f32;
    let center = metadata.start_point;
    let along = metadata.start_direction;
    let across = metadata.start_right();
    let reach = Vec2::new(width, thickness).length() * 0.5;

    layer.paint_region(center - Vec2::splat(reach), center + Vec2::splat(reach), |pixel| {
        let offset = pixel - center;
        let u = offset.dot(across) + width * 0.5;
        let v = offset.dot(along) + thickness * 0.5;
        if !(0.0..width).contains(&u) || !(0.0..thickness).contains(&v) {
            return None;
        }
        let cell = (u / check).floor() as i64 + (v / check).floor() as i64;
        Some(if cell % 2 == 0 {
            Paint::CheckerWhite
        } else {
            Paint::CheckerBlack
        })
    });
}
