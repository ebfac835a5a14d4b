pub mod layout;
pub mod minimap;
pub mod raster;
pub mod scenery;
pub mod spline;
pub mod surface;

use crate::assets::AssetRegistry;
use crate::config::{GameConfig, TrackConfig};
use crate::states::GameState;
use bevy::math::UVec2;
use bevy::prelude::*;
use layout::{paint_start_line, TrackMetadata};
use minimap::{Minimap, MinimapProjection};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use raster::TileLayer;
use scenery::{scatter_scenery, SceneryItem};
use spline::{catmull_rom_closed, ControlPolygon, SplineCurve};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;
use surface::{CollisionSurface, Paint, VisualSurface};
use thiserror::Error;

pub struct TrackPlugin;

impl Plugin for TrackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            generate_track_while_loading
                .run_if(in_state(GameState::Loading))
                .run_if(resource_exists::<GameConfig>)
                .run_if(resource_exists::<AssetRegistry>),
        );
    }
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("control polygon needs at least 4 points, found {count}")]
    DegeneratePolygon { count: usize },
    #[error("spline subdivision count must be at least 1")]
    InvalidSubdivision,
    #[error("spline curve has no direction at its start point")]
    DegenerateCurve,
}

/// Everything produced from the control polygon. Built once, then only read.
#[derive(Debug)]
pub struct Track {
    pub curve: SplineCurve,
    pub collision: CollisionSurface,
    pub visual: VisualSurface,
    pub minimap: Minimap,
    pub metadata: TrackMetadata,
    pub scenery: Vec<SceneryItem>,
}

#[derive(Resource, Debug, Clone)]
pub struct TrackHandle(pub Arc<Track>);

impl Deref for TrackHandle {
    type Target = Track;

    fn deref(&self) -> &Track {
        &self.0
    }
}

fn generate_track_while_loading(
    mut commands: Commands,
    config: Res<GameConfig>,
    registry: Res<AssetRegistry>,
    existing: Option<Res<TrackHandle>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if existing.is_none() {
        let track_config = &config.game.track;
        let with_scenery = registry
            .sprite_handle(&track_config.scenery_sprite)
            .is_some();

        let started = Instant::now();
        let track = generate_track(track_config, with_scenery).unwrap_or_else(|error| {
            panic!("failed to generate track from `game.toml::track`: {error}");
        });

        info!(
            "Generated track: {} samples, {:.0} units long, {} visual tiles, {} collision tiles, {} scenery items in {:.2?}.",
            track.curve.len(),
            track.curve.arc_length(),
            track.visual.layer().allocated_tiles(),
            track.collision.allocated_tiles(),
            track.scenery.len(),
            started.elapsed()
        );
        commands.insert_resource(TrackHandle(Arc::new(track)));
    }

    next_state.set(GameState::Garage);
}

pub fn generate_track(config: &TrackConfig, with_scenery: bool) -> Result<Track, TrackError> {
    let polygon = ControlPolygon::from_pairs(&config.control_points)?;
    let curve = catmull_rom_closed(&polygon, config.subdivisions)?;
    let points = curve.points();
    let size = config.world_size;

    let mut visual = TileLayer::new(size, size, Paint::Grass);
    visual.stroke_polyline(points, config.kerb_width as f32 * 0.5, Paint::KerbRed);
    visual.stroke_polyline(
        points,
        config.kerb_width.saturating_sub(config.kerb_highlight_inset) as f32 * 0.5,
        Paint::KerbWhite,
    );
    visual.stroke_polyline(points, config.track_width as f32 * 0.5, Paint::Asphalt);
    paint_lane_markings(&mut visual, &curve, config);

    let mut collision = TileLayer::new(size, size, false);
    collision.stroke_polyline(points, config.collision_width as f32 * 0.5, true);
    let collision = CollisionSurface::from_layer(collision);

    let projection = MinimapProjection::fit_curve(
        &curve,
        config.minimap_padding,
        size,
        UVec2::splat(config.minimap_size),
    );
    let minimap = Minimap::render(&curve, projection, config.minimap_outline_width);

    let metadata = TrackMetadata::place(&curve, config, projection)?;
    paint_start_line(&mut visual, &metadata, config);

    let scenery = if with_scenery {
        let mut rng = Pcg32::seed_from_u64(config.seed);
        scatter_scenery(&collision, config.scenery_count, &mut rng)
    } else {
        Vec::new()
    };

    Ok(Track {
        curve,
        collision,
        visual: VisualSurface::from_layer(visual),
        minimap,
        metadata,
        scenery,
    })
}

fn paint_lane_markings(layer: &mut TileLayer<Paint>, curve: &SplineCurve, config: &TrackConfig) {
    let cycle = config.dash_length + config.gap_length;
    let radius = config.lane_marking_width * 0.5;
    let mut travelled = 0.0_f32;

    for (a, b) in curve.segments() {
        if travelled % cycle < config.dash_length {
            layer.fill_capsule(a, b, radius, Paint::LaneMarking);
        }
        travelled += a.distance(b);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bevy::math::Vec2;

    pub(crate) fn small_track_config() -> TrackConfig {
        TrackConfig {
            world_size: 2_000,
            subdivisions: 20,
            control_points: vec![[400, 400], [1600, 400], [1600, 1600], [400, 1600]],
            minimap_padding: 100.0,
            scenery_count: 40,
            ..TrackConfig::default()
        }
    }

    pub(crate) fn small_track() -> Track {
        generate_track(&small_track_config(), true).expect("small track")
    }

    #[test]
    fn points_near_the_centerline_are_drivable() {
        let track = small_track();
        let half_width = track_half_width();

        for (index, point) in track.curve.points().iter().enumerate().step_by(7) {
            let next = track.curve.points()[(index + 1) % track.curve.len()];
            let direction = (next - *point).normalize_or_zero();
            let normal = direction.perp();
            for offset in [-half_width, 0.0, half_width] {
                let probe = *point + normal * offset;
                assert!(
                    track.collision.is_drivable_at(probe),
                    "{probe} should be drivable"
                );
            }
        }
    }

    #[test]
    fn points_far_from_the_centerline_are_not_drivable() {
        let track = small_track();

        assert!(!track.collision.is_drivable_at(Vec2::splat(1_000.0)));
        assert!(!track.collision.is_drivable_at(Vec2::new(10.0, 10.0)));
        assert!(!track.collision.is_drivable_at(Vec2::new(-5.0, 400.0)));
        assert!(!track.collision.is_drivable_at(Vec2::new(400.0, 2_500.0)));
    }

    #[test]
    fn visual_layers_are_painted_in_order() {
        let track = small_track();
        let config = small_track_config();
        let visual = &track.visual;

        // Midpoint of the left side, where the curve runs straight down and
        // bulges outward, so outward probes measure true distance.
        let center = track.curve.points()[3 * 20 + 10];
        assert!(center.distance(Vec2::new(250.0, 1_000.0)) < 1e-2);
        let probe = |distance: u32| (center.x as i32 - distance as i32 + 5, center.y as i32);

        let (x, y) = probe(config.track_width / 2);
        assert_eq!(visual.paint_at(x, y), Some(Paint::Asphalt));
        let (x, y) = probe((config.kerb_width - config.kerb_highlight_inset) / 2);
        assert_eq!(visual.paint_at(x, y), Some(Paint::KerbWhite));
        let (x, y) = probe(config.kerb_width / 2);
        assert_eq!(visual.paint_at(x, y), Some(Paint::KerbRed));
        let (x, y) = probe(config.kerb_width / 2 + 10);
        assert_eq!(visual.paint_at(x, y), Some(Paint::Grass));
    }

    #[test]
    fn centerline_is_dashed() {
        let curve = SplineCurve::from_points(
            (0..=180).map(|step| Vec2::new(100.0 + step as f32 * 10.0, 500.0)).collect(),
        );
        let mut layer = TileLayer::new(2_000, 1_000, Paint::Asphalt);

        paint_lane_markings(&mut layer, &curve, &TrackConfig::default());

        let marked = (100..1_900)
            .filter(|&x| layer.get(x, 500) == Some(Paint::LaneMarking))
            .count();
        assert!(marked > 810 && marked < 1_170, "marked {marked} of 1800");
        assert_eq!(layer.get(105, 500), Some(Paint::LaneMarking));
        assert_eq!(layer.get(220, 500), Some(Paint::Asphalt));
    }

    #[test]
    fn scenery_is_skipped_without_sprite() {
        let track = generate_track(&small_track_config(), false).expect("track");

        assert!(track.scenery.is_empty());
        assert!(!small_track().scenery.is_empty());
    }

    #[test]
    fn degenerate_polygon_fails_generation() {
        let config = TrackConfig {
            control_points: vec![[0, 0], [10, 0], [10, 10]],
            ..small_track_config()
        };

        let error = generate_track(&config, false).expect_err("should fail");

        assert!(matches!(error, TrackError::DegeneratePolygon { count: 3 }));
    }

    fn track_half_width() -> f32 {
        small_track_config().track_width as f32 * 0.5
    }
}
