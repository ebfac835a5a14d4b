use super::surface::CollisionSurface;
use bevy::math::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

const ATTEMPTS_PER_ITEM: u32 = 10;
const MIN_SCALE: f32 = 0.7;
const MAX_SCALE: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneryItem {
    pub position: Vec2,
    pub scale: f32,
}

/// Scatters up to `count` items on non-drivable pixels. Gives up after
/// `count * 10` samples, so a mostly drivable world yields fewer items.
pub fn scatter_scenery(surface: &CollisionSurface, count: u32, rng: &mut Pcg32) -> Vec<SceneryItem> {
    let mut items = Vec::with_capacity(count as usize);
    if surface.width() == 0 || surface.height() == 0 {
        return items;
    }

    let max_attempts = count.saturating_mul(ATTEMPTS_PER_ITEM);
    let mut attempts = 0;
    while (items.len() as u32) < count && attempts < max_attempts {
        attempts += 1;
        let x = rng.random_range(0..surface.width()) as i32;
        let y = rng.random_range(0..surface.height()) as i32;
        if surface.is_drivable(x, y) {
            continue;
        }
        items.push(SceneryItem {
            position: Vec2::new(x as f32, y as f32),
            scale: rng.random_range(MIN_SCALE..=MAX_SCALE),
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::raster::TileLayer;
    use rand::SeedableRng;

    fn half_drivable() -> CollisionSurface {
        let mut layer = TileLayer::new(200, 200, false);
        for y in 0..200 {
            layer.fill_span(y, 0, 99, true);
        }
        CollisionSurface::from_layer(layer)
    }

    #[test]
    fn items_land_only_off_track_with_bounded_scale() {
        let surface = half_drivable();
        let mut rng = Pcg32::seed_from_u64(7);

        let items = scatter_scenery(&surface, 50, &mut rng);

        assert_eq!(items.len(), 50);
        for item in &items {
            assert!(item.position.x >= 100.0);
            assert!((MIN_SCALE..=MAX_SCALE).contains(&item.scale));
        }
    }

    #[test]
    fn fully_drivable_world_gives_up_after_bounded_attempts() {
        let surface = CollisionSurface::open(64, 64);
        let mut rng = Pcg32::seed_from_u64(7);

        assert!(scatter_scenery(&surface, 20, &mut rng).is_empty());
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let surface = half_drivable();

        let a = scatter_scenery(&surface, 30, &mut Pcg32::seed_from_u64(99));
        let b = scatter_scenery(&surface, 30, &mut Pcg32::seed_from_u64(99));

        assert_eq!(a, b);
    }
}
