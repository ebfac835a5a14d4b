use super::raster::TileLayer;
use bevy::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Paint {
    #[default]
    Grass,
    KerbRed,
    KerbWhite,
    Asphalt,
    LaneMarking,
    CheckerWhite,
    CheckerBlack,
}

impl Paint {
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Grass => [34, 139, 34, 255],
            Self::KerbRed => [200, 0, 0, 255],
            Self::KerbWhite => [240, 240, 240, 255],
            Self::Asphalt => [50, 50, 50, 255],
            Self::LaneMarking | Self::CheckerWhite => [255, 255, 255, 255],
            Self::CheckerBlack => [0, 0, 0, 255],
        }
    }
}

/// Binary drivable mask. Read-only once generation finishes.
#[derive(Debug, Clone)]
pub struct CollisionSurface {
    layer: TileLayer<bool>,
}

impl CollisionSurface {
    pub(crate) fn from_layer(layer: TileLayer<bool>) -> Self {
        Self { layer }
    }

    pub fn open(width: u32, height: u32) -> Self {
        let mut layer = TileLayer::new(width, height, false);
        for y in 0..height as i32 {
            layer.fill_span(y, 0, width as i32 - 1, true);
        }
        Self { layer }
    }

    pub fn width(&self) -> u32 {
        self.layer.width()
    }

    pub fn height(&self) -> u32 {
        self.layer.height()
    }

    /// Out-of-bounds coordinates are never drivable.
    pub fn is_drivable(&self, x: i32, y: i32) -> bool {
        self.layer.get(x, y).unwrap_or(false)
    }

    pub fn is_drivable_at(&self, position: Vec2) -> bool {
        if !position.is_finite() {
            return false;
        }
        self.is_drivable(position.x.floor() as i32, position.y.floor() as i32)
    }

    pub fn allocated_tiles(&self) -> usize {
        self.layer.allocated_tiles()
    }
}

#[derive(Debug, Clone)]
pub struct VisualSurface {
    layer: TileLayer<Paint>,
}

impl VisualSurface {
    pub(crate) fn from_layer(layer: TileLayer<Paint>) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> &TileLayer<Paint> {
        &self.layer
    }

    pub fn paint_at(&self, x: i32, y: i32) -> Option<Paint> {
        self.layer.get(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_surface_is_drivable_inside_and_closed_outside() {
        let surface = CollisionSurface::open(64, 64);

        assert!(surface.is_drivable(0, 0));
        assert!(surface.is_drivable(63, 63));
        assert!(!surface.is_drivable(64, 10));
        assert!(!surface.is_drivable_at(Vec2::new(-0.5, 10.0)));
        assert!(!surface.is_drivable_at(Vec2::new(f32::NAN, 10.0)));
    }
}
