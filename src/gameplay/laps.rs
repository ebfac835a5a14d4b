use bevy::math::{Rect, Vec2};

pub const FIRST_LAP: u32 = 1;

/// Start and checkpoint boxes a vehicle must cross, in that order, per lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapZones {
    pub start: Rect,
    pub checkpoint: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LapEvent {
    pub checkpoint_reached: bool,
    pub lap_completed: bool,
}

/// Current lap (counting from 1) and whether the checkpoint has been crossed
/// since the lap began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapProgress {
    pub lap: u32,
    pub checkpoint_passed: bool,
}

impl Default for LapProgress {
    fn default() -> Self {
        Self {
            lap: FIRST_LAP,
            checkpoint_passed: false,
        }
    }
}

impl LapProgress {
    /// Checkpoint is evaluated first, so a box touching both zones arms the
    /// lap and completes it on the same tick.
    pub fn observe(&mut self, vehicle_box: Rect, zones: &LapZones) -> LapEvent {
        let mut event = LapEvent::default();

        if overlaps(vehicle_box, zones.checkpoint) {
            event.checkpoint_reached = !self.checkpoint_passed;
            self.checkpoint_passed = true;
        }

        if overlaps(vehicle_box, zones.start) && self.checkpoint_passed {
            self.lap += 1;
            self.checkpoint_passed = false;
            event.lap_completed = true;
        }

        event
    }

    pub fn completed(&self) -> u32 {
        self.lap.saturating_sub(FIRST_LAP)
    }
}

pub fn vehicle_box(position: Vec2, size: f32) -> Rect {
    Rect::from_center_size(position, Vec2::splat(size))
}

pub fn overlaps(a: Rect, b: Rect) -> bool {
    !a.intersect(b).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> LapZones {
        LapZones {
            start: Rect::from_center_size(Vec2::new(0.0, 0.0), Vec2::splat(400.0)),
            checkpoint: Rect::from_center_size(Vec2::new(5_000.0, 0.0), Vec2::splat(600.0)),
        }
    }

    #[test]
    fn start_zone_without_checkpoint_does_not_count() {
        let mut progress = LapProgress::default();

        let event = progress.observe(vehicle_box(Vec2::ZERO, 40.0), &zones());

        assert!(!event.lap_completed);
        assert_eq!(progress.lap, 1);
    }

    #[test]
    fn checkpoint_then_start_completes_a_lap() {
        let mut progress = LapProgress::default();

        let event = progress.observe(vehicle_box(Vec2::new(5_000.0, 0.0), 40.0), &zones());
        assert!(event.checkpoint_reached);
        assert!(progress.checkpoint_passed);

        let event = progress.observe(vehicle_box(Vec2::ZERO, 40.0), &zones());
        assert!(event.lap_completed);
        assert_eq!(progress.lap, 2);
        assert_eq!(progress.completed(), 1);
        assert!(!progress.checkpoint_passed);

        let event = progress.observe(vehicle_box(Vec2::ZERO, 40.0), &zones());
        assert!(!event.lap_completed);
        assert_eq!(progress.lap, 2);
    }

    #[test]
    fn completed_laps_never_underflow() {
        let progress = LapProgress {
            lap: 0,
            checkpoint_passed: false,
        };

        assert_eq!(progress.completed(), 0);
    }

    #[test]
    fn touching_edges_is_not_an_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);

        assert!(!overlaps(a, b));
        assert!(overlaps(a, Rect::new(9.5, 9.5, 30.0, 30.0)));
    }
}
