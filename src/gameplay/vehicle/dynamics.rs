use super::stats::VehicleStats;
use crate::config::PhysicsConfig;
use crate::gameplay::laps::{vehicle_box, LapEvent, LapProgress, LapZones};
use crate::track::surface::CollisionSurface;
use bevy::math::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickInput {
    /// +1 steers left (counter-clockwise on screen), -1 steers right.
    pub turn: f32,
    /// 0..=1; analog on schemes that support it.
    pub throttle: f32,
    pub brake: bool,
}

impl TickInput {
    pub const IDLE: Self = Self {
        turn: 0.0,
        throttle: 0.0,
        brake: false,
    };

    fn is_coasting(&self) -> bool {
        self.throttle <= 0.0 && !self.brake
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    pub engine_volume: f32,
    pub drifting: bool,
    pub crashed: bool,
    pub laps: LapEvent,
}

/// A car on the track. Position and velocity are in world units (y down),
/// velocity per tick.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub stats: VehicleStats,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Radians; forward is `(cos, -sin)`.
    pub heading: f32,
    pub progress: LapProgress,
    pub finished: bool,
    rng: Pcg32,
}

impl Vehicle {
    pub fn new(stats: VehicleStats, position: Vec2, heading: f32, seed: u64) -> Self {
        Self {
            stats,
            position,
            velocity: Vec2::ZERO,
            heading,
            progress: LapProgress::default(),
            finished: false,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn forward(&self) -> Vec2 {
        Vec2::new(self.heading.cos(), -self.heading.sin())
    }

    pub fn right(&self) -> Vec2 {
        Vec2::new(-self.heading.sin(), -self.heading.cos())
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn lap(&self) -> u32 {
        self.progress.lap
    }

    pub fn engine_volume(&self, input: TickInput, physics: &PhysicsConfig) -> f32 {
        let speed = self.speed();
        if self.finished || speed < physics.engine_idle_speed {
            return 0.0;
        }
        let ratio = speed / self.stats.max_speed;
        let volume = if input.throttle > 0.0 {
            0.3 + ratio * 0.7
        } else {
            ratio * 0.5
        };
        volume.min(1.0)
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn step(
        &mut self,
        input: TickInput,
        surface: &CollisionSurface,
        zones: &LapZones,
        physics: &PhysicsConfig,
    ) -> StepReport {
        if self.finished {
            self.velocity *= physics.finished_decay;
            self.position += self.velocity;
            return StepReport::default();
        }

        let engine_volume = self.engine_volume(input, physics);
        let stats = self.stats;
        let forward = self.forward();
        let right = self.right();
        let throttle = input.throttle.clamp(0.0, 1.0);

        if throttle > 0.0 {
            self.velocity += forward * stats.acceleration * throttle;
        }

        if input.brake {
            if self.velocity.dot(forward) > physics.brake_engage_speed {
                self.velocity -= self.velocity * stats.brake_power;
            } else {
                self.velocity -= forward * stats.acceleration * physics.reverse_accel_factor;
            }
        }

        if input.is_coasting() {
            self.velocity *= physics.idle_decay;
        }

        let speed = self.speed();
        if speed > physics.turn_min_speed {
            let direction = if self.velocity.dot(forward) > physics.reverse_heading_threshold {
                1.0
            } else {
                -1.0
            };
            let authority = (speed / (stats.max_speed * physics.turn_speed_reference)).min(1.0);
            self.heading += input.turn.clamp(-1.0, 1.0) * stats.turn_rate * authority * direction;
        }

        // Grip bleeds off sideways motion in the frame the tick started in.
        let along = self.velocity.dot(forward);
        let lateral = self.velocity.dot(right) * (1.0 - stats.grip);
        let drifting = lateral.abs() > physics.drift_lateral_threshold
            && self.rng.random_bool(physics.drift_cue_chance);
        self.velocity = (forward * along + right * lateral).clamp_length_max(stats.max_speed);

        let crashed = !surface.is_drivable_at(self.position + self.velocity);
        if crashed {
            self.velocity *= -physics.bounce_restitution;
        }
        self.position += self.velocity;

        let laps = self
            .progress
            .observe(vehicle_box(self.position, physics.vehicle_box_size), zones);

        StepReport {
            engine_volume,
            drifting,
            crashed,
            laps,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::track::raster::TileLayer;
    use bevy::math::Rect;
    use std::f32::consts::FRAC_PI_2;

    pub(crate) fn test_stats() -> VehicleStats {
        VehicleStats {
            max_speed: 20.0,
            acceleration: 0.6,
            grip: 0.99,
            turn_rate: 2.4_f32.to_radians(),
            brake_power: 0.05,
            mass: 800.0,
        }
    }

    pub(crate) fn far_zones() -> LapZones {
        LapZones {
            start: Rect::new(-10_000.0, -10_000.0, -9_000.0, -9_000.0),
            checkpoint: Rect::new(-20_000.0, -20_000.0, -19_000.0, -19_000.0),
        }
    }

    fn walled_surface(width: u32, height: u32, drivable_width: i32) -> CollisionSurface {
        let mut layer = TileLayer::new(width, height, false);
        for y in 0..height as i32 {
            layer.fill_span(y, 0, drivable_width - 1, true);
        }
        CollisionSurface::from_layer(layer)
    }

    fn throttle() -> TickInput {
        TickInput {
            throttle: 1.0,
            ..TickInput::IDLE
        }
    }

    #[test]
    fn straight_line_speed_follows_acceleration_until_cap() {
        let surface = CollisionSurface::open(4_000, 200);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::new(50.0, 100.0), 0.0, 1);

        for tick in 1..=60 {
            vehicle.step(throttle(), &surface, &far_zones(), &physics);
            let expected = (0.6 * tick as f32).min(20.0);
            assert!(
                (vehicle.speed() - expected).abs() < 1e-3,
                "tick {tick}: {} vs {expected}",
                vehicle.speed()
            );
        }
        assert!(vehicle.velocity.y.abs() < 1e-4);
    }

    #[test]
    fn speed_never_exceeds_max_while_steering() {
        let surface = CollisionSurface::open(2_000, 2_000);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::splat(1_000.0), 0.0, 2);
        let input = TickInput {
            turn: 1.0,
            throttle: 1.0,
            brake: false,
        };

        for _ in 0..500 {
            vehicle.step(input, &surface, &far_zones(), &physics);
            assert!(vehicle.speed() <= vehicle.stats.max_speed + 1e-4);
        }
    }

    #[test]
    fn wall_reverses_and_halves_velocity() {
        let surface = walled_surface(1_000, 100, 500);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::new(495.0, 50.0), 0.0, 3);
        vehicle.velocity = Vec2::new(10.0, 0.0);

        let report = vehicle.step(TickInput::IDLE, &surface, &far_zones(), &physics);

        assert!(report.crashed);
        assert!((vehicle.velocity.x + 4.95).abs() < 1e-4);
        assert!(vehicle.speed() < 10.0);
        assert!((vehicle.position.x - 490.05).abs() < 1e-3);
    }

    #[test]
    fn leaving_the_world_counts_as_a_wall() {
        let surface = CollisionSurface::open(100, 100);
        let physics = PhysicsConfig::default();
        // Heading a quarter turn counter-clockwise points up the screen.
        let mut vehicle = Vehicle::new(test_stats(), Vec2::new(50.0, 2.0), FRAC_PI_2, 3);
        vehicle.velocity = Vec2::new(0.0, -8.0);

        let report = vehicle.step(TickInput::IDLE, &surface, &far_zones(), &physics);

        assert!(report.crashed);
        assert!(vehicle.velocity.y > 0.0);
    }

    #[test]
    fn brake_scrubs_speed_then_reverses_from_standstill() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig::default();
        let brake = TickInput {
            brake: true,
            ..TickInput::IDLE
        };

        let mut moving = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 4);
        moving.velocity = Vec2::new(10.0, 0.0);
        moving.step(brake, &surface, &far_zones(), &physics);
        assert!((moving.velocity.x - 9.5).abs() < 1e-4);

        let mut parked = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 4);
        parked.step(brake, &surface, &far_zones(), &physics);
        assert!((parked.velocity.x + 0.3).abs() < 1e-4);
    }

    #[test]
    fn coasting_decays_velocity() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 5);
        vehicle.velocity = Vec2::new(10.0, 0.0);

        vehicle.step(TickInput::IDLE, &surface, &far_zones(), &physics);

        assert!((vehicle.velocity.x - 9.9).abs() < 1e-4);
    }

    #[test]
    fn steering_flips_when_reversing() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig::default();
        let left = TickInput {
            turn: 1.0,
            ..TickInput::IDLE
        };

        let mut forward = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 6);
        forward.velocity = Vec2::new(18.0, 0.0);
        forward.step(left, &surface, &far_zones(), &physics);
        assert!((forward.heading - test_stats().turn_rate).abs() < 1e-6);

        let mut backward = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 6);
        backward.velocity = Vec2::new(-18.0, 0.0);
        backward.step(left, &surface, &far_zones(), &physics);
        assert!((backward.heading + test_stats().turn_rate).abs() < 1e-6);
    }

    #[test]
    fn no_steering_below_minimum_speed() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 7);
        let left = TickInput {
            turn: 1.0,
            ..TickInput::IDLE
        };

        vehicle.step(left, &surface, &far_zones(), &physics);

        assert_eq!(vehicle.heading, 0.0);
    }

    #[test]
    fn sideways_slide_raises_drift_cue() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig {
            drift_cue_chance: 1.0,
            ..PhysicsConfig::default()
        };
        let stats = VehicleStats {
            grip: 0.5,
            ..test_stats()
        };
        let mut vehicle = Vehicle::new(stats, Vec2::splat(500.0), 0.0, 8);
        vehicle.velocity = Vec2::new(0.0, 10.0);

        let report = vehicle.step(TickInput::IDLE, &surface, &far_zones(), &physics);

        assert!(report.drifting);
        assert!((vehicle.velocity.y - 10.0 * 0.99 * 0.5).abs() < 1e-4);
    }

    #[test]
    fn engine_volume_tracks_throttle_and_speed() {
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::ZERO, 0.0, 9);

        assert_eq!(vehicle.engine_volume(throttle(), &physics), 0.0);

        vehicle.velocity = Vec2::new(10.0, 0.0);
        assert!((vehicle.engine_volume(throttle(), &physics) - 0.65).abs() < 1e-5);
        assert!((vehicle.engine_volume(TickInput::IDLE, &physics) - 0.25).abs() < 1e-5);

        vehicle.velocity = Vec2::new(30.0, 0.0);
        assert_eq!(vehicle.engine_volume(throttle(), &physics), 1.0);
    }

    #[test]
    fn finished_vehicle_coasts_and_ignores_input() {
        let surface = CollisionSurface::open(1_000, 1_000);
        let physics = PhysicsConfig::default();
        let mut vehicle = Vehicle::new(test_stats(), Vec2::splat(500.0), 0.0, 10);
        vehicle.velocity = Vec2::new(10.0, 0.0);
        vehicle.finish();

        let report = vehicle.step(throttle(), &surface, &far_zones(), &physics);

        assert!((vehicle.velocity.x - 9.5).abs() < 1e-4);
        assert!((vehicle.position.x - 509.5).abs() < 1e-3);
        assert_eq!(report, StepReport::default());
    }
}
