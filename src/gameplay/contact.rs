use super::vehicle::Vehicle;
use crate::config::PhysicsConfig;
use bevy::math::Vec2;

/// Pushes two overlapping cars apart. The impulse is split by mass so the
/// lighter car is thrown further. Returns whether the cars touched.
pub fn resolve_car_contact(first: &mut Vehicle, second: &mut Vehicle, physics: &PhysicsConfig) -> bool {
    let offset = first.position - second.position;
    if offset.length() >= physics.car_contact_distance {
        return false;
    }

    let normal = offset.try_normalize().unwrap_or(Vec2::X);
    let total_mass = first.stats.mass + second.stats.mass;
    let force = physics.car_contact_force;

    first.velocity += normal * force * (second.stats.mass / total_mass);
    second.velocity -= normal * force * (first.stats.mass / total_mass);

    let nudge = normal * physics.car_contact_separation * 0.5;
    first.position += nudge;
    second.position -= nudge;

    first.velocity = first.velocity.clamp_length_max(first.stats.max_speed);
    second.velocity = second.velocity.clamp_length_max(second.stats.max_speed);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::vehicle::dynamics::tests::test_stats;
    use crate::gameplay::vehicle::VehicleStats;

    fn car_at(x: f32, mass: f32) -> Vehicle {
        let stats = VehicleStats {
            mass,
            ..test_stats()
        };
        Vehicle::new(stats, Vec2::new(x, 100.0), 0.0, 0)
    }

    #[test]
    fn converging_cars_are_pushed_apart() {
        let physics = PhysicsConfig::default();
        let mut first = car_at(120.0, 800.0);
        let mut second = car_at(100.0, 1_200.0);
        first.velocity = Vec2::new(-5.0, 0.0);
        second.velocity = Vec2::new(5.0, 0.0);
        let before = first.position.distance(second.position);

        assert!(resolve_car_contact(&mut first, &mut second, &physics));

        assert!(first.position.distance(second.position) > before);
        assert!((first.velocity.x - (-5.0 + 10.0 * 0.6)).abs() < 1e-4);
        assert!((second.velocity.x - (5.0 - 10.0 * 0.4)).abs() < 1e-4);
        let closing_speed = (second.velocity - first.velocity).dot(Vec2::X);
        assert!(closing_speed < 10.0);
    }

    #[test]
    fn rear_end_contact_keeps_both_cars_under_max_speed() {
        let physics = PhysicsConfig::default();
        let mut first = car_at(100.0, 1_000.0);
        let mut second = car_at(130.0, 1_000.0);
        let max_speed = first.stats.max_speed;
        first.velocity = Vec2::new(max_speed, 0.0);
        second.velocity = Vec2::new(max_speed - 0.5, 0.0);

        assert!(resolve_car_contact(&mut first, &mut second, &physics));

        assert!(first.speed() <= max_speed + 1e-4);
        assert!(second.speed() <= second.stats.max_speed + 1e-4);
        assert!(second.velocity.x > 0.0);
    }

    #[test]
    fn distant_cars_are_untouched() {
        let physics = PhysicsConfig::default();
        let mut first = car_at(200.0, 800.0);
        let mut second = car_at(100.0, 800.0);

        assert!(!resolve_car_contact(&mut first, &mut second, &physics));
        assert_eq!(first.velocity, Vec2::ZERO);
        assert_eq!(first.position, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn stacked_cars_still_separate() {
        let physics = PhysicsConfig::default();
        let mut first = car_at(100.0, 800.0);
        let mut second = car_at(100.0, 800.0);

        assert!(resolve_car_contact(&mut first, &mut second, &physics));
        assert!(first.position.x > second.position.x);
    }
}
