use crate::config::{
    BrakeConfig, ChassisConfig, EngineConfig, PlayerConfig, PlayerLoadout, TyreConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartsSelection {
    pub engine: usize,
    pub tyre: usize,
    pub brake: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSlot {
    Engine,
    Tyre,
    Brake,
}

impl PartsSelection {
    /// Moves one part `step` entries through a catalogue of `catalogue_len`
    /// rows, wrapping at both ends.
    pub fn cycled(self, part: PartSlot, step: i32, catalogue_len: usize) -> Self {
        let mut next = self;
        let index = match part {
            PartSlot::Engine => &mut next.engine,
            PartSlot::Tyre => &mut next.tyre,
            PartSlot::Brake => &mut next.brake,
        };
        if let Some(wrapped) = cycle_index(*index, step, catalogue_len) {
            *index = wrapped;
        }
        next
    }
}

pub fn cycle_index(current: usize, step: i32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    Some((current as i64 + i64::from(step)).rem_euclid(len) as usize)
}

impl From<&PlayerConfig> for PartsSelection {
    fn from(player: &PlayerConfig) -> Self {
        Self {
            engine: player.engine,
            tyre: player.tyre,
            brake: player.brake,
        }
    }
}

/// Performance figures fixed when the vehicle is built.
/// Speeds are world units per tick, `turn_rate` is radians per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub grip: f32,
    pub turn_rate: f32,
    pub brake_power: f32,
    pub mass: f32,
}

impl VehicleStats {
    pub fn combine(
        chassis: &ChassisConfig,
        engine: &EngineConfig,
        tyre: &TyreConfig,
        brake: &BrakeConfig,
    ) -> Self {
        Self {
            max_speed: chassis.base_speed * engine.speed_mult,
            acceleration: chassis.acceleration * engine.accel_mult,
            // Grip above 1 would flip lateral velocity every tick.
            grip: (chassis.base_grip * tyre.grip_mult).clamp(0.0, 1.0),
            turn_rate: (chassis.turn_rate_degrees * tyre.turn_mult).to_radians(),
            brake_power: brake.power,
            mass: chassis.mass,
        }
    }

    pub fn from_loadout(loadout: &PlayerLoadout<'_>) -> Self {
        Self::combine(loadout.chassis, loadout.engine, loadout.tyre, loadout.brake)
    }
}
