pub mod dynamics;
pub mod input;
pub mod stats;

pub use dynamics::{StepReport, TickInput, Vehicle};
pub use stats::{PartSlot, PartsSelection, VehicleStats};

use crate::assets::AssetRegistry;
use crate::gameplay::race::session::RACER_COUNT;
use crate::gameplay::race::ActiveRace;
use crate::render::world_to_scene;
use crate::states::GameState;
use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use input::{read_tick_input, DeviceSnapshot, WheelThrottle};
use std::f32::consts::FRAC_PI_2;

const CAR_SPRITE_SIZE: Vec2 = Vec2::new(50.0, 90.0);
const CAR_Z: f32 = 10.0;
const PIXELS_PER_WHEEL_NOTCH: f32 = 40.0;

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WheelThrottle>()
            .init_resource::<PlayerIntents>()
            .add_systems(OnEnter(GameState::Race), reset_player_input)
            .add_systems(OnExit(GameState::Race), cleanup_car_sprites)
            .add_systems(
                Update,
                (accumulate_wheel_throttle, sample_player_intents)
                    .chain()
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            )
            .add_systems(
                Update,
                (
                    spawn_car_sprites.run_if(resource_added::<ActiveRace>),
                    sync_car_sprites,
                )
                    .chain()
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            );
    }
}

/// Latest per-slot intent, consumed by the fixed race tick.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerIntents(pub [TickInput; RACER_COUNT]);

#[derive(Component, Debug, Clone, Copy)]
pub struct CarSprite {
    pub slot: usize,
}

fn reset_player_input(mut wheel: ResMut<WheelThrottle>, mut intents: ResMut<PlayerIntents>) {
    *wheel = WheelThrottle::default();
    *intents = PlayerIntents::default();
}

fn accumulate_wheel_throttle(
    mut wheel_events: MessageReader<MouseWheel>,
    mut wheel: ResMut<WheelThrottle>,
) {
    for event in wheel_events.read() {
        let notches = match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / PIXELS_PER_WHEEL_NOTCH,
        };
        wheel.scroll(notches);
    }
}

fn sample_player_intents(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    wheel: Res<WheelThrottle>,
    race: Res<ActiveRace>,
    mut intents: ResMut<PlayerIntents>,
) {
    let snapshot = DeviceSnapshot {
        keyboard: &keyboard,
        mouse: &mouse,
    };
    for (intent, racer) in intents.0.iter_mut().zip(&race.racers) {
        *intent = read_tick_input(racer.controls, &snapshot, wheel.0);
    }
}

fn spawn_car_sprites(
    mut commands: Commands,
    race: Res<ActiveRace>,
    registry: Option<Res<AssetRegistry>>,
    existing: Query<Entity, With<CarSprite>>,
) {
    for entity in &existing {
        commands.entity(entity).try_despawn();
    }

    for (slot, (racer, vehicle)) in race
        .racers
        .iter()
        .zip(race.session.vehicles())
        .enumerate()
    {
        let image = racer
            .sprite
            .as_deref()
            .zip(registry.as_deref())
            .and_then(|(id, registry)| registry.sprite_handle(id));

        let sprite = match image {
            Some(image) => Sprite {
                image,
                custom_size: Some(CAR_SPRITE_SIZE),
                ..default()
            },
            None => {
                warn!(
                    "No sprite for chassis `{}`; drawing a placeholder.",
                    racer.chassis_id
                );
                Sprite::from_color(racer.body_color, CAR_SPRITE_SIZE)
            }
        };

        commands.spawn((
            Name::new(format!("Car{}", slot + 1)),
            CarSprite { slot },
            sprite,
            car_transform(vehicle),
        ));
    }
}

fn sync_car_sprites(race: Res<ActiveRace>, mut sprites: Query<(&CarSprite, &mut Transform)>) {
    let vehicles = race.session.vehicles();
    for (car, mut transform) in &mut sprites {
        if let Some(vehicle) = vehicles.get(car.slot) {
            *transform = car_transform(vehicle);
        }
    }
}

fn car_transform(vehicle: &Vehicle) -> Transform {
    Transform::from_translation(world_to_scene(vehicle.position, CAR_Z))
        .with_rotation(Quat::from_rotation_z(vehicle.heading - FRAC_PI_2))
}

fn cleanup_car_sprites(mut commands: Commands, sprites: Query<Entity, With<CarSprite>>) {
    for entity in &sprites {
        commands.entity(entity).try_despawn();
    }
}
