pub mod contact;
pub mod laps;
pub mod race;
pub mod sfx;
pub mod vehicle;

use bevy::prelude::*;
use race::RacePlugin;
use sfx::GameplaySfxPlugin;
use vehicle::VehicleGameplayPlugin;

/// Fire-and-forget sound requests raised by the race tick.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCue {
    Start,
    Drift { slot: usize },
    Crash { slot: usize },
    CarContact,
}

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<AudioCue>()
            .add_plugins(VehicleGameplayPlugin)
            .add_plugins(RacePlugin)
            .add_plugins(GameplaySfxPlugin);
    }
}
