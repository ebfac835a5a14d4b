pub mod session;

use crate::config::GameConfig;
use crate::gameplay::vehicle::input::ControlScheme;
use crate::gameplay::vehicle::{PlayerIntents, Vehicle, VehicleStats};
use crate::gameplay::AudioCue;
use crate::results::ResultsLog;
use crate::states::GameState;
use crate::track::{Track, TrackHandle};
use bevy::prelude::*;
use session::{format_lap_time, RacePhase, RaceSession, TickReport, RACER_COUNT};
use std::time::Duration;
use thiserror::Error;

/// HUD and minimap accent per slot: orange for the left screen, teal for the right.
pub const RACER_ACCENTS: [Color; RACER_COUNT] = [
    Color::srgb(1.0, 0.6, 0.0),
    Color::srgb(0.0, 0.85, 0.8),
];

pub struct RacePlugin;

impl Plugin for RacePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            apply_fixed_timestep.run_if(resource_exists_and_changed::<GameConfig>),
        )
        .add_systems(OnEnter(GameState::Race), start_race)
        .add_systems(OnExit(GameState::Race), end_race)
        .add_systems(
            FixedUpdate,
            tick_race
                .run_if(in_state(GameState::Race))
                .run_if(resource_exists::<ActiveRace>)
                .run_if(resource_exists::<GameConfig>)
                .run_if(resource_exists::<TrackHandle>),
        )
        .add_systems(
            Update,
            (persist_race_outcome, race_controls)
                .chain()
                .run_if(in_state(GameState::Race))
                .run_if(resource_exists::<ActiveRace>)
                .run_if(resource_exists::<GameConfig>),
        );
    }
}

#[derive(Debug, Error)]
pub enum RaceSetupError {
    #[error("player slot {slot} has no resolvable loadout")]
    MissingLoadout { slot: usize },
    #[error("player slot {slot} uses unknown control scheme `{scheme}`")]
    UnknownControls { slot: usize, scheme: String },
}

/// Who drives a slot and how the car is drawn and heard.
#[derive(Debug, Clone)]
pub struct RacerInfo {
    pub name: String,
    pub chassis_id: String,
    pub sprite: Option<String>,
    pub engine_sfx: String,
    pub controls: ControlScheme,
    pub body_color: Color,
    pub accent: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Pending,
    Saved,
    Failed,
}

#[derive(Resource, Debug, Clone)]
pub struct ActiveRace {
    pub session: RaceSession,
    pub racers: [RacerInfo; RACER_COUNT],
    pub last_tick: TickReport,
    pub save_status: SaveStatus,
}

impl ActiveRace {
    pub fn winner(&self) -> Option<&RacerInfo> {
        self.session
            .outcome()
            .and_then(|outcome| self.racers.get(outcome.winner))
    }
}

/// Places both configured loadouts on the grid. Each car gets its own drift-cue seed.
pub fn build_race(
    config: &GameConfig,
    track: &Track,
    seeds: [u64; RACER_COUNT],
) -> Result<ActiveRace, RaceSetupError> {
    let racer = |slot: usize| -> Result<(Vehicle, RacerInfo), RaceSetupError> {
        let loadout = config
            .player_loadout(slot)
            .ok_or(RaceSetupError::MissingLoadout { slot })?;
        let controls = ControlScheme::parse(&loadout.player.controls).ok_or_else(|| {
            RaceSetupError::UnknownControls {
                slot,
                scheme: loadout.player.controls.clone(),
            }
        })?;
        let [red, green, blue] = loadout.chassis.color;

        let vehicle = Vehicle::new(
            VehicleStats::from_loadout(&loadout),
            track.metadata.spawns[slot],
            track.metadata.spawn_heading,
            seeds[slot],
        );
        let info = RacerInfo {
            name: loadout.player.name.clone(),
            chassis_id: loadout.chassis.id.clone(),
            sprite: loadout.chassis.sprite.clone(),
            engine_sfx: loadout.chassis.engine_sfx.clone(),
            controls,
            body_color: Color::srgb(red, green, blue),
            accent: RACER_ACCENTS[slot],
        };
        Ok((vehicle, info))
    };

    let (first_vehicle, first_info) = racer(0)?;
    let (second_vehicle, second_info) = racer(1)?;

    let app = &config.game.app;
    Ok(ActiveRace {
        session: RaceSession::new(
            [first_vehicle, second_vehicle],
            Duration::from_millis(app.countdown_ms),
            app.total_laps,
        ),
        racers: [first_info, second_info],
        last_tick: TickReport::default(),
        save_status: SaveStatus::Pending,
    })
}

fn apply_fixed_timestep(config: Res<GameConfig>, mut time: ResMut<Time<Fixed>>) {
    let hz = config.game.app.fixed_timestep_hz;
    time.set_timestep_hz(hz);
    info!("Race tick rate set to {hz:.1} Hz.");
}

fn start_race(
    mut commands: Commands,
    config: Res<GameConfig>,
    track: Option<Res<TrackHandle>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut cues: MessageWriter<AudioCue>,
) {
    info!("Entered state: Race");
    let Some(track) = track else {
        warn!("Race requested before the track was generated; returning to Loading.");
        next_state.set(GameState::Loading);
        return;
    };

    let seeds = [rand::random(), rand::random()];
    match build_race(&config, &track, seeds) {
        Ok(race) => {
            info!(
                "Race started: {} ({}) vs {} ({}), {} laps.",
                race.racers[0].name,
                race.racers[0].chassis_id,
                race.racers[1].name,
                race.racers[1].chassis_id,
                race.session.total_laps()
            );
            commands.insert_resource(race);
            cues.write(AudioCue::Start);
        }
        Err(error) => {
            error!("Cannot start race: {error}");
            next_state.set(GameState::Garage);
        }
    }
}

fn end_race(mut commands: Commands) {
    commands.remove_resource::<ActiveRace>();
}

fn tick_race(
    time: Res<Time>,
    config: Res<GameConfig>,
    track: Res<TrackHandle>,
    intents: Res<PlayerIntents>,
    mut race: ResMut<ActiveRace>,
    mut cues: MessageWriter<AudioCue>,
) {
    let zones = track.metadata.lap_zones();
    let report = race.session.tick(
        time.delta(),
        intents.0,
        &track.collision,
        &zones,
        &config.game.physics,
    );

    if report.started {
        info!("Lights out.");
    }

    for (slot, step) in report.steps.iter().enumerate() {
        if step.drifting {
            cues.write(AudioCue::Drift { slot });
        }
        if step.crashed {
            cues.write(AudioCue::Crash { slot });
        }
        if step.laps.checkpoint_reached {
            debug!("{} passed the checkpoint.", race.racers[slot].name);
        }
        if step.laps.lap_completed {
            info!(
                "{} completed lap {}/{}.",
                race.racers[slot].name,
                race.session.vehicles()[slot].progress.completed(),
                race.session.total_laps()
            );
        }
    }
    if report.contact {
        cues.write(AudioCue::CarContact);
    }
    if let Some(outcome) = report.finished {
        info!(
            "{} wins in {}.",
            race.racers[outcome.winner].name,
            format_lap_time(outcome.elapsed)
        );
    }

    race.last_tick = report;
}

fn persist_race_outcome(config: Res<GameConfig>, mut race: ResMut<ActiveRace>) {
    let Some(outcome) = race.session.take_unsaved_outcome() else {
        return;
    };

    let winner = &race.racers[outcome.winner];
    let lap_time = format_lap_time(outcome.elapsed);
    let log = ResultsLog::new(&config.game.app.results_path);
    let status = match log.append(&winner.name, &winner.chassis_id, &lap_time) {
        Ok(record) => {
            info!(
                "Saved race result #{} to `{}`.",
                record.id,
                log.path().display()
            );
            SaveStatus::Saved
        }
        Err(error) => {
            error!("Failed to save race result: {error}");
            SaveStatus::Failed
        }
    };
    race.save_status = status;
}

fn race_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    race: Res<ActiveRace>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        info!("Race abandoned.");
        next_state.set(GameState::Garage);
        return;
    }

    let finished = race.session.phase() == RacePhase::Finished;
    let confirm =
        keyboard.just_pressed(KeyCode::Enter) || mouse.just_pressed(MouseButton::Left);
    if finished && confirm {
        next_state.set(GameState::Garage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::track::tests::small_track;

    #[test]
    fn race_places_configured_loadouts_on_the_grid() {
        let config = sample_config();
        let track = small_track();

        let race = build_race(&config, &track, [1, 2]).expect("race");

        assert_eq!(race.racers[0].name, "Player 1");
        assert_eq!(race.racers[1].chassis_id, "DRIFT");
        assert_eq!(race.racers[0].controls, ControlScheme::Wasd);
        assert_eq!(race.racers[1].controls, ControlScheme::ArrowsMouse);
        assert_eq!(race.racers[1].engine_sfx, "eng_v6");

        let vehicles = race.session.vehicles();
        for (slot, vehicle) in vehicles.iter().enumerate() {
            assert_eq!(vehicle.position, track.metadata.spawns[slot]);
            assert_eq!(vehicle.heading, track.metadata.spawn_heading);
            assert_eq!(vehicle.lap(), 1);
        }
        assert!((vehicles[1].stats.max_speed - 15.0 * 1.3).abs() < 1e-4);
        assert_eq!(race.session.phase(), RacePhase::Countdown);
        assert_eq!(race.save_status, SaveStatus::Pending);
        assert!(race.winner().is_none());
    }

    #[test]
    fn unresolvable_loadout_is_reported_by_slot() {
        let mut config = sample_config();
        config.players.players[1].chassis = "HOVERCRAFT".to_string();

        let error = build_race(&config, &small_track(), [1, 2]).expect_err("setup should fail");

        assert!(matches!(error, RaceSetupError::MissingLoadout { slot: 1 }));
    }

    #[test]
    fn unknown_control_scheme_is_rejected() {
        let mut config = sample_config();
        config.players.players[0].controls = "joystick".to_string();

        let error = build_race(&config, &small_track(), [1, 2]).expect_err("setup should fail");

        assert!(error.to_string().contains("joystick"));
    }
}
