use crate::assets::AssetRegistry;
use crate::gameplay::race::session::RacePhase;
use crate::gameplay::race::ActiveRace;
use crate::gameplay::AudioCue;
use crate::states::GameState;
use bevy::audio::{AudioPlayer, AudioSink, AudioSinkPlayback, AudioSource, PlaybackSettings, Volume};
use bevy::prelude::*;
use std::collections::HashSet;

const AUDIO_ID_START: &str = "start";
const AUDIO_ID_SKID: &str = "skid";
const AUDIO_ID_CRASH: &str = "crash";

const ENGINE_BASE_PITCH: f32 = 0.8;
const ENGINE_PITCH_RANGE: f32 = 0.5;
const ENGINE_VOLUME_SMOOTHING: f32 = 10.0;

pub struct GameplaySfxPlugin;

impl Plugin for GameplaySfxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SfxMissingAssetWarnings>()
            .add_systems(OnEnter(GameState::Race), clear_sfx_warnings)
            .add_systems(OnExit(GameState::Race), cleanup_sfx_entities)
            .add_systems(
                Update,
                (
                    ensure_engine_loop_audio,
                    update_engine_loop_audio,
                    play_gameplay_sfx,
                )
                    .chain()
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            );
    }
}

/// Looping engine sound for one car.
#[derive(Component, Debug, Clone, Copy)]
struct EngineLoopAudio {
    slot: usize,
    base_volume: f32,
}

#[derive(Component, Debug, Clone, Copy, Default)]
struct EngineLoopRuntime {
    smoothed_volume: f32,
}

#[derive(Component)]
struct GameplaySfxTransient;

#[derive(Resource, Debug, Default)]
struct SfxMissingAssetWarnings {
    missing_ids: HashSet<String>,
}

fn clear_sfx_warnings(mut warnings: ResMut<SfxMissingAssetWarnings>) {
    warnings.missing_ids.clear();
}

#[allow(clippy::type_complexity)]
fn cleanup_sfx_entities(
    mut commands: Commands,
    sfx_query: Query<Entity, Or<(With<EngineLoopAudio>, With<GameplaySfxTransient>)>>,
) {
    for entity in &sfx_query {
        commands.entity(entity).try_despawn();
    }
}

fn ensure_engine_loop_audio(
    mut commands: Commands,
    race: Res<ActiveRace>,
    registry: Option<Res<AssetRegistry>>,
    mut warnings: ResMut<SfxMissingAssetWarnings>,
    existing_query: Query<(Entity, &EngineLoopAudio)>,
    mut stopped: Local<bool>,
) {
    if race.is_added() {
        *stopped = false;
    }

    if race.session.phase() == RacePhase::Finished {
        if !*stopped {
            for (entity, _) in &existing_query {
                commands.entity(entity).try_despawn();
            }
            *stopped = true;
        }
        return;
    }

    let Some(registry) = registry else {
        return;
    };
    let playing: HashSet<usize> = existing_query.iter().map(|(_, engine)| engine.slot).collect();

    for (slot, racer) in race.racers.iter().enumerate() {
        if playing.contains(&slot) {
            continue;
        }
        let Some((handle, base_volume)) =
            resolve_audio_handle(&racer.engine_sfx, &registry, &mut warnings)
        else {
            continue;
        };

        commands.spawn((
            Name::new(format!("SfxEngineLoop{}", slot + 1)),
            EngineLoopAudio { slot, base_volume },
            EngineLoopRuntime::default(),
            AudioPlayer::new(handle),
            PlaybackSettings::LOOP
                .with_volume(Volume::Linear(0.0))
                .with_speed(ENGINE_BASE_PITCH),
        ));
    }
}

fn update_engine_loop_audio(
    time: Res<Time>,
    race: Res<ActiveRace>,
    mut engine_query: Query<(&EngineLoopAudio, &mut EngineLoopRuntime, &mut AudioSink)>,
) {
    let dt = time.delta_secs();
    let vehicles = race.session.vehicles();

    for (engine, mut runtime, mut sink) in &mut engine_query {
        let (Some(vehicle), Some(step)) =
            (vehicles.get(engine.slot), race.last_tick.steps.get(engine.slot))
        else {
            continue;
        };

        runtime.smoothed_volume = runtime.smoothed_volume.lerp(
            step.engine_volume,
            (dt * ENGINE_VOLUME_SMOOTHING).clamp(0.0, 1.0),
        );
        let speed_ratio = (vehicle.speed() / vehicle.stats.max_speed).clamp(0.0, 1.0);

        sink.set_volume(Volume::Linear(
            (engine.base_volume * runtime.smoothed_volume).max(0.0),
        ));
        sink.set_speed(engine_pitch(speed_ratio));
    }
}

fn play_gameplay_sfx(
    mut commands: Commands,
    registry: Option<Res<AssetRegistry>>,
    mut warnings: ResMut<SfxMissingAssetWarnings>,
    mut cues: MessageReader<AudioCue>,
) {
    let Some(registry) = registry else {
        let _ = cues.read().count();
        return;
    };

    for cue in cues.read() {
        let audio_id = match cue {
            AudioCue::Start => AUDIO_ID_START,
            AudioCue::Drift { .. } => AUDIO_ID_SKID,
            AudioCue::Crash { .. } | AudioCue::CarContact => AUDIO_ID_CRASH,
        };
        let Some((handle, volume)) = resolve_audio_handle(audio_id, &registry, &mut warnings)
        else {
            continue;
        };
        if volume <= f32::EPSILON {
            continue;
        }

        commands.spawn((
            Name::new("GameplaySfxShot"),
            GameplaySfxTransient,
            AudioPlayer::<AudioSource>::new(handle),
            PlaybackSettings::DESPAWN.with_volume(Volume::Linear(volume)),
        ));
    }
}

fn resolve_audio_handle(
    audio_id: &str,
    registry: &AssetRegistry,
    warnings: &mut SfxMissingAssetWarnings,
) -> Option<(Handle<AudioSource>, f32)> {
    let Some(entry) = registry.audio.get(audio_id) else {
        if warnings.missing_ids.insert(audio_id.to_string()) {
            warn!("SFX audio asset `{audio_id}` is not present in registry.");
        }
        return None;
    };

    let Some(handle) = entry.file.handle.clone() else {
        if warnings.missing_ids.insert(audio_id.to_string()) {
            warn!(
                "SFX audio asset `{audio_id}` file `{}` is missing; it will stay silent.",
                entry.file.path
            );
        }
        return None;
    };

    Some((handle, entry.volume))
}

fn engine_pitch(speed_ratio: f32) -> f32 {
    ENGINE_BASE_PITCH + ENGINE_PITCH_RANGE * speed_ratio.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LoadedAsset, SoundAsset};

    #[test]
    fn missing_audio_is_recorded_once() {
        let mut registry = AssetRegistry::default();
        registry.audio.insert(
            AUDIO_ID_SKID.to_string(),
            SoundAsset {
                file: LoadedAsset::missing("audio/skid.wav"),
                volume: 0.5,
            },
        );
        let mut warnings = SfxMissingAssetWarnings::default();

        assert!(resolve_audio_handle(AUDIO_ID_SKID, &registry, &mut warnings).is_none());
        assert!(resolve_audio_handle(AUDIO_ID_CRASH, &registry, &mut warnings).is_none());
        assert!(resolve_audio_handle(AUDIO_ID_CRASH, &registry, &mut warnings).is_none());

        assert_eq!(warnings.missing_ids.len(), 2);
        assert!(warnings.missing_ids.contains(AUDIO_ID_SKID));
    }

    #[test]
    fn engine_pitch_rises_with_speed() {
        assert_eq!(engine_pitch(0.0), ENGINE_BASE_PITCH);
        assert!(engine_pitch(0.5) > engine_pitch(0.1));
        assert_eq!(engine_pitch(3.0), ENGINE_BASE_PITCH + ENGINE_PITCH_RANGE);
    }
}
