use crate::gameplay::vehicle::stats::cycle_index;
use crate::gameplay::vehicle::{PartSlot, PartsSelection};
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR: &str = "config";

pub const CONTROL_SCHEME_WASD: &str = "wasd";
pub const CONTROL_SCHEME_ARROWS_MOUSE: &str = "arrows_mouse";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}` (track geometry is kept).");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} control points, {} chassis, {} engines, {} tyres, {} brakes, {} laps.",
        config.game.track.control_points.len(),
        config.chassis_by_id.len(),
        config.parts.engines.len(),
        config.parts.tyres.len(),
        config.parts.brakes.len(),
        config.game.app.total_laps
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub parts: PartsFile,
    pub players: PlayersFile,
    pub assets: AssetsFile,
    pub chassis_by_id: HashMap<String, ChassisConfig>,
    pub sprite_assets_by_id: HashMap<String, SpriteAssetConfig>,
    pub audio_assets_by_id: HashMap<String, AudioAssetConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        let parts: PartsFile = read_toml(&config_dir.join("parts.toml"))?;
        let players: PlayersFile = read_toml(&config_dir.join("players.toml"))?;
        let assets: AssetsFile = read_toml(&config_dir.join("assets.toml"))?;

        Self::from_files(game, vehicles, parts, players, assets)
    }

    pub fn from_files(
        game: GameFile,
        vehicles: VehiclesFile,
        parts: PartsFile,
        players: PlayersFile,
        assets: AssetsFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            chassis_by_id: to_index("vehicles.toml::chassis", &vehicles.chassis)?,
            sprite_assets_by_id: to_index("assets.toml::sprites", &assets.sprites)?,
            audio_assets_by_id: to_index("assets.toml::audio", &assets.audio)?,
            game,
            vehicles,
            parts,
            players,
            assets,
        };

        config.validate_references()?;
        Ok(config)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        let app = &self.game.app;
        if app.fixed_timestep_hz <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.fixed_timestep_hz must be > 0".to_string(),
            ));
        }
        if app.total_laps == 0 {
            return Err(ConfigError::Validation(
                "game.toml::app.total_laps must be >= 1".to_string(),
            ));
        }
        if app.results_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "game.toml::app.results_path cannot be empty".to_string(),
            ));
        }

        self.validate_track()?;
        self.validate_physics()?;

        for (index, chassis) in self.vehicles.chassis.iter().enumerate() {
            if chassis.base_speed <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].base_speed must be > 0"
                )));
            }
            if chassis.acceleration <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].acceleration must be > 0"
                )));
            }
            if chassis.turn_rate_degrees <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].turn_rate_degrees must be > 0"
                )));
            }
            if !(0.0 < chassis.base_grip && chassis.base_grip <= 1.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].base_grip must be in (0, 1]"
                )));
            }
            if chassis.mass <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].mass must be > 0"
                )));
            }
            if !self.audio_assets_by_id.contains_key(&chassis.engine_sfx) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::chassis[{index}].engine_sfx references unknown audio id `{}`",
                    chassis.engine_sfx
                )));
            }
            if let Some(sprite) = chassis.sprite.as_deref() {
                if !self.sprite_assets_by_id.contains_key(sprite) {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::chassis[{index}].sprite references unknown sprite id `{sprite}`"
                    )));
                }
            }
        }

        if self.parts.engines.is_empty()
            || self.parts.tyres.is_empty()
            || self.parts.brakes.is_empty()
        {
            return Err(ConfigError::Validation(
                "parts.toml must list at least one engine, one tyre and one brake".to_string(),
            ));
        }
        for (index, engine) in self.parts.engines.iter().enumerate() {
            if engine.speed_mult <= 0.0 || engine.accel_mult <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "parts.toml::engines[{index}] multipliers must be > 0"
                )));
            }
        }
        for (index, tyre) in self.parts.tyres.iter().enumerate() {
            if tyre.grip_mult <= 0.0 || tyre.turn_mult <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "parts.toml::tyres[{index}] multipliers must be > 0"
                )));
            }
        }
        for (index, brake) in self.parts.brakes.iter().enumerate() {
            if !(0.0..1.0).contains(&brake.power) {
                return Err(ConfigError::Validation(format!(
                    "parts.toml::brakes[{index}].power must be in [0, 1)"
                )));
            }
        }

        if self.players.players.len() != 2 {
            return Err(ConfigError::Validation(format!(
                "players.toml must define exactly 2 players, found {}",
                self.players.players.len()
            )));
        }
        for (index, player) in self.players.players.iter().enumerate() {
            if !self.chassis_by_id.contains_key(&player.chassis) {
                return Err(ConfigError::Validation(format!(
                    "players.toml::players[{index}].chassis references unknown chassis id `{}`",
                    player.chassis
                )));
            }
            if player.engine >= self.parts.engines.len() {
                return Err(ConfigError::Validation(format!(
                    "players.toml::players[{index}].engine index {} is out of range",
                    player.engine
                )));
            }
            if player.tyre >= self.parts.tyres.len() {
                return Err(ConfigError::Validation(format!(
                    "players.toml::players[{index}].tyre index {} is out of range",
                    player.tyre
                )));
            }
            if player.brake >= self.parts.brakes.len() {
                return Err(ConfigError::Validation(format!(
                    "players.toml::players[{index}].brake index {} is out of range",
                    player.brake
                )));
            }
            if !matches!(
                player.controls.as_str(),
                CONTROL_SCHEME_WASD | CONTROL_SCHEME_ARROWS_MOUSE
            ) {
                return Err(ConfigError::Validation(format!(
                    "players.toml::players[{index}].controls `{}` is unsupported (expected {CONTROL_SCHEME_WASD}/{CONTROL_SCHEME_ARROWS_MOUSE})",
                    player.controls
                )));
            }
        }
        if self.players.players[0].controls == self.players.players[1].controls {
            return Err(ConfigError::Validation(
                "players.toml::players must use distinct control schemes".to_string(),
            ));
        }

        for (index, sprite) in self.assets.sprites.iter().enumerate() {
            if sprite.path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::sprites[{index}].path cannot be empty"
                )));
            }
        }

        for (index, audio) in self.assets.audio.iter().enumerate() {
            if audio.path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::audio[{index}].path cannot be empty"
                )));
            }
        }

        Ok(())
    }

    fn validate_track(&self) -> Result<(), ConfigError> {
        let track = &self.game.track;
        if track.world_size == 0 {
            return Err(ConfigError::Validation(
                "game.toml::track.world_size must be > 0".to_string(),
            ));
        }
        if track.subdivisions == 0 {
            return Err(ConfigError::Validation(
                "game.toml::track.subdivisions must be >= 1".to_string(),
            ));
        }
        if track.control_points.len() < 4 {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.control_points needs at least 4 points, found {}",
                track.control_points.len()
            )));
        }
        if track.track_width == 0 || track.collision_width == 0 || track.kerb_width == 0 {
            return Err(ConfigError::Validation(
                "game.toml::track stroke widths must be > 0".to_string(),
            ));
        }
        if track.kerb_width < track.track_width {
            return Err(ConfigError::Validation(
                "game.toml::track.kerb_width must be >= track_width".to_string(),
            ));
        }
        if track.collision_width < track.track_width {
            return Err(ConfigError::Validation(
                "game.toml::track.collision_width must be >= track_width".to_string(),
            ));
        }
        if track.dash_length <= 0.0 || track.gap_length < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track dash_length must be > 0 and gap_length >= 0".to_string(),
            ));
        }
        if track.minimap_size == 0 || track.minimap_outline_width <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track minimap_size and minimap_outline_width must be > 0".to_string(),
            ));
        }
        if track.start_zone_size <= 0.0 || track.checkpoint_zone_size <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::track zone sizes must be > 0".to_string(),
            ));
        }
        if track.start_line_check_size == 0 {
            return Err(ConfigError::Validation(
                "game.toml::track.start_line_check_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_physics(&self) -> Result<(), ConfigError> {
        let physics = &self.game.physics;
        for (label, value) in [
            ("idle_decay", physics.idle_decay),
            ("finished_decay", physics.finished_decay),
            ("drift_cue_chance", physics.drift_cue_chance as f32),
            ("bounce_restitution", physics.bounce_restitution),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::physics.{label} must be in [0, 1]"
                )));
            }
        }
        if physics.turn_speed_reference <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics.turn_speed_reference must be > 0".to_string(),
            ));
        }
        if physics.vehicle_box_size <= 0.0 || physics.car_contact_distance <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::physics vehicle_box_size and car_contact_distance must be > 0"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Chassis, engine, tyre and brake rows chosen by the player in `slot` (0 or 1).
    pub fn player_loadout(&self, slot: usize) -> Option<PlayerLoadout<'_>> {
        let player = self.players.players.get(slot)?;
        let parts = PartsSelection::from(player);
        Some(PlayerLoadout {
            player,
            parts,
            chassis: self.chassis_by_id.get(&player.chassis)?,
            engine: self.parts.engines.get(parts.engine)?,
            tyre: self.parts.tyres.get(parts.tyre)?,
            brake: self.parts.brakes.get(parts.brake)?,
        })
    }

    /// Steps the chassis of player `slot` through `vehicles.toml` order.
    pub fn cycle_chassis(&mut self, slot: usize, step: i32) -> Option<String> {
        let chassis = &self.vehicles.chassis;
        let player = self.players.players.get_mut(slot)?;
        let current = chassis
            .iter()
            .position(|row| row.id == player.chassis)
            .unwrap_or(0);
        let next = chassis.get(cycle_index(current, step, chassis.len())?)?;
        player.chassis = next.id.clone();
        Some(next.id.clone())
    }

    /// Steps one part of player `slot` through its `parts.toml` table.
    pub fn cycle_part(&mut self, slot: usize, part: PartSlot, step: i32) -> Option<PartsSelection> {
        let catalogue_len = match part {
            PartSlot::Engine => self.parts.engines.len(),
            PartSlot::Tyre => self.parts.tyres.len(),
            PartSlot::Brake => self.parts.brakes.len(),
        };
        let player = self.players.players.get_mut(slot)?;
        let parts = PartsSelection::from(&*player).cycled(part, step, catalogue_len);
        player.engine = parts.engine;
        player.tyre = parts.tyre;
        player.brake = parts.brake;
        Some(parts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerLoadout<'a> {
    pub player: &'a PlayerConfig,
    pub parts: PartsSelection,
    pub chassis: &'a ChassisConfig,
    pub engine: &'a EngineConfig,
    pub tyre: &'a TyreConfig,
    pub brake: &'a BrakeConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    #[error("{0}")]
    Validation(String),
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub track: TrackConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub fixed_timestep_hz: f64,
    pub total_laps: u32,
    #[serde(default = "default_countdown_ms")]
    pub countdown_ms: u64,
    #[serde(default = "default_results_path")]
    pub results_path: String,
    #[serde(default)]
    pub debug_overlay: bool,
}

fn default_countdown_ms() -> u64 {
    4_000
}

fn default_results_path() -> String {
    "racing_data.jsonl".to_string()
}

/// Geometry of the generated circuit, in world units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub world_size: u32,
    pub subdivisions: u32,
    pub track_width: u32,
    pub kerb_width: u32,
    pub kerb_highlight_inset: u32,
    pub collision_width: u32,
    pub dash_length: f32,
    pub gap_length: f32,
    pub lane_marking_width: f32,
    pub minimap_padding: f32,
    pub minimap_size: u32,
    pub minimap_outline_width: f32,
    pub heading_lookahead_samples: usize,
    pub spawn_spacing: f32,
    pub start_zone_size: f32,
    pub checkpoint_zone_size: f32,
    pub start_line_thickness: u32,
    pub start_line_check_size: u32,
    pub scenery_count: u32,
    pub scenery_sprite: String,
    pub seed: u64,
    pub control_points: Vec<[i32; 2]>,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            world_size: 20_000,
            subdivisions: 100,
            track_width: 400,
            kerb_width: 480,
            kerb_highlight_inset: 40,
            collision_width: 550,
            dash_length: 80.0,
            gap_length: 80.0,
            lane_marking_width: 12.0,
            minimap_padding: 500.0,
            minimap_size: 250,
            minimap_outline_width: 120.0,
            heading_lookahead_samples: 5,
            spawn_spacing: 60.0,
            start_zone_size: 400.0,
            checkpoint_zone_size: 600.0,
            start_line_thickness: 80,
            start_line_check_size: 40,
            scenery_count: 1_500,
            scenery_sprite: "tree".to_string(),
            seed: 0x5EED_0F_7EAC,
            control_points: Vec::new(),
        }
    }
}

/// Per-tick tunables shared by every vehicle. Speeds are world units per tick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub idle_decay: f32,
    pub finished_decay: f32,
    pub brake_engage_speed: f32,
    pub reverse_accel_factor: f32,
    pub turn_min_speed: f32,
    pub turn_speed_reference: f32,
    pub reverse_heading_threshold: f32,
    pub drift_lateral_threshold: f32,
    pub drift_cue_chance: f64,
    pub bounce_restitution: f32,
    pub vehicle_box_size: f32,
    pub engine_idle_speed: f32,
    pub car_contact_distance: f32,
    pub car_contact_force: f32,
    pub car_contact_separation: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            idle_decay: 0.99,
            finished_decay: 0.95,
            brake_engage_speed: 0.5,
            reverse_accel_factor: 0.5,
            turn_min_speed: 0.5,
            turn_speed_reference: 0.8,
            reverse_heading_threshold: -0.1,
            drift_lateral_threshold: 2.0,
            drift_cue_chance: 0.1,
            bounce_restitution: 0.5,
            vehicle_box_size: 40.0,
            engine_idle_speed: 0.5,
            car_contact_distance: 45.0,
            car_contact_force: 10.0,
            car_contact_separation: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub chassis: Vec<ChassisConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChassisConfig {
    pub id: String,
    pub base_speed: f32,
    pub acceleration: f32,
    pub turn_rate_degrees: f32,
    pub base_grip: f32,
    pub mass: f32,
    pub engine_sfx: String,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default = "default_chassis_color")]
    pub color: [f32; 3],
}

fn default_chassis_color() -> [f32; 3] {
    [1.0, 0.55, 0.0]
}

impl HasId for ChassisConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartsFile {
    pub engines: Vec<EngineConfig>,
    pub tyres: Vec<TyreConfig>,
    pub brakes: Vec<BrakeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    pub speed_mult: f32,
    pub accel_mult: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TyreConfig {
    pub name: String,
    pub grip_mult: f32,
    #[serde(default = "default_multiplier")]
    pub turn_mult: f32,
}

fn default_multiplier() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrakeConfig {
    pub name: String,
    pub power: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayersFile {
    pub players: Vec<PlayerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    pub chassis: String,
    #[serde(default)]
    pub engine: usize,
    #[serde(default)]
    pub tyre: usize,
    #[serde(default)]
    pub brake: usize,
    pub controls: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsFile {
    #[serde(default)]
    pub sprites: Vec<SpriteAssetConfig>,
    #[serde(default)]
    pub audio: Vec<AudioAssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpriteAssetConfig {
    pub id: String,
    pub path: String,
}

impl HasId for SpriteAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioAssetConfig {
    pub id: String,
    pub path: String,
    #[serde(default = "default_audio_volume")]
    pub volume: f32,
}

fn default_audio_volume() -> f32 {
    0.7
}

impl HasId for AudioAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
