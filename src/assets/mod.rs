use crate::config::{AssetsFile, GameConfig};
use bevy::asset::Asset;
use bevy::prelude::*;
use std::collections::HashMap;
use std::path::Path;

const ASSET_ROOT_DIR: &str = "assets";

pub struct AssetRegistryPlugin;

impl Plugin for AssetRegistryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_asset_registry.run_if(resource_exists_and_changed::<GameConfig>),
        );
    }
}

/// Rebuilds the registry only when `assets.toml` itself changed; physics edits
/// also mark `GameConfig` as changed.
fn sync_asset_registry(
    mut commands: Commands,
    config: Res<GameConfig>,
    asset_server: Res<AssetServer>,
    registry: Option<ResMut<AssetRegistry>>,
) {
    let fingerprint = asset_table_fingerprint(&config.assets);
    if registry
        .as_ref()
        .is_some_and(|registry| registry.fingerprint == fingerprint)
    {
        return;
    }

    let next = AssetRegistry::load(&config, &asset_server, Path::new(ASSET_ROOT_DIR));
    let placeholder_cars = next.placeholder_chassis(&config);
    if !placeholder_cars.is_empty() {
        warn!(
            "Sprite files missing for chassis {}; coloured placeholders will be drawn.",
            placeholder_cars.join(", ")
        );
    }

    let verb = if registry.is_some() { "Reloaded" } else { "Loaded" };
    info!(
        "{verb} asset registry: sprites {}/{}, audio {}/{}.",
        next.sprites.values().filter(|entry| entry.exists_on_disk).count(),
        next.sprites.len(),
        next.audio.values().filter(|entry| entry.file.exists_on_disk).count(),
        next.audio.len(),
    );

    match registry {
        Some(mut registry) => *registry = next,
        None => commands.insert_resource(next),
    }
}

/// A file listed in `assets.toml` and, when present on disk, its loading handle.
#[derive(Debug, Clone)]
pub struct LoadedAsset<A: Asset> {
    pub path: String,
    pub exists_on_disk: bool,
    pub handle: Option<Handle<A>>,
}

impl<A: Asset> LoadedAsset<A> {
    fn load(path: &str, asset_server: &AssetServer, asset_root: &Path) -> Self {
        let exists_on_disk = asset_exists(asset_root, path);
        Self {
            path: path.to_string(),
            exists_on_disk,
            handle: exists_on_disk.then(|| asset_server.load(path.to_string())),
        }
    }

    pub fn missing(path: &str) -> Self {
        Self {
            path: path.to_string(),
            exists_on_disk: false,
            handle: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoundAsset {
    pub file: LoadedAsset<AudioSource>,
    pub volume: f32,
}

/// Car, tree and sound handles keyed by config id. A missing file leaves its
/// handle empty: cars fall back to a coloured box, trees are skipped and sounds
/// stay silent.
#[derive(Resource, Debug, Clone, Default)]
pub struct AssetRegistry {
    pub sprites: HashMap<String, LoadedAsset<Image>>,
    pub audio: HashMap<String, SoundAsset>,
    fingerprint: Vec<(String, String)>,
}

impl AssetRegistry {
    pub fn load(config: &GameConfig, asset_server: &AssetServer, asset_root: &Path) -> Self {
        let sprites = config
            .assets
            .sprites
            .iter()
            .map(|sprite| {
                let loaded = LoadedAsset::load(&sprite.path, asset_server, asset_root);
                (sprite.id.clone(), loaded)
            })
            .collect();
        let audio = config
            .assets
            .audio
            .iter()
            .map(|sound| {
                let file = LoadedAsset::load(&sound.path, asset_server, asset_root);
                let entry = SoundAsset {
                    file,
                    volume: sound.volume,
                };
                (sound.id.clone(), entry)
            })
            .collect();

        Self {
            sprites,
            audio,
            fingerprint: asset_table_fingerprint(&config.assets),
        }
    }

    pub fn sprite_handle(&self, id: &str) -> Option<Handle<Image>> {
        self.sprites.get(id).and_then(|entry| entry.handle.clone())
    }

    /// Chassis ids that will be drawn as placeholders.
    pub fn placeholder_chassis(&self, config: &GameConfig) -> Vec<String> {
        config
            .vehicles
            .chassis
            .iter()
            .filter(|chassis| {
                chassis
                    .sprite
                    .as_deref()
                    .is_none_or(|id| self.sprite_handle(id).is_none())
            })
            .map(|chassis| chassis.id.clone())
            .collect()
    }
}

fn asset_table_fingerprint(assets: &AssetsFile) -> Vec<(String, String)> {
    assets
        .sprites
        .iter()
        .map(|sprite| (sprite.id.clone(), sprite.path.clone()))
        .chain(
            assets
                .audio
                .iter()
                .map(|sound| (sound.id.clone(), format!("{}@{}", sound.path, sound.volume))),
        )
        .collect()
}

/// Labelled paths such as `cars.png#f1` resolve to the file before the label.
fn asset_exists(asset_root: &Path, path: &str) -> bool {
    let file_path = path.split('#').next().unwrap_or(path);
    asset_root.join(file_path).exists()
}
