use crate::assets::AssetRegistry;
use crate::config::GameConfig;
use crate::gameplay::race::ActiveRace;
use crate::states::GameState;
use crate::track::raster::TILE_SIZE;
use crate::track::surface::Paint;
use crate::track::TrackHandle;
use bevy::asset::RenderAssetUsages;
use bevy::camera::visibility::RenderLayers;
use bevy::camera::{ClearColorConfig, Viewport};
use bevy::image::ImageSampler;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::window::PrimaryWindow;

/// World pixels per texel of the uploaded track tiles.
const TRACK_TEXTURE_DOWNSAMPLE: u32 = 4;
const TRACK_Z: f32 = 0.0;
const TILE_Z: f32 = 1.0;
const SCENERY_Z: f32 = 20.0;
const TREE_SIZE: f32 = 110.0;
const HUD_RENDER_LAYER: usize = 1;

pub struct TrackRenderPlugin;

impl Plugin for TrackRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_hud_camera)
            .add_systems(
                Update,
                spawn_track_visuals
                    .run_if(resource_added::<TrackHandle>)
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Race), spawn_player_cameras)
            .add_systems(OnExit(GameState::Race), cleanup_player_cameras)
            .add_systems(
                Update,
                (fit_player_viewports, follow_racers)
                    .chain()
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            );
    }
}

/// Full-window camera that only draws UI, on top of both player views.
#[derive(Component)]
pub struct HudCamera;

/// One half of the split screen, following the car in `slot`.
#[derive(Component, Debug, Clone, Copy)]
pub struct PlayerCamera {
    pub slot: usize,
}

#[derive(Component)]
struct TrackVisual;

/// The minimap outline uploaded as a texture, plus its source size.
#[derive(Resource, Debug, Clone)]
pub struct MinimapImage {
    pub handle: Handle<Image>,
    pub size: UVec2,
}

/// Simulation space is y-down; the scene is y-up.
pub fn world_to_scene(world: Vec2, z: f32) -> Vec3 {
    Vec3::new(world.x, -world.y, z)
}

fn spawn_hud_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("HudCamera"),
        HudCamera,
        Camera2d,
        Camera {
            order: 2,
            ..default()
        },
        IsDefaultUiCamera,
        RenderLayers::layer(HUD_RENDER_LAYER),
    ));
}

fn spawn_track_visuals(
    mut commands: Commands,
    track: Res<TrackHandle>,
    config: Res<GameConfig>,
    registry: Option<Res<AssetRegistry>>,
    mut images: ResMut<Assets<Image>>,
    existing: Query<Entity, With<TrackVisual>>,
) {
    for entity in &existing {
        commands.entity(entity).try_despawn();
    }

    let layer = track.visual.layer();
    let world = Vec2::new(layer.width() as f32, layer.height() as f32);
    commands.spawn((
        Name::new("TrackBackground"),
        TrackVisual,
        Sprite::from_color(srgba_color(layer.background().rgba()), world),
        Transform::from_translation(world_to_scene(world * 0.5, TRACK_Z)),
    ));

    let grid = layer.tile_grid();
    let tile_extent = TILE_SIZE as f32;
    let mut uploaded = 0;
    for ty in 0..grid.y {
        for tx in 0..grid.x {
            let Some(cells) = layer.tile(tx, ty) else {
                continue;
            };
            let side = TILE_SIZE / TRACK_TEXTURE_DOWNSAMPLE;
            let handle = images.add(rgba_image(
                UVec2::splat(side),
                downsample_tile(cells, TRACK_TEXTURE_DOWNSAMPLE),
            ));
            let center = Vec2::new(tx as f32 + 0.5, ty as f32 + 0.5) * tile_extent;

            commands.spawn((
                Name::new(format!("TrackTile{tx}x{ty}")),
                TrackVisual,
                Sprite {
                    image: handle,
                    custom_size: Some(Vec2::splat(tile_extent)),
                    ..default()
                },
                Transform::from_translation(world_to_scene(center, TILE_Z)),
            ));
            uploaded += 1;
        }
    }

    let tree = registry
        .as_deref()
        .and_then(|registry| registry.sprite_handle(&config.game.track.scenery_sprite));
    if let Some(tree) = tree {
        for item in &track.scenery {
            commands.spawn((
                TrackVisual,
                Sprite {
                    image: tree.clone(),
                    custom_size: Some(Vec2::splat(TREE_SIZE * item.scale)),
                    ..default()
                },
                Transform::from_translation(world_to_scene(item.position, SCENERY_Z)),
            ));
        }
    }

    let size = track.minimap.size();
    let minimap = images.add(rgba_image(size, track.minimap.rgba_bytes()));
    commands.insert_resource(MinimapImage {
        handle: minimap,
        size,
    });

    info!(
        "Uploaded {uploaded} track tiles at 1/{TRACK_TEXTURE_DOWNSAMPLE} resolution and {} scenery sprites.",
        track.scenery.len()
    );
}

fn spawn_player_cameras(
    mut commands: Commands,
    mut hud_camera: Query<&mut Camera, With<HudCamera>>,
) {
    for slot in 0..2 {
        commands.spawn((
            Name::new(format!("PlayerCamera{}", slot + 1)),
            PlayerCamera { slot },
            Camera2d,
            Camera {
                order: slot as isize,
                ..default()
            },
        ));
    }

    // Player views clear the window now; the HUD draws over them.
    if let Ok(mut camera) = hud_camera.single_mut() {
        camera.clear_color = ClearColorConfig::None;
    }
}

fn cleanup_player_cameras(
    mut commands: Commands,
    cameras: Query<Entity, With<PlayerCamera>>,
    mut hud_camera: Query<&mut Camera, With<HudCamera>>,
) {
    for entity in &cameras {
        commands.entity(entity).try_despawn();
    }
    if let Ok(mut camera) = hud_camera.single_mut() {
        camera.clear_color = ClearColorConfig::Default;
    }
}

fn fit_player_viewports(
    window: Query<&Window, With<PrimaryWindow>>,
    mut cameras: Query<(&PlayerCamera, &mut Camera)>,
) {
    let Ok(window) = window.single() else {
        return;
    };
    let size = window.physical_size();
    let half_width = (size.x / 2).max(1);
    let height = size.y.max(1);

    for (player, mut camera) in &mut cameras {
        let viewport = Viewport {
            physical_position: UVec2::new(half_width * player.slot as u32, 0),
            physical_size: UVec2::new(half_width, height),
            ..default()
        };
        let changed = camera.viewport.as_ref().is_none_or(|current| {
            current.physical_position != viewport.physical_position
                || current.physical_size != viewport.physical_size
        });
        if changed {
            camera.viewport = Some(viewport);
        }
    }
}

fn follow_racers(
    race: Res<ActiveRace>,
    mut cameras: Query<(&PlayerCamera, &mut Transform)>,
) {
    let vehicles = race.session.vehicles();
    for (player, mut transform) in &mut cameras {
        if let Some(vehicle) = vehicles.get(player.slot) {
            let target = world_to_scene(vehicle.position, transform.translation.z);
            transform.translation = target;
        }
    }
}

/// Point-samples the centre of every `factor`-square block of a tile.
fn downsample_tile(cells: &[Paint], factor: u32) -> Vec<u8> {
    let factor = factor.clamp(1, TILE_SIZE);
    let side = TILE_SIZE / factor;
    let mut data = Vec::with_capacity((side * side * 4) as usize);
    for y in 0..side {
        for x in 0..side {
            let sx = x * factor + factor / 2;
            let sy = y * factor + factor / 2;
            let paint = cells
                .get((sy * TILE_SIZE + sx) as usize)
                .copied()
                .unwrap_or_default();
            data.extend_from_slice(&paint.rgba());
        }
    }
    data
}

fn rgba_image(size: UVec2, data: Vec<u8>) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD,
    );
    image.sampler = ImageSampler::nearest();
    image
}

fn srgba_color([red, green, blue, alpha]: [u8; 4]) -> Color {
    Color::srgba_u8(red, green, blue, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_space_flips_the_vertical_axis() {
        assert_eq!(
            world_to_scene(Vec2::new(120.0, 300.0), 4.0),
            Vec3::new(120.0, -300.0, 4.0)
        );
    }

    #[test]
    fn downsampled_tile_samples_block_centres() {
        let mut cells = vec![Paint::Grass; (TILE_SIZE * TILE_SIZE) as usize];
        // Texel (1, 0) at factor 4 samples pixel (6, 2).
        cells[(2 * TILE_SIZE + 6) as usize] = Paint::Asphalt;

        let data = downsample_tile(&cells, 4);

        let side = (TILE_SIZE / 4) as usize;
        assert_eq!(data.len(), side * side * 4);
        assert_eq!(&data[4..8], &Paint::Asphalt.rgba());
        assert_eq!(&data[0..4], &Paint::Grass.rgba());
    }
}
