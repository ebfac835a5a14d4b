use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use speed_show::assets::AssetRegistryPlugin;
use speed_show::config::ConfigPlugin;
use speed_show::debug::DebugOverlayPlugin;
use speed_show::gameplay::GameplayPlugin;
use speed_show::render::TrackRenderPlugin;
use speed_show::states::{GameState, GameStatePlugin};
use speed_show::track::TrackPlugin;
use speed_show::ui::GameHudPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Speed Show".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(ConfigPlugin)
        .add_plugins(AssetRegistryPlugin)
        .add_plugins(TrackPlugin)
        .add_plugins(TrackRenderPlugin)
        .add_plugins(GameplayPlugin)
        .add_plugins(GameHudPlugin)
        .add_plugins(DebugOverlayPlugin)
        .init_state::<GameState>()
        .add_plugins(GameStatePlugin)
        .run();
}
