use crate::config::{GameConfig, PlayerLoadout};
use crate::gameplay::race::session::RACER_COUNT;
use crate::gameplay::race::RACER_ACCENTS;
use crate::gameplay::vehicle::input::ControlScheme;
use crate::gameplay::vehicle::PartSlot;
use crate::results::{format_table, ResultsLog};
use bevy::app::AppExit;
use bevy::prelude::*;

const GARAGE_RECENT_RESULTS: usize = 5;
const TITLE_COLOR: Color = Color::srgb(1.0, 0.92, 0.2);
const TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);

/// Per-player garage keys; holding Shift steps parts backwards.
struct GarageBindings {
    chassis_prev: KeyCode,
    chassis_next: KeyCode,
    engine: KeyCode,
    tyre: KeyCode,
    brake: KeyCode,
}

const GARAGE_BINDINGS: [GarageBindings; RACER_COUNT] = [
    GarageBindings {
        chassis_prev: KeyCode::KeyA,
        chassis_next: KeyCode::KeyD,
        engine: KeyCode::Digit1,
        tyre: KeyCode::Digit2,
        brake: KeyCode::Digit3,
    },
    GarageBindings {
        chassis_prev: KeyCode::ArrowLeft,
        chassis_next: KeyCode::ArrowRight,
        engine: KeyCode::Digit8,
        tyre: KeyCode::Digit9,
        brake: KeyCode::Digit0,
    },
];

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    /// Track generation; runs once per launch.
    #[default]
    Loading,
    /// Loadout review between races.
    Garage,
    Race,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(OnExit(GameState::Loading), cleanup_loading_screen)
            .add_systems(OnEnter(GameState::Garage), enter_garage)
            .add_systems(OnExit(GameState::Garage), cleanup_garage_screen)
            .add_systems(
                Update,
                (
                    cycle_garage_loadouts,
                    refresh_garage_screen.run_if(resource_exists_and_changed::<GameConfig>),
                    garage_controls,
                )
                    .chain()
                    .run_if(in_state(GameState::Garage))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct LoadingScreenRoot;

#[derive(Component)]
struct GarageScreenRoot;

#[derive(Component)]
struct GarageSummaryText;

fn enter_loading(mut commands: Commands) {
    info!("Entered state: Loading");
    commands.spawn((
        Name::new("LoadingOverlay"),
        LoadingScreenRoot,
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            ..default()
        },
        children![(
            Text::new("INITIALIZING..."),
            TextFont {
                font_size: 60.0,
                ..default()
            },
            TextColor(RACER_ACCENTS[0]),
        )],
    ));
}

fn cleanup_loading_screen(
    mut commands: Commands,
    loading_query: Query<Entity, With<LoadingScreenRoot>>,
) {
    for entity in &loading_query {
        commands.entity(entity).try_despawn();
    }
}

fn enter_garage(mut commands: Commands, config: Res<GameConfig>) {
    info!("Entered state: Garage");
    let summary = garage_summary(&config);

    commands
        .spawn((
            Name::new("GarageOverlay"),
            GarageScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.01, 0.02, 0.03, 0.94)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent
                .spawn((
                    Node {
                        width: Val::Percent(74.0),
                        max_width: Val::Px(980.0),
                        min_width: Val::Px(520.0),
                        flex_direction: FlexDirection::Column,
                        row_gap: Val::Px(10.0),
                        padding: UiRect::all(Val::Px(16.0)),
                        border: UiRect::all(Val::Px(1.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.08, 0.10, 0.13, 0.96)),
                    BorderColor::all(Color::srgba(0.56, 0.62, 0.68, 0.92)),
                ))
                .with_children(|panel| {
                    panel.spawn((
                        Text::new("SPEED SHOW"),
                        TextFont {
                            font_size: 52.0,
                            ..default()
                        },
                        TextColor(TITLE_COLOR),
                    ));
                    panel.spawn((
                        GarageSummaryText,
                        Text::new(summary),
                        TextFont {
                            font_size: 20.0,
                            ..default()
                        },
                        TextColor(TEXT_PRIMARY),
                    ));
                    panel.spawn((
                        Text::new(
                            "P1: A/D car, 1/2/3 engine/tyres/brakes | P2: Left/Right car, 8/9/0 engine/tyres/brakes\n\
Shift + part key steps back | Enter - Race | F5 - Reload config | Q - Quit",
                        ),
                        TextFont {
                            font_size: 18.0,
                            ..default()
                        },
                        TextColor(TEXT_MUTED),
                    ));
                });
        });
}

fn refresh_garage_screen(
    config: Res<GameConfig>,
    mut summary_query: Query<&mut Text, With<GarageSummaryText>>,
) {
    let Ok(mut text) = summary_query.single_mut() else {
        return;
    };
    *text = Text::new(garage_summary(&config));
}

fn cleanup_garage_screen(
    mut commands: Commands,
    garage_query: Query<Entity, With<GarageScreenRoot>>,
) {
    for entity in &garage_query {
        commands.entity(entity).try_despawn();
    }
}

fn garage_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    if keyboard.just_pressed(KeyCode::Enter) {
        next_state.set(GameState::Race);
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}

fn cycle_garage_loadouts(keyboard: Res<ButtonInput<KeyCode>>, mut config: ResMut<GameConfig>) {
    let part_step = if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
        -1
    } else {
        1
    };

    for (slot, bindings) in GARAGE_BINDINGS.iter().enumerate() {
        let chassis_step = if keyboard.just_pressed(bindings.chassis_prev) {
            -1
        } else if keyboard.just_pressed(bindings.chassis_next) {
            1
        } else {
            0
        };
        if chassis_step != 0 {
            if let Some(chassis) = config.cycle_chassis(slot, chassis_step) {
                info!("Player {} picked chassis {chassis}.", slot + 1);
            }
        }

        for (key, part) in [
            (bindings.engine, PartSlot::Engine),
            (bindings.tyre, PartSlot::Tyre),
            (bindings.brake, PartSlot::Brake),
        ] {
            if keyboard.just_pressed(key) {
                if let Some(parts) = config.cycle_part(slot, part, part_step) {
                    debug!("Player {} parts now {parts:?}.", slot + 1);
                }
            }
        }
    }
}

fn garage_summary(config: &GameConfig) -> String {
    let mut sections: Vec<String> = (0..RACER_COUNT)
        .map(|slot| match config.player_loadout(slot) {
            Some(loadout) => loadout_summary(&loadout),
            None => format!("Player slot {} has no valid loadout.", slot + 1),
        })
        .collect();

    let log = ResultsLog::new(&config.game.app.results_path);
    let recent = match log.recent(Some(GARAGE_RECENT_RESULTS)) {
        Ok(records) => format_table(&records),
        Err(error) => {
            warn!("Could not read race results: {error}");
            "Race results unavailable.".to_string()
        }
    };
    sections.push(format!("RECENT RACES\n{recent}"));
    sections.join("\n\n")
}

fn loadout_summary(loadout: &PlayerLoadout<'_>) -> String {
    let controls = ControlScheme::parse(&loadout.player.controls)
        .map(ControlScheme::label)
        .unwrap_or("unknown controls");
    format!(
        "{name} - {chassis} ({controls})\nENGINE: {engine} | TYRES: {tyre} | BRAKES: {brake}",
        name = loadout.player.name,
        chassis = loadout.chassis.id,
        engine = loadout.engine.name,
        tyre = loadout.tyre.name,
        brake = loadout.brake.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    #[test]
    fn loadout_summary_names_every_part() {
        let config = sample_config();
        let loadout = config.player_loadout(1).expect("loadout");

        let summary = loadout_summary(&loadout);

        assert!(summary.starts_with("Player 2 - DRIFT (Arrows + Mouse)"));
        assert!(summary.contains("ENGINE: W16 Quad"));
        assert!(summary.contains("TYRES: Drift Comp"));
        assert!(summary.contains("BRAKES: Steel"));
    }

    #[test]
    fn garage_bindings_never_share_a_key() {
        let keys: Vec<KeyCode> = GARAGE_BINDINGS
            .iter()
            .flat_map(|bindings| {
                [
                    bindings.chassis_prev,
                    bindings.chassis_next,
                    bindings.engine,
                    bindings.tyre,
                    bindings.brake,
                ]
            })
            .collect();

        for (index, key) in keys.iter().enumerate() {
            assert!(!keys[index + 1..].contains(key), "{key:?} bound twice");
            assert!(![KeyCode::Enter, KeyCode::KeyQ, KeyCode::F5].contains(key));
        }
    }

    #[test]
    fn garage_summary_lists_recent_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = sample_config();
        let path = dir.path().join("racing_data.jsonl");
        config.game.app.results_path = path.display().to_string();
        ResultsLog::new(&path)
            .append("Player 1", "F1", "01:02:03")
            .expect("append");

        let summary = garage_summary(&config);

        assert!(summary.contains("RECENT RACES"));
        assert!(summary.contains("01:02:03"));
    }
}
