use crate::gameplay::race::session::{format_lap_time, CountdownStage, RACER_COUNT};
use crate::gameplay::race::{ActiveRace, SaveStatus, RACER_ACCENTS};
use crate::render::MinimapImage;
use crate::states::GameState;
use crate::track::TrackHandle;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_WINNER_Z_INDEX: i32 = 250;
const HUD_PANEL_BG: Color = Color::srgba(0.06, 0.09, 0.12, 0.78);
const HUD_TEXT_PRIMARY: Color = Color::srgb(0.94, 0.97, 1.0);
const HUD_TIMER_COLOR: Color = Color::srgb(1.0, 0.92, 0.2);
const HUD_SPEED_BAR_WIDTH_PX: f32 = 200.0;
const HUD_MINIMAP_DOT_PX: f32 = 10.0;
const LIGHT_ON: Color = Color::srgb(0.95, 0.1, 0.1);
const LIGHT_OFF: Color = Color::srgb(0.2, 0.0, 0.0);
const LIGHT_GO: Color = Color::srgb(0.1, 0.9, 0.2);
/// Speed at which the HUD bar is full, in world units per tick.
const SPEED_BAR_FULL: f32 = 60.0;
const KMH_PER_UNIT: f32 = 3.0;

pub struct GameHudPlugin;

impl Plugin for GameHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Race), spawn_race_hud)
            .add_systems(OnExit(GameState::Race), cleanup_race_hud)
            .add_systems(
                Update,
                (
                    update_player_panels,
                    update_minimap_dots,
                    update_countdown_and_timer,
                    update_winner_panel,
                )
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            );
    }
}

#[derive(Component)]
struct RaceHudRoot;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum HudTextKind {
    Name(usize),
    Lap(usize),
    Speed(usize),
    Timer,
    WinnerTitle,
    WinnerTime,
    WinnerSaved,
}

#[derive(Component)]
struct HudSpeedFill(usize);

#[derive(Component)]
struct HudMinimapDot(usize);

#[derive(Component)]
struct HudCountdownPanel;

#[derive(Component)]
struct HudCountdownLight(usize);

#[derive(Component)]
struct HudTimerPanel;

#[derive(Component)]
struct HudWinnerPanel;

fn spawn_race_hud(
    mut commands: Commands,
    minimap: Option<Res<MinimapImage>>,
    existing: Query<Entity, With<RaceHudRoot>>,
) {
    for entity in &existing {
        commands.entity(entity).try_despawn();
    }

    commands
        .spawn((
            Name::new("RaceHudRoot"),
            RaceHudRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|root| {
            root.spawn((
                Name::new("SplitDivider"),
                Node {
                    position_type: PositionType::Absolute,
                    left: Val::Percent(50.0),
                    margin: UiRect::left(Val::Px(-2.5)),
                    width: Val::Px(5.0),
                    height: Val::Percent(100.0),
                    ..default()
                },
                BackgroundColor(Color::BLACK),
            ));

            for slot in 0..RACER_COUNT {
                spawn_player_panel(root, slot);
            }

            if let Some(minimap) = minimap.as_deref() {
                spawn_minimap(root, minimap);
            }

            root.spawn((
                Name::new("CountdownPanel"),
                HudCountdownPanel,
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(150.0),
                    left: Val::Percent(50.0),
                    margin: UiRect::left(Val::Px(-120.0)),
                    width: Val::Px(240.0),
                    height: Val::Px(100.0),
                    justify_content: JustifyContent::SpaceEvenly,
                    align_items: AlignItems::Center,
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
            ))
            .with_children(|panel| {
                for index in 0..3 {
                    panel.spawn((
                        HudCountdownLight(index),
                        Node {
                            width: Val::Px(60.0),
                            height: Val::Px(60.0),
                            ..default()
                        },
                        BackgroundColor(LIGHT_OFF),
                    ));
                }
            });

            root.spawn((
                Name::new("TimerPanel"),
                HudTimerPanel,
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(10.0),
                    left: Val::Percent(50.0),
                    margin: UiRect::left(Val::Px(-100.0)),
                    width: Val::Px(200.0),
                    height: Val::Px(50.0),
                    justify_content: JustifyContent::Center,
                    align_items: AlignItems::Center,
                    display: Display::None,
                    ..default()
                },
                BackgroundColor(HUD_PANEL_BG),
            ))
            .with_children(|panel| {
                panel.spawn((
                    HudTextKind::Timer,
                    Text::new("00:00:00"),
                    TextFont {
                        font_size: 30.0,
                        ..default()
                    },
                    TextColor(HUD_TIMER_COLOR),
                ));
            });

            spawn_winner_panel(root);
        });
}

fn spawn_player_panel(root: &mut ChildSpawnerCommands, slot: usize) {
    let accent = RACER_ACCENTS[slot];
    let mut node = Node {
        position_type: PositionType::Absolute,
        top: Val::Px(10.0),
        width: Val::Px(250.0),
        flex_direction: FlexDirection::Column,
        row_gap: Val::Px(4.0),
        padding: UiRect::all(Val::Px(10.0)),
        border: UiRect::all(Val::Px(1.0)),
        ..default()
    };
    if slot == 0 {
        node.left = Val::Px(10.0);
    } else {
        node.right = Val::Px(10.0);
    }

    root.spawn((
        Name::new(format!("PlayerPanel{}", slot + 1)),
        node,
        BackgroundColor(HUD_PANEL_BG),
        BorderColor::all(accent),
    ))
    .with_children(|panel| {
        panel.spawn((
            HudTextKind::Name(slot),
            Text::new(format!("Player {}", slot + 1)),
            TextFont {
                font_size: 26.0,
                ..default()
            },
            TextColor(accent),
        ));
        panel.spawn((
            HudTextKind::Lap(slot),
            Text::new("LAP: 1/3"),
            TextFont {
                font_size: 18.0,
                ..default()
            },
            TextColor(HUD_TEXT_PRIMARY),
        ));
        panel
            .spawn(Node {
                column_gap: Val::Px(8.0),
                align_items: AlignItems::Center,
                ..default()
            })
            .with_children(|row| {
                row.spawn((
                    Node {
                        width: Val::Px(HUD_SPEED_BAR_WIDTH_PX),
                        height: Val::Px(8.0),
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.4, 0.4, 0.4)),
                ))
                .with_children(|bar| {
                    bar.spawn((
                        HudSpeedFill(slot),
                        Node {
                            width: Val::Px(0.0),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        BackgroundColor(accent),
                    ));
                });
                row.spawn((
                    HudTextKind::Speed(slot),
                    Text::new("0 KMH"),
                    TextFont {
                        font_size: 16.0,
                        ..default()
                    },
                    TextColor(HUD_TEXT_PRIMARY),
                ));
            });
    });
}

fn spawn_minimap(root: &mut ChildSpawnerCommands, minimap: &MinimapImage) {
    let size = minimap.size.as_vec2();
    root.spawn((
        Name::new("Minimap"),
        ImageNode::new(minimap.handle.clone()),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Percent(50.0),
            margin: UiRect::left(Val::Px(-size.x * 0.5)),
            width: Val::Px(size.x),
            height: Val::Px(size.y),
            ..default()
        },
    ))
    .with_children(|map| {
        for (slot, accent) in RACER_ACCENTS.iter().enumerate() {
            map.spawn((
                HudMinimapDot(slot),
                Node {
                    position_type: PositionType::Absolute,
                    width: Val::Px(HUD_MINIMAP_DOT_PX),
                    height: Val::Px(HUD_MINIMAP_DOT_PX),
                    ..default()
                },
                BackgroundColor(*accent),
            ));
        }
    });
}

fn spawn_winner_panel(root: &mut ChildSpawnerCommands) {
    root.spawn((
        Name::new("WinnerPanel"),
        HudWinnerPanel,
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(200.0),
            left: Val::Percent(50.0),
            margin: UiRect::left(Val::Px(-300.0)),
            width: Val::Px(600.0),
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::Center,
            row_gap: Val::Px(16.0),
            padding: UiRect::all(Val::Px(24.0)),
            display: Display::None,
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.85)),
        ZIndex(HUD_WINNER_Z_INDEX),
    ))
    .with_children(|panel| {
        panel.spawn((
            HudTextKind::WinnerTitle,
            Text::new(""),
            TextFont {
                font_size: 56.0,
                ..default()
            },
            TextColor(Color::srgb(0.0, 1.0, 1.0)),
        ));
        panel.spawn((
            HudTextKind::WinnerTime,
            Text::new(""),
            TextFont {
                font_size: 30.0,
                ..default()
            },
            TextColor(HUD_TEXT_PRIMARY),
        ));
        panel.spawn((
            HudTextKind::WinnerSaved,
            Text::new(""),
            TextFont {
                font_size: 20.0,
                ..default()
            },
            TextColor(HUD_TEXT_PRIMARY),
        ));
        panel.spawn((
            Text::new("Enter / Click - Garage"),
            TextFont {
                font_size: 18.0,
                ..default()
            },
            TextColor(HUD_TEXT_PRIMARY),
        ));
    });
}

fn cleanup_race_hud(mut commands: Commands, hud_query: Query<Entity, With<RaceHudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_player_panels(
    race: Res<ActiveRace>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
    mut fill_query: Query<(&HudSpeedFill, &mut Node)>,
) {
    let vehicles = race.session.vehicles();
    let total_laps = race.session.total_laps();

    for (kind, mut text) in &mut text_query {
        let line = match *kind {
            HudTextKind::Name(slot) => race.racers[slot].name.clone(),
            HudTextKind::Lap(slot) => {
                format!("LAP: {}/{total_laps}", vehicles[slot].lap().min(total_laps))
            }
            HudTextKind::Speed(slot) => format!("{} KMH", speed_readout(vehicles[slot].speed()).1),
            _ => continue,
        };
        if text.0 != line {
            text.0 = line;
        }
    }

    for (fill, mut node) in &mut fill_query {
        let (fraction, _) = speed_readout(vehicles[fill.0].speed());
        node.width = Val::Px(HUD_SPEED_BAR_WIDTH_PX * fraction);
    }
}

fn update_minimap_dots(
    race: Res<ActiveRace>,
    track: Option<Res<TrackHandle>>,
    mut dots: Query<(&HudMinimapDot, &mut Node)>,
) {
    let Some(track) = track else {
        return;
    };
    let vehicles = race.session.vehicles();
    for (dot, mut node) in &mut dots {
        let pixel = track.minimap.project(vehicles[dot.0].position);
        node.left = Val::Px(pixel.x - HUD_MINIMAP_DOT_PX * 0.5);
        node.top = Val::Px(pixel.y - HUD_MINIMAP_DOT_PX * 0.5);
    }
}

#[allow(clippy::type_complexity)]
fn update_countdown_and_timer(
    race: Res<ActiveRace>,
    mut panels: ParamSet<(
        Query<&mut Node, With<HudCountdownPanel>>,
        Query<&mut Node, With<HudTimerPanel>>,
    )>,
    mut lights: Query<(&HudCountdownLight, &mut BackgroundColor)>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
) {
    let stage = race.session.countdown_stage();
    let colors = countdown_light_colors(stage);

    if let Ok(mut node) = panels.p0().single_mut() {
        node.display = if stage == CountdownStage::Hidden {
            Display::None
        } else {
            Display::Flex
        };
    }
    for (light, mut color) in &mut lights {
        *color = BackgroundColor(colors[light.0]);
    }

    let timer_visible = matches!(stage, CountdownStage::Go | CountdownStage::Hidden);
    if let Ok(mut node) = panels.p1().single_mut() {
        node.display = if timer_visible {
            Display::Flex
        } else {
            Display::None
        };
    }
    let timer = format_lap_time(race.session.race_time());
    for (kind, mut text) in &mut text_query {
        if *kind == HudTextKind::Timer && text.0 != timer {
            text.0 = timer.clone();
        }
    }
}

fn update_winner_panel(
    race: Res<ActiveRace>,
    mut panel: Query<&mut Node, With<HudWinnerPanel>>,
    mut text_query: Query<(&HudTextKind, &mut Text)>,
) {
    let Ok(mut node) = panel.single_mut() else {
        return;
    };
    let (Some(winner), Some(outcome)) = (race.winner(), race.session.outcome()) else {
        node.display = Display::None;
        return;
    };
    node.display = Display::Flex;

    let saved = match race.save_status {
        SaveStatus::Pending => "Saving stats...",
        SaveStatus::Saved => "Stats Saved!",
        SaveStatus::Failed => "Stats could not be saved.",
    };
    for (kind, mut text) in &mut text_query {
        let line = match kind {
            HudTextKind::WinnerTitle => format!("{} WINS!", winner.name),
            HudTextKind::WinnerTime => format!("TIME: {}", format_lap_time(outcome.elapsed)),
            HudTextKind::WinnerSaved => saved.to_string(),
            _ => continue,
        };
        if text.0 != line {
            text.0 = line;
        }
    }
}

/// Bar fill in `0..=1` and the whole-number speed shown next to it.
fn speed_readout(speed: f32) -> (f32, u32) {
    let speed = speed.max(0.0);
    ((speed / SPEED_BAR_FULL).min(1.0), (speed * KMH_PER_UNIT) as u32)
}

fn countdown_light_colors(stage: CountdownStage) -> [Color; 3] {
    match stage {
        CountdownStage::Lights(lit) => {
            std::array::from_fn(|index| if index < lit as usize { LIGHT_ON } else { LIGHT_OFF })
        }
        CountdownStage::Go => [LIGHT_GO; 3],
        CountdownStage::Hidden => [LIGHT_OFF; 3],
    }
}
