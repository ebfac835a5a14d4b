use crate::config::{GameConfig, PhysicsConfig};
use crate::gameplay::race::session::RacePhase;
use crate::gameplay::race::ActiveRace;
use crate::gameplay::vehicle::input::WheelThrottle;
use crate::gameplay::vehicle::PlayerIntents;
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<PhysicsTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_physics_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                update_debug_overlay_text
                    .run_if(in_state(GameState::Race))
                    .run_if(resource_exists::<ActiveRace>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                physics_tuning_panel_ui.run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Resource, Debug, Default)]
struct PhysicsTuningPanelState {
    visible: bool,
    params: Option<PhysicsConfig>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            bottom: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            bottom: Val::Px(12.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    race: Res<ActiveRace>,
    intents: Res<PlayerIntents>,
    wheel: Res<WheelThrottle>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let phase = match race.session.phase() {
        RacePhase::Countdown => "countdown",
        RacePhase::Active => "active",
        RacePhase::Finished => "finished",
    };

    let mut lines = vec![
        format!("FPS: {fps:>5.1}"),
        format!(
            "Phase: {phase} | Race time: {:.2}s | Wheel throttle: {:.1}",
            race.session.race_time().as_secs_f32(),
            wheel.0
        ),
    ];
    for (slot, (vehicle, intent)) in race
        .session
        .vehicles()
        .iter()
        .zip(intents.0.iter())
        .enumerate()
    {
        let step = race.last_tick.steps[slot];
        lines.push(format!(
            "P{n}: pos ({x:>7.1}, {y:>7.1}) | speed {speed:>5.2}/{max:.1} | heading {heading:>6.1} deg | lap {lap} cp={cp} | turn {turn:+.0} thr {thr:.1} brk={brk} | vol {vol:.2}{drift}",
            n = slot + 1,
            x = vehicle.position.x,
            y = vehicle.position.y,
            speed = vehicle.speed(),
            max = vehicle.stats.max_speed,
            heading = vehicle.heading.to_degrees().rem_euclid(360.0),
            lap = vehicle.lap(),
            cp = if vehicle.progress.checkpoint_passed { "yes" } else { "no" },
            turn = intent.turn,
            thr = intent.throttle,
            brk = if intent.brake { "yes" } else { "no" },
            vol = step.engine_volume,
            drift = if step.drifting { " DRIFT" } else { "" },
        ));
    }
    lines.push("Hotkeys: H help | F1 physics tune | F5 reload config".to_string());

    *text = Text::new(lines.join("\n"));
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_physics_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<PhysicsTuningPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F1) {
        return;
    }
    let Some(config) = config else {
        return;
    };
    if !config.game.app.debug_overlay {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        panel_state.params = Some(config.game.physics.clone());
        panel_state.status.clear();
        info!("Physics tuning panel shown.");
    } else {
        info!("Physics tuning panel hidden.");
    }
}

fn physics_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<PhysicsTuningPanelState>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible || !config.game.app.debug_overlay {
        return;
    }

    let mut params = panel_state
        .params
        .clone()
        .unwrap_or_else(|| config.game.physics.clone());

    let mut window_open = panel_state.visible;
    let mut apply_clicked = false;
    let mut revert_clicked = false;
    let mut edited = false;
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Physics Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(460.0)
        .show(ctx, |ui| {
            ui.label("Changes apply to the running race after pressing Apply.");
            ui.separator();
            edited |= tuning_slider_row(ui, "Idle decay", &mut params.idle_decay, 0.9..=1.0, 0.001);
            edited |= tuning_slider_row(ui, "Finished decay", &mut params.finished_decay, 0.8..=1.0, 0.001);
            edited |= tuning_slider_row(ui, "Brake engage speed", &mut params.brake_engage_speed, 0.0..=3.0, 0.01);
            edited |= tuning_slider_row(ui, "Reverse accel factor", &mut params.reverse_accel_factor, 0.0..=1.0, 0.01);
            edited |= tuning_slider_row(ui, "Turn min speed", &mut params.turn_min_speed, 0.0..=3.0, 0.01);
            edited |= tuning_slider_row(ui, "Turn speed reference", &mut params.turn_speed_reference, 0.05..=3.0, 0.01);
            edited |= tuning_slider_row(ui, "Drift lateral threshold", &mut params.drift_lateral_threshold, 0.0..=10.0, 0.05);
            edited |= tuning_slider_row(ui, "Bounce restitution", &mut params.bounce_restitution, 0.0..=1.0, 0.01);
            edited |= tuning_slider_row(ui, "Car contact distance", &mut params.car_contact_distance, 5.0..=150.0, 0.5);
            edited |= tuning_slider_row(ui, "Car contact force", &mut params.car_contact_force, 0.0..=40.0, 0.1);
            edited |= tuning_slider_row(ui, "Car contact separation", &mut params.car_contact_separation, 0.0..=20.0, 0.1);
            ui.separator();
            ui.horizontal(|ui| {
                apply_clicked = ui.button("Apply").clicked();
                revert_clicked = ui.button("Revert").clicked();
            });
            if !status.is_empty() {
                ui.label(status);
            }
        });

    panel_state.visible = window_open;
    if revert_clicked {
        panel_state.params = Some(config.game.physics.clone());
        panel_state.status = "Reverted to active values.".to_string();
        return;
    }
    if apply_clicked {
        config.game.physics = params.clone();
        panel_state.status = "Applied.".to_string();
        info!("Physics tuning applied from debug panel.");
    } else if edited {
        panel_state.status = "Edited; press Apply to use these values.".to_string();
    }
    panel_state.params = Some(params);
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
F1 - Toggle physics tuning panel\n\
F5 - Hot-reload config\n\
P1: W throttle | S brake | A/D steer\n\
P2: Up throttle | Down brake | Left/Right steer\n\
P2 mouse: buttons steer | middle brake | wheel throttle\n\
Garage: A/D + 1/2/3 (P1), Left/Right + 8/9/0 (P2) cycle car and parts\n\
Enter - Start race / back to garage after finish\n\
Esc - Abandon race\n\
Q - Quit from garage"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;

    fn press_f1(debug_overlay: bool) -> bool {
        let mut config = sample_config();
        config.game.app.debug_overlay = debug_overlay;
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::F1);

        let mut app = App::new();
        app.init_resource::<PhysicsTuningPanelState>()
            .insert_resource(config)
            .insert_resource(keyboard)
            .add_systems(Update, toggle_physics_tuning_panel);
        app.update();

        app.world().resource::<PhysicsTuningPanelState>().visible
    }

    #[test]
    fn tuning_panel_follows_debug_overlay_setting() {
        assert!(press_f1(true));
        assert!(!press_f1(false));
    }
}
