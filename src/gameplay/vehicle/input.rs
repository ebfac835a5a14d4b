use super::dynamics::TickInput;
use crate::config::{CONTROL_SCHEME_ARROWS_MOUSE, CONTROL_SCHEME_WASD};
use bevy::prelude::*;

const WHEEL_THROTTLE_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScheme {
    Wasd,
    ArrowsMouse,
}

impl ControlScheme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            CONTROL_SCHEME_WASD => Some(Self::Wasd),
            CONTROL_SCHEME_ARROWS_MOUSE => Some(Self::ArrowsMouse),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Wasd => "WASD",
            Self::ArrowsMouse => "Arrows + Mouse",
        }
    }
}

pub trait ControlSnapshot {
    fn key(&self, key: KeyCode) -> bool;
    fn mouse(&self, button: MouseButton) -> bool;
}

pub struct DeviceSnapshot<'a> {
    pub keyboard: &'a ButtonInput<KeyCode>,
    pub mouse: &'a ButtonInput<MouseButton>,
}

impl ControlSnapshot for DeviceSnapshot<'_> {
    fn key(&self, key: KeyCode) -> bool {
        self.keyboard.pressed(key)
    }

    fn mouse(&self, button: MouseButton) -> bool {
        self.mouse.pressed(button)
    }
}

/// Maps held buttons to one tick of intent. Later bindings override earlier
/// ones for steering, so right wins over left when both are held.
pub fn read_tick_input(
    scheme: ControlScheme,
    snapshot: &impl ControlSnapshot,
    wheel_throttle: f32,
) -> TickInput {
    let mut input = TickInput::IDLE;

    match scheme {
        ControlScheme::Wasd => {
            if snapshot.key(KeyCode::KeyA) {
                input.turn = 1.0;
            }
            if snapshot.key(KeyCode::KeyD) {
                input.turn = -1.0;
            }
            if snapshot.key(KeyCode::KeyW) {
                input.throttle = 1.0;
            }
            input.brake = snapshot.key(KeyCode::KeyS);
        }
        ControlScheme::ArrowsMouse => {
            if snapshot.key(KeyCode::ArrowLeft) {
                input.turn = 1.0;
            }
            if snapshot.key(KeyCode::ArrowRight) {
                input.turn = -1.0;
            }
            if snapshot.key(KeyCode::ArrowUp) {
                input.throttle = 1.0;
            }
            input.brake = snapshot.key(KeyCode::ArrowDown);

            if snapshot.mouse(MouseButton::Left) {
                input.turn = 1.0;
            }
            if snapshot.mouse(MouseButton::Right) {
                input.turn = -1.0;
            }
            if snapshot.mouse(MouseButton::Middle) {
                input.brake = true;
            }
            if input.throttle <= 0.0 && !input.brake && wheel_throttle > 0.0 {
                input.throttle = wheel_throttle.min(1.0);
            }
        }
    }

    input
}

/// Analog throttle level set by scrolling; persists between frames.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct WheelThrottle(pub f32);

impl WheelThrottle {
    pub fn scroll(&mut self, notches: f32) {
        self.0 = (self.0 + notches * WHEEL_THROTTLE_STEP).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Held {
        keys: HashSet<KeyCode>,
        buttons: HashSet<MouseButton>,
    }

    impl ControlSnapshot for Held {
        fn key(&self, key: KeyCode) -> bool {
            self.keys.contains(&key)
        }

        fn mouse(&self, button: MouseButton) -> bool {
            self.buttons.contains(&button)
        }
    }

    #[test]
    fn wasd_maps_to_turn_throttle_and_brake() {
        let held = Held {
            keys: [KeyCode::KeyW, KeyCode::KeyA].into_iter().collect(),
            ..Held::default()
        };

        let input = read_tick_input(ControlScheme::Wasd, &held, 0.0);

        assert_eq!(input.turn, 1.0);
        assert_eq!(input.throttle, 1.0);
        assert!(!input.brake);
    }

    #[test]
    fn wasd_ignores_arrow_keys() {
        let held = Held {
            keys: [KeyCode::ArrowUp].into_iter().collect(),
            ..Held::default()
        };

        assert_eq!(read_tick_input(ControlScheme::Wasd, &held, 1.0), TickInput::IDLE);
    }

    #[test]
    fn mouse_buttons_override_arrow_steering() {
        let held = Held {
            keys: [KeyCode::ArrowLeft].into_iter().collect(),
            buttons: [MouseButton::Right].into_iter().collect(),
        };

        let input = read_tick_input(ControlScheme::ArrowsMouse, &held, 0.0);

        assert_eq!(input.turn, -1.0);
    }

    #[test]
    fn wheel_throttle_applies_only_without_keys() {
        let idle = Held::default();
        let input = read_tick_input(ControlScheme::ArrowsMouse, &idle, 0.4);
        assert!((input.throttle - 0.4).abs() < 1e-6);

        let braking = Held {
            buttons: [MouseButton::Middle].into_iter().collect(),
            ..Held::default()
        };
        let input = read_tick_input(ControlScheme::ArrowsMouse, &braking, 0.4);
        assert_eq!(input.throttle, 0.0);
        assert!(input.brake);
    }

    #[test]
    fn wheel_throttle_is_clamped() {
        let mut wheel = WheelThrottle::default();

        wheel.scroll(3.0);
        assert!((wheel.0 - 0.3).abs() < 1e-6);
        wheel.scroll(50.0);
        assert_eq!(wheel.0, 1.0);
        wheel.scroll(-50.0);
        assert_eq!(wheel.0, 0.0);
    }

    #[test]
    fn control_scheme_parses_config_names() {
        assert_eq!(ControlScheme::parse("wasd"), Some(ControlScheme::Wasd));
        assert_eq!(ControlScheme::parse("arrows_mouse"), Some(ControlScheme::ArrowsMouse));
        assert_eq!(ControlScheme::parse("joystick"), None);
    }
}
