//! Pointer and keyboard translation.
//!
//! Raw window events are reduced to the two things the effect consumes:
//! drag deltas for the orbit camera and wind key presses.

use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::wind::WindDirection;

/// Drag gesture tracking for the left mouse button.
///
/// The pointer position is tracked whether or not the button is down, so a
/// drag is anchored where the button was pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    dragging: bool,
    last: Option<(f64, f64)>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Start a gesture at the last known pointer position.
    pub fn press(&mut self) {
        self.dragging = true;
    }

    pub fn release(&mut self) {
        self.dragging = false;
    }

    /// Record a pointer position, returning the delta since the previous one
    /// while a drag is active.
    pub fn moved(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        let previous = self.last.replace((x, y));
        if !self.dragging {
            return None;
        }
        previous.map(|(last_x, last_y)| ((x - last_x) as f32, (y - last_y) as f32))
    }
}

/// Input an effect reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Pointer drag delta in pixels.
    Drag { dx: f32, dy: f32 },
    /// A wind key was pressed.
    Wind(WindDirection),
}

/// Key bindings for the two wind directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindKeys {
    pub negative: KeyCode,
    pub positive: KeyCode,
}

impl Default for WindKeys {
    fn default() -> Self {
        Self {
            negative: KeyCode::KeyA,
            positive: KeyCode::KeyD,
        }
    }
}

impl WindKeys {
    /// Map a physical key to a wind direction.
    pub fn direction(&self, key: PhysicalKey) -> Option<WindDirection> {
        match key {
            PhysicalKey::Code(code) if code == self.negative => Some(WindDirection::Negative),
            PhysicalKey::Code(code) if code == self.positive => Some(WindDirection::Positive),
            _ => None,
        }
    }
}

/// Turns window events into [`Action`]s.
#[derive(Debug, Clone, Default)]
pub struct InputMapper {
    drag: DragState,
    keys: WindKeys,
}

impl InputMapper {
    pub fn new(keys: WindKeys) -> Self {
        Self {
            drag: DragState::new(),
            keys,
        }
    }

    /// Translate one window event. Events the effect ignores yield `None`.
    pub fn handle(&mut self, event: &WindowEvent) -> Option<Action> {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                match state {
                    ElementState::Pressed => self.drag.press(),
                    ElementState::Released => self.drag.release(),
                }
                None
            }
            WindowEvent::CursorMoved { position, .. } => self
                .drag
                .moved(position.x, position.y)
                .map(|(dx, dy)| Action::Drag { dx, dy }),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.keys.direction(*physical_key).map(Action::Wind),
            _ => None,
        }
    }
}
