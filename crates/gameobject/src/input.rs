//! Input action values forwarded to script components

use crate::NameHash;

/// One input action as delivered to a script's `on_input` function.
#[derive(Debug, Clone, Copy)]
pub struct InputAction {
    /// Hashed action name (e.g. `NameHash::of("jump")`)
    pub action_id: NameHash,
    /// Analog value of the action (button actions use 0.0/1.0)
    pub value: f32,
    /// The action was pressed this frame
    pub pressed: bool,
    /// The action was released this frame
    pub released: bool,
    /// The action is a key repeat
    pub repeated: bool,
}

impl InputAction {
    /// A press event for the given action with value 1.0
    pub fn pressed(action: &str) -> Self {
        Self {
            action_id: NameHash::of(action),
            value: 1.0,
            pressed: true,
            released: false,
            repeated: false,
        }
    }
}
