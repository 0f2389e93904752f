//! Keyboard input state.
//!
//! Two views of the keyboard, mirroring how the game consumes it:
//! - [`InputState`]: which keys are currently held. Game ticks poll this for
//!   autorepeat-style movement (held left/right/down).
//! - [`InputFrame`]: edge-triggered presses accumulated since the last
//!   rendered frame. Used for one-shot actions (hard drop). Cleared by the
//!   runtime after each frame is consumed.

use std::collections::HashSet;

/// Keys the engine reports. Anything else arrives as `Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowDown,
    ArrowUp,
    Space,
    Escape,
    Enter,
    Unknown(u32),
}

/// Persistent keyboard state (held keys).
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<Key>,
}

impl InputState {
    /// Returns whether `key` is currently held down.
    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Applies a key transition, recording edge-triggered presses into `frame`.
    ///
    /// OS key-repeat events update nothing: the key is already held and a
    /// repeat is not a new press.
    pub(crate) fn apply_key(
        &mut self,
        frame: &mut InputFrame,
        key: Key,
        pressed: bool,
        repeat: bool,
    ) {
        if repeat {
            return;
        }
        if pressed {
            self.held.insert(key);
            frame.pressed.push(key);
        } else {
            self.held.remove(&key);
        }
    }

    /// Drops all held keys (e.g. on focus loss, where releases may be missed).
    pub(crate) fn clear_held(&mut self) {
        self.held.clear();
    }
}

/// Per-frame input deltas: keys that went down since the last frame.
#[derive(Debug, Default)]
pub struct InputFrame {
    pressed: Vec<Key>,
}

impl InputFrame {
    /// Keys pressed (edge-triggered) since the last frame.
    pub fn pressed(&self) -> &[Key] {
        &self.pressed
    }

    /// Clears the per-frame deltas. Called by the runtime after each frame.
    pub(crate) fn clear(&mut self) {
        self.pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_held_and_records_edge() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_key(&mut frame, Key::ArrowLeft, true, false);
        assert!(state.is_held(Key::ArrowLeft));
        assert_eq!(frame.pressed(), &[Key::ArrowLeft]);
    }

    #[test]
    fn release_clears_held_without_edge() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_key(&mut frame, Key::Space, true, false);
        frame.clear();
        state.apply_key(&mut frame, Key::Space, false, false);

        assert!(!state.is_held(Key::Space));
        assert!(frame.pressed().is_empty());
    }

    #[test]
    fn os_repeat_is_not_a_new_press() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_key(&mut frame, Key::ArrowDown, true, false);
        frame.clear();
        state.apply_key(&mut frame, Key::ArrowDown, true, true);

        assert!(state.is_held(Key::ArrowDown));
        assert!(frame.pressed().is_empty());
    }
}
