use crate::geometry::Vector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Shift,
    Control,
    Alt,
    Meta,
    ZoomIn,
    ZoomOut,
    ResetView,
}

const KEY_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KeyStates {
    down: [bool; KEY_COUNT],
}

impl KeyStates {
    /// Returns true when the key changed state.
    pub(crate) fn set(&mut self, key: Key, is_down: bool) -> bool {
        let slot = &mut self.down[key.index()];
        let changed = *slot != is_down;
        *slot = is_down;
        changed
    }

    pub(crate) fn is_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }
}

impl Key {
    const fn index(self) -> usize {
        match self {
            Key::Shift => 0,
            Key::Control => 1,
            Key::Alt => 2,
            Key::Meta => 3,
            Key::ZoomIn => 4,
            Key::ZoomOut => 5,
            Key::ResetView => 6,
        }
    }

    pub fn is_modifier(self) -> bool {
        matches!(self, Key::Shift | Key::Control | Key::Alt | Key::Meta)
    }
}

/// Last known pointer location in screen space plus held keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerState {
    position: Vector,
    keys: KeyStates,
}

impl PointerState {
    pub fn position(&self) -> Vector {
        self.position
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.keys.is_down(key)
    }

    pub(crate) fn set_position(&mut self, position: Vector) {
        self.position = position;
    }

    pub(crate) fn set_key(&mut self, key: Key, is_down: bool) -> bool {
        self.keys.set(key, is_down)
    }
}
