// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{BufRead, BufReader, Read};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::joystick::Joystick;
use crate::util::Shared;

// Design:
//   Host key events arrive on the UI thread and are translated into
//   machine-specific matrix updates through a MatrixBackend. The translation
//   table maps (host key, shift, altgr) to a matrix key plus the SHIFT state
//   the emulated machine must see, which may differ from the host state
//   (mode-shift compensation). Matrix storage is guarded by a mutex so the
//   emulator thread can scan rows while the UI thread types.

/// Host keyboard keys. Names follow the `KEY_*` convention used in key
/// mapping files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Esc,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    GraveAccent,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Num0,
    Minus,
    Equal,
    Backspace,
    Tab,
    Q,
    W,
    E,
    R,
    T,
    Y,
    U,
    I,
    O,
    P,
    OpenBracket,
    CloseBracket,
    Backslash,
    A,
    S,
    D,
    F,
    G,
    H,
    J,
    K,
    L,
    Semicolon,
    Apostrophe,
    Enter,
    Z,
    X,
    C,
    V,
    B,
    N,
    M,
    Comma,
    Dot,
    Slash,
    Space,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    Lt,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    AltGr,
}

static KEY_NAMES: &[(&str, Key)] = &[
    ("KEY_ESC", Key::Esc),
    ("KEY_F1", Key::F1),
    ("KEY_F2", Key::F2),
    ("KEY_F3", Key::F3),
    ("KEY_F4", Key::F4),
    ("KEY_F5", Key::F5),
    ("KEY_F6", Key::F6),
    ("KEY_F7", Key::F7),
    ("KEY_F8", Key::F8),
    ("KEY_F9", Key::F9),
    ("KEY_F10", Key::F10),
    ("KEY_F11", Key::F11),
    ("KEY_F12", Key::F12),
    ("KEY_GRAVE_ACCENT", Key::GraveAccent),
    ("KEY_1", Key::Num1),
    ("KEY_2", Key::Num2),
    ("KEY_3", Key::Num3),
    ("KEY_4", Key::Num4),
    ("KEY_5", Key::Num5),
    ("KEY_6", Key::Num6),
    ("KEY_7", Key::Num7),
    ("KEY_8", Key::Num8),
    ("KEY_9", Key::Num9),
    ("KEY_0", Key::Num0),
    ("KEY_MINUS", Key::Minus),
    ("KEY_EQUAL", Key::Equal),
    ("KEY_BACKSPACE", Key::Backspace),
    ("KEY_TAB", Key::Tab),
    ("KEY_Q", Key::Q),
    ("KEY_W", Key::W),
    ("KEY_E", Key::E),
    ("KEY_R", Key::R),
    ("KEY_T", Key::T),
    ("KEY_Y", Key::Y),
    ("KEY_U", Key::U),
    ("KEY_I", Key::I),
    ("KEY_O", Key::O),
    ("KEY_P", Key::P),
    ("KEY_OPEN_BRACKET", Key::OpenBracket),
    ("KEY_CLOSE_BRACKET", Key::CloseBracket),
    ("KEY_BACKSLASH", Key::Backslash),
    ("KEY_A", Key::A),
    ("KEY_S", Key::S),
    ("KEY_D", Key::D),
    ("KEY_F", Key::F),
    ("KEY_G", Key::G),
    ("KEY_H", Key::H),
    ("KEY_J", Key::J),
    ("KEY_K", Key::K),
    ("KEY_L", Key::L),
    ("KEY_SEMICOLON", Key::Semicolon),
    ("KEY_APOSTROPHE", Key::Apostrophe),
    ("KEY_ENTER", Key::Enter),
    ("KEY_Z", Key::Z),
    ("KEY_X", Key::X),
    ("KEY_C", Key::C),
    ("KEY_V", Key::V),
    ("KEY_B", Key::B),
    ("KEY_N", Key::N),
    ("KEY_M", Key::M),
    ("KEY_COMMA", Key::Comma),
    ("KEY_DOT", Key::Dot),
    ("KEY_SLASH", Key::Slash),
    ("KEY_SPACE", Key::Space),
    ("KEY_INSERT", Key::Insert),
    ("KEY_DELETE", Key::Delete),
    ("KEY_HOME", Key::Home),
    ("KEY_END", Key::End),
    ("KEY_PAGE_UP", Key::PageUp),
    ("KEY_PAGE_DOWN", Key::PageDown),
    ("KEY_CURSOR_UP", Key::CursorUp),
    ("KEY_CURSOR_DOWN", Key::CursorDown),
    ("KEY_CURSOR_LEFT", Key::CursorLeft),
    ("KEY_CURSOR_RIGHT", Key::CursorRight),
    ("KEY_LT", Key::Lt),
    ("KEY_LEFT_SHIFT", Key::LeftShift),
    ("KEY_RIGHT_SHIFT", Key::RightShift),
    ("KEY_LEFT_CTRL", Key::LeftCtrl),
    ("KEY_RIGHT_CTRL", Key::RightCtrl),
    ("KEY_LEFT_ALT", Key::LeftAlt),
    ("KEY_ALT_GR", Key::AltGr),
];

impl Key {
    pub fn from_name(name: &str) -> Option<Key> {
        KEY_NAMES
            .iter()
            .find(|(key_name, _)| *key_name == name)
            .map(|(_, key)| *key)
    }

    pub fn name(&self) -> &'static str {
        KEY_NAMES
            .iter()
            .find(|(_, key)| key == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, Key::LeftShift | Key::RightShift)
    }

    pub fn is_altgr(&self) -> bool {
        matches!(self, Key::AltGr)
    }
}

/// Keys assigned to the virtual joystick overlay.
#[derive(Clone, Copy)]
pub struct VjoyKeys {
    pub up: Key,
    pub down: Key,
    pub left: Key,
    pub right: Key,
    pub fire: Key,
}

/// Machine-side keyboard matrix. Implementations own the matrix layout and
/// the translation table; shift compensation is part of the contract of
/// `pressed`/`released`.
pub trait MatrixBackend {
    fn reset(&mut self);
    fn pressed(&mut self, key: Key, shift: bool, altgr: bool);
    fn released(&mut self, key: Key, shift: bool, altgr: bool);
    /// Column bits of all rows selected by `row_mask` (zero bits select,
    /// result negated per hardware convention).
    fn scan(&self, row_mask: u8) -> u8;
    /// Latch the row selection for subsequent `read` calls.
    fn write(&mut self, row_mask: u8);
    /// Scan using the latched row selection.
    fn read(&self) -> u8;
    fn add_key_map(
        &mut self,
        key: Key,
        key_shift: bool,
        key_altgr: bool,
        impl_name: &str,
        impl_shift: bool,
    ) -> Result<()>;
    fn clear_key_map(&mut self);
}

/// Matrix bit storage shared between the UI and emulator threads. Rows are
/// stored active-high; `scan` converts to the negated hardware convention.
pub struct Matrix {
    rows: Mutex<[u8; 8]>,
}

impl Matrix {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new([0; 8]),
        }
    }

    pub fn clear(&self) {
        let mut rows = self.rows.lock().unwrap();
        *rows = [0; 8];
    }

    pub fn set(&self, row: usize, col: usize, on: bool) {
        let mut rows = self.rows.lock().unwrap();
        if on {
            rows[row] |= 1 << col;
        } else {
            rows[row] &= !(1 << col);
        }
    }

    pub fn scan(&self, row_mask: u8) -> u8 {
        let rows = self.rows.lock().unwrap();
        let mut columns = 0;
        for (row, bits) in rows.iter().enumerate() {
            if row_mask & (1 << row) == 0 {
                columns |= bits;
            }
        }
        !columns
    }

    pub fn is_clear(&self) -> bool {
        let rows = self.rows.lock().unwrap();
        rows.iter().all(|row| *row == 0)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyboard front-end: receives host key events, keeps the modifier
/// latches, drives the virtual joystick overlay and forwards the rest to
/// the machine matrix.
pub struct Keyboard {
    backend: Box<dyn MatrixBackend>,
    enabled: bool,
    shift: bool,
    altgr: bool,
    vjoy_keys: Option<VjoyKeys>,
    vjoy: Option<Shared<Joystick>>,
}

impl Keyboard {
    pub fn new(backend: Box<dyn MatrixBackend>) -> Self {
        Self {
            backend,
            enabled: true,
            shift: false,
            altgr: false,
            vjoy_keys: None,
            vjoy: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn reset(&mut self) {
        self.shift = false;
        self.altgr = false;
        self.backend.reset();
        if let Some(ref vjoy) = self.vjoy {
            vjoy.borrow().reset();
        }
    }

    /// Assign a virtual joystick; matching key events bypass the matrix.
    pub fn attach_vjoy(&mut self, keys: VjoyKeys, joystick: Shared<Joystick>) {
        self.vjoy_keys = Some(keys);
        self.vjoy = Some(joystick);
    }

    pub fn key_pressed(&mut self, key: Key) {
        if key.is_shift() {
            self.shift = true;
        }
        if key.is_altgr() {
            self.altgr = true;
        }
        if self.vjoy_event(key, true) {
            return;
        }
        if self.enabled {
            self.backend.pressed(key, self.shift, self.altgr);
        }
    }

    pub fn key_released(&mut self, key: Key) {
        if key.is_shift() {
            self.shift = false;
        }
        if key.is_altgr() {
            self.altgr = false;
        }
        if self.vjoy_event(key, false) {
            return;
        }
        if self.enabled {
            self.backend.released(key, self.shift, self.altgr);
        }
    }

    pub fn scan(&self, row_mask: u8) -> u8 {
        self.backend.scan(row_mask)
    }

    pub fn set_row(&mut self, row_mask: u8) {
        self.backend.write(row_mask);
    }

    pub fn read(&self) -> u8 {
        self.backend.read()
    }

    /// Parse a key mapping file. Each line reads
    /// `host_key [SHIFT] [ALTGR] matrix_key [SHIFT]`; blank lines and `#`
    /// comments are ignored; later duplicates override earlier entries.
    pub fn load_mapping(&mut self, reader: &mut dyn Read) -> Result<()> {
        self.backend.clear_key_map();
        let reader = BufReader::new(reader);
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::from)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.parse_mapping_line(line)
                .map_err(|err| Error::InvalidArgument(format!("line {}: {}", number + 1, err)))?;
        }
        Ok(())
    }

    fn parse_mapping_line(&mut self, line: &str) -> Result<()> {
        let mut tokens = line.split_whitespace().peekable();
        let key_name = tokens
            .next()
            .ok_or_else(|| Error::InvalidArgument("missing key name".to_string()))?;
        let key = Key::from_name(key_name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown key {}", key_name)))?;
        let mut key_shift = false;
        let mut key_altgr = false;
        if tokens.peek() == Some(&"SHIFT") {
            key_shift = true;
            tokens.next();
        }
        if tokens.peek() == Some(&"ALTGR") {
            key_altgr = true;
            tokens.next();
        }
        let impl_name = tokens
            .next()
            .ok_or_else(|| Error::InvalidArgument("missing matrix key".to_string()))?;
        let impl_shift = match tokens.next() {
            Some("SHIFT") => true,
            Some(token) => {
                return Err(Error::InvalidArgument(format!("unexpected token {}", token)));
            }
            None => false,
        };
        self.backend
            .add_key_map(key, key_shift, key_altgr, impl_name, impl_shift)
    }

    fn vjoy_event(&mut self, key: Key, on: bool) -> bool {
        let keys = match self.vjoy_keys {
            Some(keys) => keys,
            None => return false,
        };
        let joystick = match self.vjoy {
            Some(ref joystick) => joystick,
            None => return false,
        };
        let bit = if key == keys.up {
            Joystick::UP
        } else if key == keys.down {
            Joystick::DOWN
        } else if key == keys.left {
            Joystick::LEFT
        } else if key == keys.right {
            Joystick::RIGHT
        } else if key == keys.fire {
            Joystick::FIRE
        } else {
            return false;
        };
        joystick.borrow().set(bit, on);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    struct NullBackend {
        pressed: Vec<Key>,
    }

    impl MatrixBackend for NullBackend {
        fn reset(&mut self) {
            self.pressed.clear();
        }
        fn pressed(&mut self, key: Key, _shift: bool, _altgr: bool) {
            self.pressed.push(key);
        }
        fn released(&mut self, key: Key, _shift: bool, _altgr: bool) {
            self.pressed.retain(|k| *k != key);
        }
        fn scan(&self, _row_mask: u8) -> u8 {
            0xff
        }
        fn write(&mut self, _row_mask: u8) {}
        fn read(&self) -> u8 {
            0xff
        }
        fn add_key_map(&mut self, _: Key, _: bool, _: bool, _: &str, _: bool) -> Result<()> {
            Ok(())
        }
        fn clear_key_map(&mut self) {}
    }

    #[test]
    fn key_name_roundtrip() {
        assert_eq!(Some(Key::A), Key::from_name("KEY_A"));
        assert_eq!("KEY_LEFT_SHIFT", Key::LeftShift.name());
        assert_eq!(None, Key::from_name("KEY_BOGUS"));
    }

    #[test]
    fn matrix_scan_selects_zero_rows() {
        let matrix = Matrix::new();
        matrix.set(1, 2, true);
        assert_eq!(!0x04u8, matrix.scan(!0x02));
        assert_eq!(0xff, matrix.scan(0xff));
    }

    #[test]
    fn vjoy_keys_bypass_matrix() {
        let joystick = new_shared(Joystick::new());
        let mut keyboard = Keyboard::new(Box::new(NullBackend { pressed: Vec::new() }));
        keyboard.attach_vjoy(
            VjoyKeys {
                up: Key::CursorUp,
                down: Key::CursorDown,
                left: Key::CursorLeft,
                right: Key::CursorRight,
                fire: Key::Space,
            },
            joystick.clone(),
        );
        keyboard.key_pressed(Key::CursorUp);
        keyboard.key_pressed(Key::A);
        assert_eq!(Joystick::UP, joystick.borrow().value());
        keyboard.key_released(Key::CursorUp);
        assert_eq!(0, joystick.borrow().value());
    }

    #[test]
    fn disabled_keyboard_still_feeds_vjoy() {
        let joystick = new_shared(Joystick::new());
        let mut keyboard = Keyboard::new(Box::new(NullBackend { pressed: Vec::new() }));
        keyboard.attach_vjoy(
            VjoyKeys {
                up: Key::W,
                down: Key::S,
                left: Key::A,
                right: Key::D,
                fire: Key::Space,
            },
            joystick.clone(),
        );
        keyboard.enable(false);
        keyboard.key_pressed(Key::W);
        assert_eq!(Joystick::UP, joystick.borrow().value());
    }
}
