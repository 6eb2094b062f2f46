// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;

use trio8_core::keyboard::{Key, Matrix, MatrixBackend};
use trio8_core::{Error, Result};

// SPEC: https://www.c64-wiki.com/index.php/Keyboard#Hardware
//
// 8x8 matrix scanned through CIA-1: port A selects rows (active low), port
// B returns the column bits of the pressed keys. Matrix codes are
// row * 8 + col.

const LSHIFT: u8 = code(1, 7);
const RSHIFT: u8 = code(6, 4);

const fn code(row: u8, col: u8) -> u8 {
    row * 8 + col
}

static MATRIX_KEYS: &[(&str, u8)] = &[
    ("DEL", code(0, 0)),
    ("RETURN", code(0, 1)),
    ("CRSR_RIGHT", code(0, 2)),
    ("F7", code(0, 3)),
    ("F1", code(0, 4)),
    ("F3", code(0, 5)),
    ("F5", code(0, 6)),
    ("CRSR_DOWN", code(0, 7)),
    ("3", code(1, 0)),
    ("W", code(1, 1)),
    ("A", code(1, 2)),
    ("4", code(1, 3)),
    ("Z", code(1, 4)),
    ("S", code(1, 5)),
    ("E", code(1, 6)),
    ("LSHIFT", LSHIFT),
    ("5", code(2, 0)),
    ("R", code(2, 1)),
    ("D", code(2, 2)),
    ("6", code(2, 3)),
    ("C", code(2, 4)),
    ("F", code(2, 5)),
    ("T", code(2, 6)),
    ("X", code(2, 7)),
    ("7", code(3, 0)),
    ("Y", code(3, 1)),
    ("G", code(3, 2)),
    ("8", code(3, 3)),
    ("B", code(3, 4)),
    ("H", code(3, 5)),
    ("U", code(3, 6)),
    ("V", code(3, 7)),
    ("9", code(4, 0)),
    ("I", code(4, 1)),
    ("J", code(4, 2)),
    ("0", code(4, 3)),
    ("M", code(4, 4)),
    ("K", code(4, 5)),
    ("O", code(4, 6)),
    ("N", code(4, 7)),
    ("PLUS", code(5, 0)),
    ("P", code(5, 1)),
    ("L", code(5, 2)),
    ("MINUS", code(5, 3)),
    ("DOT", code(5, 4)),
    ("COLON", code(5, 5)),
    ("AT", code(5, 6)),
    ("COMMA", code(5, 7)),
    ("POUND", code(6, 0)),
    ("ASTERISK", code(6, 1)),
    ("SEMICOLON", code(6, 2)),
    ("HOME", code(6, 3)),
    ("RSHIFT", RSHIFT),
    ("EQUAL", code(6, 5)),
    ("ARROW_UP", code(6, 6)),
    ("SLASH", code(6, 7)),
    ("1", code(7, 0)),
    ("ARROW_LEFT", code(7, 1)),
    ("CTRL", code(7, 2)),
    ("2", code(7, 3)),
    ("SPACE", code(7, 4)),
    ("CBM", code(7, 5)),
    ("Q", code(7, 6)),
    ("RUNSTOP", code(7, 7)),
];

fn matrix_code(name: &str) -> Option<u8> {
    MATRIX_KEYS
        .iter()
        .find(|(key_name, _)| *key_name == name)
        .map(|(_, code)| *code)
}

struct Held {
    key: Key,
    code: u8,
    emit_shift: bool,
    suppress_shift: bool,
}

pub struct C64Keyboard {
    matrix: Matrix,
    row_mask: u8,
    keymap: HashMap<(Key, bool, bool), (u8, bool)>,
    held: Vec<Held>,
    left_shift: bool,
    right_shift: bool,
}

impl C64Keyboard {
    pub fn new() -> Self {
        let mut keyboard = Self {
            matrix: Matrix::new(),
            row_mask: 0xff,
            keymap: HashMap::new(),
            held: Vec::new(),
            left_shift: false,
            right_shift: false,
        };
        keyboard.default_key_map();
        keyboard
    }

    fn default_key_map(&mut self) {
        let positional: &[(Key, &str)] = &[
            (Key::A, "A"),
            (Key::B, "B"),
            (Key::C, "C"),
            (Key::D, "D"),
            (Key::E, "E"),
            (Key::F, "F"),
            (Key::G, "G"),
            (Key::H, "H"),
            (Key::I, "I"),
            (Key::J, "J"),
            (Key::K, "K"),
            (Key::L, "L"),
            (Key::M, "M"),
            (Key::N, "N"),
            (Key::O, "O"),
            (Key::P, "P"),
            (Key::Q, "Q"),
            (Key::R, "R"),
            (Key::S, "S"),
            (Key::T, "T"),
            (Key::U, "U"),
            (Key::V, "V"),
            (Key::W, "W"),
            (Key::X, "X"),
            (Key::Y, "Y"),
            (Key::Z, "Z"),
            (Key::Num0, "0"),
            (Key::Num1, "1"),
            (Key::Num2, "2"),
            (Key::Num3, "3"),
            (Key::Num4, "4"),
            (Key::Num5, "5"),
            (Key::Num6, "6"),
            (Key::Num7, "7"),
            (Key::Num8, "8"),
            (Key::Num9, "9"),
            (Key::Enter, "RETURN"),
            (Key::Backspace, "DEL"),
            (Key::Space, "SPACE"),
            (Key::Minus, "MINUS"),
            (Key::Equal, "EQUAL"),
            (Key::Comma, "COMMA"),
            (Key::Dot, "DOT"),
            (Key::Slash, "SLASH"),
            (Key::Semicolon, "SEMICOLON"),
            (Key::Home, "HOME"),
            (Key::Esc, "RUNSTOP"),
            (Key::Tab, "CTRL"),
            (Key::LeftCtrl, "CTRL"),
            (Key::LeftAlt, "CBM"),
            (Key::CursorDown, "CRSR_DOWN"),
            (Key::CursorRight, "CRSR_RIGHT"),
            (Key::F1, "F1"),
            (Key::F3, "F3"),
            (Key::F5, "F5"),
            (Key::F7, "F7"),
            (Key::OpenBracket, "COLON"),
            (Key::CloseBracket, "SEMICOLON"),
            (Key::Backslash, "POUND"),
            (Key::GraveAccent, "ARROW_LEFT"),
            (Key::Insert, "POUND"),
            (Key::Delete, "DEL"),
            (Key::PageUp, "ARROW_UP"),
        ];
        for (key, name) in positional {
            self.add(*key, false, false, name, false);
            // plain keys keep the host SHIFT state
            self.add(*key, true, false, name, true);
        }
        // cursor keys are shifted positions of the same matrix keys
        self.add(Key::CursorUp, false, false, "CRSR_DOWN", true);
        self.add(Key::CursorLeft, false, false, "CRSR_RIGHT", true);
        self.add(Key::F2, false, false, "F1", true);
        self.add(Key::F4, false, false, "F3", true);
        self.add(Key::F6, false, false, "F5", true);
        self.add(Key::F8, false, false, "F7", true);
        // host symbols that live elsewhere on the C64 matrix
        self.add(Key::Num2, true, false, "AT", false);
        self.add(Key::Num6, true, false, "ARROW_UP", false);
        self.add(Key::Num7, true, false, "6", true);
        self.add(Key::Num8, true, false, "ASTERISK", false);
        self.add(Key::Num9, true, false, "8", true);
        self.add(Key::Num0, true, false, "9", true);
        self.add(Key::Apostrophe, false, false, "7", true);
        self.add(Key::Apostrophe, true, false, "2", true);
        self.add(Key::Equal, true, false, "PLUS", false);
        self.add(Key::Semicolon, true, false, "COLON", false);
        self.add(Key::OpenBracket, true, false, "COLON", true);
        self.add(Key::CloseBracket, true, false, "SEMICOLON", true);
    }

    fn add(&mut self, key: Key, shift: bool, altgr: bool, name: &str, emit_shift: bool) {
        if let Some(code) = matrix_code(name) {
            self.keymap.insert((key, shift, altgr), (code, emit_shift));
        }
    }

    fn rebuild(&mut self) {
        self.matrix.clear();
        for held in &self.held {
            self.matrix
                .set((held.code >> 3) as usize, (held.code & 7) as usize, true);
        }
        let emit = self.held.iter().any(|held| held.emit_shift);
        let suppress = self.held.iter().any(|held| held.suppress_shift);
        let left = self.left_shift && !suppress;
        let right = self.right_shift && !suppress;
        if left {
            self.matrix
                .set((LSHIFT >> 3) as usize, (LSHIFT & 7) as usize, true);
        }
        if right {
            self.matrix
                .set((RSHIFT >> 3) as usize, (RSHIFT & 7) as usize, true);
        }
        if emit && !left && !right {
            self.matrix
                .set((LSHIFT >> 3) as usize, (LSHIFT & 7) as usize, true);
        }
    }
}

impl Default for C64Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixBackend for C64Keyboard {
    fn reset(&mut self) {
        self.held.clear();
        self.left_shift = false;
        self.right_shift = false;
        self.row_mask = 0xff;
        self.matrix.clear();
    }

    fn pressed(&mut self, key: Key, shift: bool, altgr: bool) {
        match key {
            Key::LeftShift => self.left_shift = true,
            Key::RightShift => self.right_shift = true,
            _ => {
                let entry = self.keymap.get(&(key, shift, altgr)).copied();
                match entry {
                    Some((code, emit_shift)) => {
                        self.held.retain(|held| held.key != key);
                        self.held.push(Held {
                            key,
                            code,
                            emit_shift: emit_shift && !shift,
                            suppress_shift: shift && !emit_shift,
                        });
                    }
                    None => {
                        trace!(target: "kbd", "No mapping for {:?} shift {} altgr {}", key, shift, altgr);
                        return;
                    }
                }
            }
        }
        self.rebuild();
    }

    fn released(&mut self, key: Key, _shift: bool, _altgr: bool) {
        match key {
            Key::LeftShift => self.left_shift = false,
            Key::RightShift => self.right_shift = false,
            _ => self.held.retain(|held| held.key != key),
        }
        self.rebuild();
    }

    fn scan(&self, row_mask: u8) -> u8 {
        self.matrix.scan(row_mask)
    }

    fn write(&mut self, row_mask: u8) {
        self.row_mask = row_mask;
    }

    fn read(&self) -> u8 {
        self.matrix.scan(self.row_mask)
    }

    fn add_key_map(
        &mut self,
        key: Key,
        key_shift: bool,
        key_altgr: bool,
        impl_name: &str,
        impl_shift: bool,
    ) -> Result<()> {
        let code = matrix_code(impl_name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown matrix key {}", impl_name)))?;
        self.keymap
            .insert((key, key_shift, key_altgr), (code, impl_shift));
        Ok(())
    }

    fn clear_key_map(&mut self) {
        self.keymap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_sets_matrix_bit() {
        let mut keyboard = C64Keyboard::new();
        keyboard.pressed(Key::A, false, false);
        // A is row 1 col 2; select row 1 only
        assert_eq!(!0x04u8, keyboard.scan(!0x02));
        keyboard.released(Key::A, false, false);
        assert_eq!(0xff, keyboard.scan(!0x02));
    }

    #[test]
    fn latched_row_scan() {
        let mut keyboard = C64Keyboard::new();
        keyboard.pressed(Key::Q, false, false);
        keyboard.write(!0x80);
        // Q is row 7 col 6
        assert_eq!(!0x40u8, keyboard.read());
    }

    #[test]
    fn shift_compensation_suppresses_host_shift() {
        let mut keyboard = C64Keyboard::new();
        // host SHIFT-2 types '@': the C64 must see AT without shift
        keyboard.pressed(Key::LeftShift, true, false);
        keyboard.pressed(Key::Num2, true, false);
        // AT is row 5 col 6, LSHIFT is row 1 col 7
        assert_eq!(!0x40u8, keyboard.scan(!0x20));
        assert_eq!(0xff, keyboard.scan(!0x02));
    }

    #[test]
    fn emitted_shift_without_host_shift() {
        let mut keyboard = C64Keyboard::new();
        // cursor up = shifted cursor down
        keyboard.pressed(Key::CursorUp, false, false);
        assert_eq!(!0x80u8, keyboard.scan(!0x01));
        assert_eq!(!0x80u8, keyboard.scan(!0x02));
    }

    #[test]
    fn mapping_file_replaces_table() {
        use trio8_core::Keyboard;

        let mut keyboard = Keyboard::new(Box::new(C64Keyboard::new()));
        let map = "# test map\nKEY_A  Q\nKEY_2 SHIFT AT\n";
        keyboard.load_mapping(&mut map.as_bytes()).unwrap();
        keyboard.key_pressed(Key::A);
        // A remapped onto the Q position (row 7, column 6)
        assert_eq!(!0x40u8, keyboard.scan(!0x80));
        keyboard.key_released(Key::A);
        // the default table was cleared
        keyboard.key_pressed(Key::B);
        assert_eq!(0xff, keyboard.scan(!0x08));
    }

    #[test]
    fn malformed_mapping_line_rejected() {
        use trio8_core::Keyboard;

        let mut keyboard = Keyboard::new(Box::new(C64Keyboard::new()));
        assert!(keyboard
            .load_mapping(&mut "KEY_A BOGUS_KEY\n".as_bytes())
            .is_err());
        assert!(keyboard
            .load_mapping(&mut "NOT_A_KEY Q\n".as_bytes())
            .is_err());
    }

    #[test]
    fn rollover_returns_to_clear_matrix() {
        let mut keyboard = C64Keyboard::new();
        keyboard.pressed(Key::A, false, false);
        keyboard.pressed(Key::LeftShift, true, false);
        keyboard.released(Key::A, true, false);
        keyboard.released(Key::LeftShift, false, false);
        for row in 0..8 {
            assert_eq!(0xff, keyboard.scan(!(1 << row)));
        }
    }
}
