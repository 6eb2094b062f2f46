// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;

use trio8_core::keyboard::{Key, Matrix, MatrixBackend};
use trio8_core::{Error, Result};

// ZX-80/81 and ZX-Spectrum keyboard: 8 half-rows of 5 keys, selected by the
// high address byte of an I/O read (active low) on port $FE.
//
//     row (line)   D4  D3  D2  D1  D0
//     0 (A8)        V   C   X   Z   SHIFT
//     1 (A9)        G   F   D   S   A
//     2 (A10)       T   R   E   W   Q
//     3 (A11)       5   4   3   2   1
//     4 (A12)       6   7   8   9   0
//     5 (A13)       Y   U   I   O   P
//     6 (A14)       H   J   K   L   ENTER
//     7 (A15)       B   N   M   DOT SPACE

const SHIFT: u8 = code(0, 0);

const fn code(row: u8, col: u8) -> u8 {
    row * 8 + col
}

static MATRIX_KEYS: &[(&str, u8)] = &[
    ("SHIFT", SHIFT),
    ("Z", code(0, 1)),
    ("X", code(0, 2)),
    ("C", code(0, 3)),
    ("V", code(0, 4)),
    ("A", code(1, 0)),
    ("S", code(1, 1)),
    ("D", code(1, 2)),
    ("F", code(1, 3)),
    ("G", code(1, 4)),
    ("Q", code(2, 0)),
    ("W", code(2, 1)),
    ("E", code(2, 2)),
    ("R", code(2, 3)),
    ("T", code(2, 4)),
    ("1", code(3, 0)),
    ("2", code(3, 1)),
    ("3", code(3, 2)),
    ("4", code(3, 3)),
    ("5", code(3, 4)),
    ("0", code(4, 0)),
    ("9", code(4, 1)),
    ("8", code(4, 2)),
    ("7", code(4, 3)),
    ("6", code(4, 4)),
    ("P", code(5, 0)),
    ("O", code(5, 1)),
    ("I", code(5, 2)),
    ("U", code(5, 3)),
    ("Y", code(5, 4)),
    ("ENTER", code(6, 0)),
    ("L", code(6, 1)),
    ("K", code(6, 2)),
    ("J", code(6, 3)),
    ("H", code(6, 4)),
    ("SPACE", code(7, 0)),
    ("DOT", code(7, 1)),
    ("M", code(7, 2)),
    ("N", code(7, 3)),
    ("B", code(7, 4)),
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

pub struct ZxKeyboard {
    matrix: Matrix,
    row_mask: u8,
    keymap: HashMap<(Key, bool, bool), (u8, bool)>,
    held: Vec<Held>,
    shift: bool,
}

impl ZxKeyboard {
    pub fn new() -> Self {
        let mut keyboard = Self {
            matrix: Matrix::new(),
            row_mask: 0xff,
            keymap: HashMap::new(),
            held: Vec::new(),
            shift: false,
        };
        keyboard.default_key_map();
        keyboard
    }

    fn default_key_map(&mut self) {
        let letters: &[(Key, &str)] = &[
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
            (Key::Enter, "ENTER"),
            (Key::Space, "SPACE"),
            (Key::Dot, "DOT"),
        ];
        for (key, name) in letters {
            self.add(*key, false, false, name, false);
            self.add(*key, true, false, name, true);
        }
        // RUBOUT and the cursor keys are shifted digits
        self.add(Key::Backspace, false, false, "0", true);
        self.add(Key::CursorLeft, false, false, "5", true);
        self.add(Key::CursorDown, false, false, "6", true);
        self.add(Key::CursorUp, false, false, "7", true);
        self.add(Key::CursorRight, false, false, "8", true);
        self.add(Key::Comma, false, false, "DOT", true);
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
        if emit || (self.shift && !suppress) {
            self.matrix
                .set((SHIFT >> 3) as usize, (SHIFT & 7) as usize, true);
        }
    }
}

impl Default for ZxKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixBackend for ZxKeyboard {
    fn reset(&mut self) {
        self.held.clear();
        self.shift = false;
        self.row_mask = 0xff;
        self.matrix.clear();
    }

    fn pressed(&mut self, key: Key, shift: bool, altgr: bool) {
        if key.is_shift() {
            self.shift = true;
        } else {
            match self.keymap.get(&(key, shift, altgr)).copied() {
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
        self.rebuild();
    }

    fn released(&mut self, key: Key, _shift: bool, _altgr: bool) {
        if key.is_shift() {
            self.shift = false;
        } else {
            self.held.retain(|held| held.key != key);
        }
        self.rebuild();
    }

    fn scan(&self, row_mask: u8) -> u8 {
        // only five column lines exist; the rest read high
        self.matrix.scan(row_mask) | 0xe0
    }

    fn write(&mut self, row_mask: u8) {
        self.row_mask = row_mask;
    }

    fn read(&self) -> u8 {
        self.scan(self.row_mask)
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
    fn press_digit_row() {
        let mut keyboard = ZxKeyboard::new();
        keyboard.pressed(Key::Num1, false, false);
        // row 3 (A11), column D0
        assert_eq!(0xfe, keyboard.scan(!0x08));
        keyboard.released(Key::Num1, false, false);
        assert_eq!(0xff, keyboard.scan(!0x08));
    }

    #[test]
    fn rubout_emits_shift() {
        let mut keyboard = ZxKeyboard::new();
        keyboard.pressed(Key::Backspace, false, false);
        // SHIFT on row 0, "0" on row 4
        assert_eq!(0xfe, keyboard.scan(!0x01));
        assert_eq!(0xfe, keyboard.scan(!0x10));
    }

    #[test]
    fn half_row_scan_merges_rows() {
        let mut keyboard = ZxKeyboard::new();
        keyboard.pressed(Key::A, false, false);
        keyboard.pressed(Key::Q, false, false);
        // both rows selected at once
        assert_eq!(0xfe, keyboard.scan(!0x06));
    }
}
