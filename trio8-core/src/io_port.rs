// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};

use bit_field::BitField;

pub type Observer = Box<dyn FnMut(u8)>;

// direction - 1 is an output bit, 0 is an input bit.

/// General purpose I/O port with an observer callback, used for the 6510
/// processor port and for cartridge GAME/EXROM pin propagation.
pub struct IoPort {
    direction: Cell<u8>,
    input: Cell<u8>,
    output: Cell<u8>,
    observer: RefCell<Option<Observer>>,
}

impl IoPort {
    pub fn new(direction: u8, input: u8) -> Self {
        Self {
            direction: Cell::new(direction),
            input: Cell::new(input),
            output: Cell::new(0),
            observer: RefCell::new(None),
        }
    }

    pub fn get_direction(&self) -> u8 {
        self.direction.get()
    }

    pub fn get_value(&self) -> u8 {
        (self.output.get() & self.direction.get()) | (self.input.get() & !self.direction.get())
    }

    pub fn set_direction(&self, direction: u8) {
        self.direction.set(direction);
        self.notify_observer();
    }

    pub fn set_input(&self, value: u8) {
        self.input.set(value);
        self.notify_observer();
    }

    pub fn set_input_bit(&self, bit: usize, value: bool) {
        let mut input = self.input.get();
        input.set_bit(bit, value);
        self.input.set(input);
        self.notify_observer();
    }

    /// Write the output latch; the observer fires only when the effective
    /// value changes.
    pub fn set_value(&self, value: u8) {
        let before = self.get_value();
        self.output.set(value);
        if self.get_value() != before {
            self.notify_observer();
        }
    }

    /// Write the output latch and force observer notification even when the
    /// effective value did not change.
    pub fn set_value_forced(&self, value: u8) {
        self.output.set(value);
        self.notify_observer();
    }

    pub fn set_observer(&self, observer: Option<Observer>) {
        *self.observer.borrow_mut() = observer;
    }

    pub fn reset(&self) {
        self.direction.set(0x00);
        self.input.set(0xff);
        self.output.set(0x00);
        self.notify_observer();
    }

    fn notify_observer(&self) {
        let mut observer = self.observer.borrow_mut();
        if let Some(ref mut observer) = *observer {
            observer(self.get_value());
        }
    }
}

/// Two-state signal line.
#[derive(Clone, Copy, PartialEq)]
pub struct Pin {
    state: bool,
}

impl Pin {
    pub fn new_high() -> Self {
        Self { state: true }
    }

    pub fn new_low() -> Self {
        Self { state: false }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.state
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        !self.state
    }

    pub fn set(&mut self, state: bool) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn value_mixes_input_and_output() {
        let port = IoPort::new(0x0f, 0xf0);
        port.set_value(0x05);
        assert_eq!(0xf5, port.get_value());
    }

    #[test]
    fn observer_sees_effective_value() {
        let port = IoPort::new(0xff, 0x00);
        let seen = Rc::new(Cell::new(0u8));
        let seen_clone = seen.clone();
        port.set_observer(Some(Box::new(move |value| seen_clone.set(value))));
        port.set_value(0x37);
        assert_eq!(0x37, seen.get());
    }
}
