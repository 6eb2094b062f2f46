// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use crate::device::{Device, DeviceRef, ReadMode};

/// A window into a larger RAM or ROM carved into equal-sized banks. The view
/// borrows the underlying device; bank selection wraps modulo the bank count.
pub struct Bank {
    label: String,
    device: DeviceRef,
    bank_size: usize,
    banks: usize,
    bank: usize,
    offset: usize,
}

pub type RamBank = Bank;
pub type RomBank = Bank;

impl Bank {
    pub fn new(device: DeviceRef, bank_size: usize) -> Self {
        Self::new_with_bank(device, bank_size, 0)
    }

    pub fn new_with_bank(device: DeviceRef, bank_size: usize, bank: usize) -> Self {
        let size = device.borrow().size();
        let label = device.borrow().label().to_string();
        assert!(bank_size > 0 && size >= bank_size);
        let mut this = Self {
            label,
            device,
            bank_size,
            banks: size / bank_size,
            bank: 0,
            offset: 0,
        };
        this.set_bank(bank);
        this
    }

    pub fn bank(&self) -> usize {
        self.bank
    }

    pub fn banks(&self) -> usize {
        self.banks
    }

    pub fn set_bank(&mut self, bank: usize) {
        self.bank = bank % self.banks;
        self.offset = self.bank * self.bank_size;
    }
}

impl Device for Bank {
    fn kind(&self) -> &'static str {
        "RAM-bank"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> usize {
        self.bank_size
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        self.device.borrow_mut().read(self.offset + offset, mode)
    }

    fn write(&mut self, offset: usize, value: u8) {
        self.device.borrow_mut().write(self.offset + offset, value)
    }
}
