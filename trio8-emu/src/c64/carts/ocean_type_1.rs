// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;
use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// Ocean Type 1: up to 64 banks of 8K selected through $DE00 (bit 7 must be
// set in the written value). The selected bank shows up in the ROML window;
// 16K configurations mirror it into ROMH as well.

const ROM_SIZE: usize = 8192;
const MAX_BANKS: usize = 64;
const BANK_MASK: u8 = 63;

pub struct CartOceanType1 {
    crt: Crt,
    mode: GameExromMode,
    bank: usize,
    roms: Vec<Option<DeviceRef>>,
    remap_request: bool,
}

impl CartOceanType1 {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            bank: 0,
            roms: Vec::new(),
            remap_request: false,
        }
    }
}

impl Device for CartOceanType1 {
    fn kind(&self) -> &'static str {
        "CART_OCEAN_TYPE_1"
    }

    fn label(&self) -> &str {
        self.crt.name()
    }

    fn size(&self) -> usize {
        IO_SIZE
    }

    fn read(&mut self, _offset: usize, _mode: ReadMode) -> u8 {
        255
    }

    fn write(&mut self, offset: usize, value: u8) {
        if offset == 0 && value.get_bit(7) {
            let bank = (value & BANK_MASK) as usize;
            if bank != self.bank {
                self.bank = bank;
                self.remap_request = true;
            }
        }
    }
}

impl Cartridge for CartOceanType1 {
    fn reset_cart(&mut self) -> Result<()> {
        self.bank = 0;
        self.roms = vec![None; MAX_BANKS];
        self.remap_request = false;
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);
        let name = self.crt.name().to_string();
        for (entry, chip) in self.crt.chips.iter().enumerate() {
            if chip.data.len() != ROM_SIZE {
                return Err(Error::InvalidCartridge(format!(
                    "{}: chip entry {}: invalid ROM size {}",
                    name,
                    entry,
                    chip.data.len()
                )));
            }
            if chip.bank as usize >= MAX_BANKS {
                return Err(Error::InvalidCartridge(format!(
                    "{}: chip entry {}: invalid bank {}",
                    name, entry, chip.bank
                )));
            }
            self.roms[chip.bank as usize] = Some(new_shared(Rom::new_with_data(&name, &chip.data)));
        }
        Ok(())
    }

    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = if roml {
            self.roms[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize))
        } else if romh && self.mode == GameExromMode::Mode16k {
            self.roms[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0xa000) as usize))
        } else {
            None
        };
        (read.unwrap_or_else(DevMap::none), DevMap::none())
    }

    fn mode(&self) -> GameExromMode {
        self.mode
    }

    fn cart_size(&self) -> usize {
        self.roms.iter().filter(|rom| rom.is_some()).count() * ROM_SIZE
    }

    fn take_remap_request(&mut self) -> bool {
        let request = self.remap_request;
        self.remap_request = false;
        request
    }

    fn name(&self) -> &str {
        self.crt.name()
    }
}
