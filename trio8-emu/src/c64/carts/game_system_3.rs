// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// C64 Game System 3: 64 banks of 8K at $8000. The bank number is taken
// from the low address bits of any access in the $DE00 page, for reads and
// writes alike.

const ROM_SIZE: usize = 8192;
const MAX_BANKS: usize = 64;

pub struct CartGameSystem3 {
    crt: Crt,
    mode: GameExromMode,
    bank: usize,
    roms: Vec<Option<DeviceRef>>,
    remap_request: bool,
}

impl CartGameSystem3 {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            bank: 0,
            roms: Vec::new(),
            remap_request: false,
        }
    }

    fn select_bank(&mut self, offset: usize) {
        let bank = offset & 0x3f;
        if bank != self.bank {
            self.bank = bank;
            self.remap_request = true;
        }
    }
}

impl Device for CartGameSystem3 {
    fn kind(&self) -> &'static str {
        "CART_C64_GS_3"
    }

    fn label(&self) -> &str {
        self.crt.name()
    }

    fn size(&self) -> usize {
        IO_SIZE
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < 0x100 && mode == ReadMode::Read {
            self.select_bank(offset);
        }
        255
    }

    fn write(&mut self, offset: usize, _value: u8) {
        if offset < 0x100 {
            self.select_bank(offset);
        }
    }
}

impl Cartridge for CartGameSystem3 {
    fn reset_cart(&mut self) -> Result<()> {
        self.bank = 0;
        self.roms = vec![None; MAX_BANKS];
        self.remap_request = false;
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);
        let name = self.crt.name().to_string();
        for (entry, chip) in self.crt.chips.iter().enumerate() {
            if chip.data.len() != ROM_SIZE || chip.load_addr != 0x8000 {
                return Err(Error::InvalidCartridge(format!(
                    "{}: chip entry {}: invalid ROM layout",
                    name, entry
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

    fn get_device(&mut self, addr: u16, _romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = if roml {
            self.roms[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize))
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
