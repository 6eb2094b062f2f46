// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{
    new_shared, new_shared_cell, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom,
    SharedCell,
};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// Zaxxon / Super Zaxxon: a 4K ROML chip mirrored across $8000-$9FFF and two
// 8K ROMH banks at $A000. The ROMH bank is selected by the address of ROML
// reads: accesses in $8000-$8FFF arm bank 0, accesses in $9000-$9FFF arm
// bank 1. Both windows stay live, so the ROMH slot is a device that follows
// the armed bank instead of a fixed ROM.

const ROML_SIZE: usize = 4096;
const ROMH_SIZE: usize = 8192;
const ROMH_BANKS: usize = 2;

struct ZaxxonRoml {
    rom: DeviceRef,
    romh_bank: SharedCell<usize>,
}

impl Device for ZaxxonRoml {
    fn kind(&self) -> &'static str {
        "CART_ZAXXON_ROML"
    }

    fn size(&self) -> usize {
        0x2000
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if mode == ReadMode::Read {
            self.romh_bank.set(if offset >= 0x1000 { 1 } else { 0 });
        }
        self.rom.borrow_mut().read(offset & 0x0fff, mode)
    }

    fn write(&mut self, _offset: usize, _value: u8) {}
}

struct ZaxxonRomh {
    roms: Vec<DeviceRef>,
    romh_bank: SharedCell<usize>,
}

impl Device for ZaxxonRomh {
    fn kind(&self) -> &'static str {
        "CART_ZAXXON_ROMH"
    }

    fn size(&self) -> usize {
        ROMH_SIZE
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        self.roms[self.romh_bank.get()].borrow_mut().read(offset, mode)
    }

    fn write(&mut self, _offset: usize, _value: u8) {}
}

pub struct CartZaxxon {
    crt: Crt,
    mode: GameExromMode,
    roml: Option<DeviceRef>,
    romh: Option<DeviceRef>,
}

impl CartZaxxon {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            roml: None,
            romh: None,
        }
    }
}

impl Device for CartZaxxon {
    fn kind(&self) -> &'static str {
        "CART_ZAXXON"
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

    fn write(&mut self, _offset: usize, _value: u8) {}
}

impl Cartridge for CartZaxxon {
    fn reset_cart(&mut self) -> Result<()> {
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);
        let name = self.crt.name().to_string();
        let roml = self
            .crt
            .chips_at(0x8000)
            .next()
            .ok_or_else(|| Error::InvalidCartridge(format!("{}: missing ROML chip", name)))?;
        if roml.data.len() != ROML_SIZE {
            return Err(Error::InvalidCartridge(format!(
                "{}: invalid ROML size {}",
                name,
                roml.data.len()
            )));
        }
        let highs: Vec<_> = self.crt.chips_at(0xa000).collect();
        if highs.len() != ROMH_BANKS || highs.iter().any(|chip| chip.data.len() != ROMH_SIZE) {
            return Err(Error::InvalidCartridge(format!(
                "{}: invalid ROMH layout",
                name
            )));
        }
        let romh_bank = new_shared_cell(0usize);
        let rom: DeviceRef = new_shared(Rom::new_with_data(&name, &roml.data));
        let roms: Vec<DeviceRef> = highs
            .iter()
            .map(|chip| -> DeviceRef { new_shared(Rom::new_with_data(&name, &chip.data)) })
            .collect();
        self.roml = Some(new_shared(ZaxxonRoml {
            rom,
            romh_bank: romh_bank.clone(),
        }));
        self.romh = Some(new_shared(ZaxxonRomh { roms, romh_bank }));
        Ok(())
    }

    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = if roml {
            self.roml
                .as_ref()
                .map(|dev| DevMap::new(dev.clone(), (addr - 0x8000) as usize))
        } else if romh {
            self.romh
                .as_ref()
                .map(|dev| DevMap::new(dev.clone(), (addr - 0xa000) as usize))
        } else {
            None
        };
        (read.unwrap_or_else(DevMap::none), DevMap::none())
    }

    fn mode(&self) -> GameExromMode {
        self.mode
    }

    fn cart_size(&self) -> usize {
        ROML_SIZE + ROMH_BANKS * ROMH_SIZE
    }

    fn take_remap_request(&mut self) -> bool {
        false
    }

    fn name(&self) -> &str {
        self.crt.name()
    }
}
