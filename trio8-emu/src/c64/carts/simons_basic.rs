// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// Simons' BASIC: 8K ROML at $8000 plus 8K ROMH at $A000. Reading the I/O-1
// range drops to 8K (ROMH hidden); writing switches to 16K. The GAME line
// is the only thing the register toggles.

const ROM_SIZE: usize = 8192;

pub struct CartSimonsBasic {
    crt: Crt,
    mode: GameExromMode,
    roml: Option<DeviceRef>,
    romh: Option<DeviceRef>,
    remap_request: bool,
}

impl CartSimonsBasic {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            roml: None,
            romh: None,
            remap_request: false,
        }
    }

    fn set_mode(&mut self, mode: GameExromMode) {
        if mode != self.mode {
            self.mode = mode;
            self.remap_request = true;
        }
    }
}

impl Device for CartSimonsBasic {
    fn kind(&self) -> &'static str {
        "CART_SIMONS_BASIC"
    }

    fn label(&self) -> &str {
        self.crt.name()
    }

    fn size(&self) -> usize {
        IO_SIZE
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < 0x100 && mode == ReadMode::Read {
            self.set_mode(GameExromMode::Mode8k);
        }
        255
    }

    fn write(&mut self, offset: usize, _value: u8) {
        if offset < 0x100 {
            self.set_mode(GameExromMode::Mode16k);
        }
    }
}

impl Cartridge for CartSimonsBasic {
    fn reset_cart(&mut self) -> Result<()> {
        let name = self.crt.name().to_string();
        let roml = self
            .crt
            .chips_at(0x8000)
            .next()
            .ok_or_else(|| Error::InvalidCartridge(format!("{}: missing ROML chip", name)))?;
        let romh = self
            .crt
            .chips_at(0xa000)
            .next()
            .ok_or_else(|| Error::InvalidCartridge(format!("{}: missing ROMH chip", name)))?;
        if roml.data.len() != ROM_SIZE || romh.data.len() != ROM_SIZE {
            return Err(Error::InvalidCartridge(format!(
                "{}: invalid ROM size",
                name
            )));
        }
        self.roml = Some(new_shared(Rom::new_with_data(&name, &roml.data)));
        self.romh = Some(new_shared(Rom::new_with_data(&name, &romh.data)));
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);
        self.remap_request = false;
        Ok(())
    }

    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = if roml {
            self.roml
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize))
        } else if romh && self.mode == GameExromMode::Mode16k {
            self.romh
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
        self.crt.chips.iter().map(|chip| chip.data.len()).sum()
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
