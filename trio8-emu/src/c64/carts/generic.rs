// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// Generic cartridges carry one or two CHIP packets without any banking
// hardware. ROML always starts at $8000; ROMH sits at $A000 (16K) or $E000
// (Ultimax), either as its own chip or as the upper half of a 16K chip.
//
//  Type     Size    GAME    EXROM   ROML    ROMH
//  -------------------------------------------------
//  Normal   8K      1       0       $8000   -----
//  Normal   16K     0       0       $8000   $A000
//  Ultimax  4K      0       1       $F000   -----
//  Ultimax  8K      0       1       -----   $E000
//  Ultimax  16K     0       1       $8000   $E000

#[derive(Clone, Copy, PartialEq)]
enum GenericMode {
    Normal8k,
    Normal16k,
    Ultimax4k,
    Ultimax8k,
    Ultimax16k,
    Invisible,
}

pub struct CartGeneric {
    crt: Crt,
    mode: GameExromMode,
    variant: GenericMode,
    roml: Option<DeviceRef>,
    romh: Option<DeviceRef>,
    romh_offset: usize,
}

impl CartGeneric {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            variant: GenericMode::Invisible,
            roml: None,
            romh: None,
            romh_offset: 0,
        }
    }

    fn invalid(&self, message: &str) -> Error {
        Error::InvalidCartridge(format!("{}: {}", self.crt.name(), message))
    }
}

impl Device for CartGeneric {
    fn kind(&self) -> &'static str {
        "CART_GENERIC"
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

impl Cartridge for CartGeneric {
    fn reset_cart(&mut self) -> Result<()> {
        self.roml = None;
        self.romh = None;
        self.romh_offset = 0;
        self.variant = GenericMode::Invisible;
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);

        let chip = self
            .crt
            .chips
            .first()
            .ok_or_else(|| self.invalid("no chip sections"))?;
        let rom: DeviceRef = new_shared(Rom::new_with_data(self.crt.name(), &chip.data));

        match self.mode {
            GameExromMode::Mode8k => {
                if chip.data.len() != 0x2000 || chip.load_addr != 0x8000 {
                    return Err(self.invalid("invalid ROM layout for 8K mode"));
                }
                self.roml = Some(rom);
                self.variant = GenericMode::Normal8k;
            }
            GameExromMode::Mode16k => {
                match (chip.data.len(), self.crt.chips.get(1)) {
                    (0x4000, _) => {
                        self.roml = Some(rom.clone());
                        self.romh = Some(rom);
                        self.romh_offset = 0x2000;
                    }
                    (0x2000, Some(high)) if high.data.len() == 0x2000 => {
                        self.roml = Some(rom);
                        self.romh = Some(new_shared(Rom::new_with_data(
                            self.crt.name(),
                            &high.data,
                        )));
                    }
                    _ => return Err(self.invalid("invalid ROM layout for 16K mode")),
                }
                self.variant = GenericMode::Normal16k;
            }
            GameExromMode::Ultimax => {
                self.variant = match chip.data.len() {
                    0x1000 => GenericMode::Ultimax4k,
                    0x2000 => GenericMode::Ultimax8k,
                    0x4000 => {
                        self.romh_offset = 0x2000;
                        GenericMode::Ultimax16k
                    }
                    size => {
                        return Err(
                            self.invalid(&format!("invalid ROM size {} for Ultimax mode", size))
                        );
                    }
                };
                self.roml = Some(rom.clone());
                self.romh = Some(rom);
            }
            GameExromMode::Invisible => {
                warn!(target: "cart", "{}: cartridge in invisible mode", self.crt.name());
            }
        }
        Ok(())
    }

    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = match self.variant {
            GenericMode::Normal8k if roml => self
                .roml
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize)),
            GenericMode::Normal16k if roml => self
                .roml
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize)),
            GenericMode::Normal16k if romh => self
                .romh
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0xa000) as usize + self.romh_offset)),
            GenericMode::Ultimax16k if roml => self
                .roml
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0x8000) as usize)),
            GenericMode::Ultimax16k if romh => self
                .romh
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0xe000) as usize + self.romh_offset)),
            GenericMode::Ultimax8k if romh => self
                .romh
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - 0xe000) as usize)),
            GenericMode::Ultimax4k if romh && addr == 0xf000 => self
                .romh
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), 0)),
            _ => None,
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
        false
    }

    fn name(&self) -> &str {
        self.crt.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64::crt::{Chip, ChipType, CrtHeader, HwType};

    fn crt_8k() -> Crt {
        let mut data = vec![0x00; 0x2000];
        data[0] = 0x42;
        Crt {
            header: CrtHeader {
                version: 0x0100,
                hw_type: HwType::Generic,
                exrom: false,
                game: true,
                name: "TEST".to_string(),
            },
            chips: vec![Chip {
                chip_type: ChipType::Rom,
                bank: 0,
                load_addr: 0x8000,
                data,
            }],
        }
    }

    #[test]
    fn eight_k_maps_roml_only() {
        let mut cart = CartGeneric::new(crt_8k());
        cart.reset_cart().unwrap();
        assert_eq!(GameExromMode::Mode8k, cart.mode());
        let (read, write) = cart.get_device(0x8000, false, true);
        assert!(read.is_mapped());
        assert!(!write.is_mapped());
        let rom = read.device.unwrap();
        assert_eq!(0x42, rom.borrow_mut().read(read.base, ReadMode::Read));
        let (read, _) = cart.get_device(0xa000, true, false);
        assert!(!read.is_mapped());
    }

    #[test]
    fn size_state_mismatch_rejected() {
        let mut crt = crt_8k();
        crt.chips[0].data.truncate(0x1000);
        let mut cart = CartGeneric::new(crt);
        assert!(cart.reset_cart().is_err());
    }

    #[test]
    fn sixteen_k_single_chip_splits_romh() {
        let mut crt = crt_8k();
        crt.header.game = false;
        crt.chips[0].data = vec![0x00; 0x4000];
        crt.chips[0].data[0x2000] = 0x99;
        let mut cart = CartGeneric::new(crt);
        cart.reset_cart().unwrap();
        let (read, _) = cart.get_device(0xa000, true, false);
        let rom = read.device.unwrap();
        assert_eq!(0x99, rom.borrow_mut().read(read.base, ReadMode::Read));
    }
}
