// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, Ram, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::{ChipType, Crt};

// EasyFlash: 1 MiB of flash as 64 banks of ROML 8K + ROMH 8K, plus an
// optional 256 byte RAM visible at $DF00-$DFFF.
//
// Control register 1 ($DE00): bank number (bits 0..5). A bank write forces
// a PLA remap even when the GAME/EXROM pins do not change.
// Control register 2 ($DE02):
//      Bit     Name    Content
//      ---------------------------------------------------------------
//      7       L       LED (ignored here)
//      2       M       GAME mode (1: controlled by bit G)
//      1       X       EXROM state
//      0       G       GAME state
//   MXG: 4 = cartridge off, 5 = Ultimax, 6 = 8K, 7 = 16K.

const MAX_BANKS: usize = 64;
const BANK_MASK: u8 = 63;
const ROM_SIZE: usize = 8192;
const ROML_LOAD_ADDR: u16 = 0x8000;
const ROMH_LOAD_ADDR_1: u16 = 0xa000;
const ROMH_LOAD_ADDR_2: u16 = 0xe000;

pub struct CartEasyFlash {
    crt: Crt,
    mode: GameExromMode,
    bank: usize,
    reg2: u8,
    roms_lo: Vec<Option<DeviceRef>>,
    roms_hi: Vec<Option<DeviceRef>>,
    ram: Option<DeviceRef>,
    remap_request: bool,
}

impl CartEasyFlash {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            bank: 0,
            reg2: 0,
            roms_lo: Vec::new(),
            roms_hi: Vec::new(),
            ram: None,
            remap_request: false,
        }
    }

    fn set_mode(&mut self, mode: GameExromMode) {
        if mode != self.mode {
            self.mode = mode;
            self.remap_request = true;
        }
    }

    fn invalid(&self, entry: usize, message: &str) -> Error {
        Error::InvalidCartridge(format!(
            "{}: chip entry {}: {}",
            self.crt.name(),
            entry,
            message
        ))
    }
}

impl Device for CartEasyFlash {
    fn kind(&self) -> &'static str {
        "CART_EASY_FLASH"
    }

    fn label(&self) -> &str {
        self.crt.name()
    }

    fn size(&self) -> usize {
        IO_SIZE
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < 0x100 {
            if offset & 0x02 == 0 {
                self.bank as u8
            } else {
                self.reg2
            }
        } else if let Some(ref ram) = self.ram {
            ram.borrow_mut().read(offset - 0x100, mode)
        } else {
            255
        }
    }

    fn write(&mut self, offset: usize, value: u8) {
        if offset < 0x100 {
            if offset & 0x02 == 0 {
                let bank = (value & BANK_MASK) as usize;
                if bank != self.bank {
                    self.bank = bank;
                    self.remap_request = true;
                }
            } else {
                self.reg2 = value & 0x87;
                match self.reg2 & 0x07 {
                    4 => self.set_mode(GameExromMode::Invisible),
                    5 => self.set_mode(GameExromMode::Ultimax),
                    6 => self.set_mode(GameExromMode::Mode8k),
                    7 => self.set_mode(GameExromMode::Mode16k),
                    _ => {}
                }
            }
        } else if let Some(ref ram) = self.ram {
            ram.borrow_mut().write(offset - 0x100, value);
        }
    }
}

impl Cartridge for CartEasyFlash {
    fn reset_cart(&mut self) -> Result<()> {
        self.bank = 0;
        self.reg2 = 0;
        self.ram = None;
        self.roms_lo = vec![None; MAX_BANKS];
        self.roms_hi = vec![None; MAX_BANKS];
        self.mode = GameExromMode::from_pins(self.crt.header.game, self.crt.header.exrom);
        self.remap_request = false;

        for entry in 0..self.crt.chips.len() {
            let chip = &self.crt.chips[entry];
            match chip.chip_type {
                ChipType::Rom | ChipType::Flash => {
                    if chip.data.len() != ROM_SIZE {
                        return Err(self.invalid(entry, "invalid ROM size"));
                    }
                    if chip.bank as usize >= MAX_BANKS {
                        return Err(self.invalid(entry, "invalid bank"));
                    }
                    let rom: DeviceRef =
                        new_shared(Rom::new_with_data(self.crt.name(), &chip.data));
                    match chip.load_addr {
                        ROML_LOAD_ADDR => self.roms_lo[chip.bank as usize] = Some(rom),
                        ROMH_LOAD_ADDR_1 | ROMH_LOAD_ADDR_2 => {
                            self.roms_hi[chip.bank as usize] = Some(rom)
                        }
                        _ => return Err(self.invalid(entry, "invalid load address")),
                    }
                }
                ChipType::Ram => {
                    self.ram = Some(new_shared(Ram::new_with_data(self.crt.name(), &chip.data)));
                }
                ChipType::Eeprom => {
                    return Err(self.invalid(entry, "type EEPROM"));
                }
            }
        }
        Ok(())
    }

    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap) {
        let read = match self.mode {
            GameExromMode::Mode8k if roml => self.roms_lo[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - ROML_LOAD_ADDR) as usize)),
            GameExromMode::Mode16k if roml => self.roms_lo[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - ROML_LOAD_ADDR) as usize)),
            GameExromMode::Mode16k if romh => self.roms_hi[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - ROMH_LOAD_ADDR_1) as usize)),
            GameExromMode::Ultimax if roml => self.roms_lo[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - ROML_LOAD_ADDR) as usize)),
            GameExromMode::Ultimax if romh => self.roms_hi[self.bank]
                .as_ref()
                .map(|rom| DevMap::new(rom.clone(), (addr - ROMH_LOAD_ADDR_2) as usize)),
            _ => None,
        };
        (read.unwrap_or_else(DevMap::none), DevMap::none())
    }

    fn mode(&self) -> GameExromMode {
        self.mode
    }

    fn cart_size(&self) -> usize {
        let roms = self.roms_lo.iter().chain(self.roms_hi.iter());
        roms.filter(|rom| rom.is_some()).count() * ROM_SIZE
            + self.ram.as_ref().map_or(0, |ram| ram.borrow().size())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64::crt::{Chip, CrtHeader, HwType};

    fn easy_flash_crt(banks: usize) -> Crt {
        let mut chips = Vec::new();
        for bank in 0..banks {
            for load_addr in [ROML_LOAD_ADDR, ROMH_LOAD_ADDR_2].iter() {
                let mut data = vec![0x00; ROM_SIZE];
                data[0] = bank as u8;
                data[1] = if *load_addr == ROML_LOAD_ADDR { 0x01 } else { 0x02 };
                chips.push(Chip {
                    chip_type: ChipType::Flash,
                    bank: bank as u16,
                    load_addr: *load_addr,
                    data,
                });
            }
        }
        Crt {
            header: CrtHeader {
                version: 0x0100,
                hw_type: HwType::EasyFlash,
                exrom: true,
                game: false,
                name: "EF".to_string(),
            },
            chips,
        }
    }

    fn setup(banks: usize) -> CartEasyFlash {
        let mut cart = CartEasyFlash::new(easy_flash_crt(banks));
        cart.reset_cart().unwrap();
        cart
    }

    #[test]
    fn boots_in_ultimax() {
        let cart = setup(4);
        assert_eq!(GameExromMode::Ultimax, cart.mode());
    }

    #[test]
    fn bank_register_selects_bank() {
        let mut cart = setup(8);
        cart.write(0x00, 5);
        assert!(cart.take_remap_request());
        assert_eq!(5, cart.read(0x00, ReadMode::Read));
        cart.write(0x02, 0x06);
        let (read, _) = cart.get_device(0x8000, false, true);
        let rom = read.device.unwrap();
        assert_eq!(5, rom.borrow_mut().read(read.base, ReadMode::Read));
    }

    #[test]
    fn mode_register_selects_ultimax() {
        let mut cart = setup(8);
        // LED on, MXG = 101
        cart.write(0x02, 0x85);
        assert_eq!(GameExromMode::Ultimax, cart.mode());
        cart.write(0x00, 0x03);
        assert!(cart.take_remap_request());
        let (read, _) = cart.get_device(0xe000, true, false);
        let rom = read.device.unwrap();
        assert_eq!(3, rom.borrow_mut().read(read.base, ReadMode::Read));
        assert_eq!(2, rom.borrow_mut().read(read.base + 1, ReadMode::Read));
    }

    #[test]
    fn eeprom_chip_rejected() {
        let mut crt = easy_flash_crt(1);
        crt.chips[0].chip_type = ChipType::Eeprom;
        let mut cart = CartEasyFlash::new(crt);
        assert!(cart.reset_cart().is_err());
    }
}
