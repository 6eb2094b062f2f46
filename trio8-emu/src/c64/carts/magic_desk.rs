// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use bit_field::BitField;
use trio8_core::{new_shared, DevMap, Device, DeviceRef, Error, ReadMode, Result, Rom};

use crate::c64::cartridge::{Cartridge, GameExromMode, IO_SIZE};
use crate::c64::crt::Crt;

// Magic Desk: 8K banks at $8000 selected through $DE00. Bit 7 of the
// written value disables the cartridge ROM entirely (EXROM follows).

const ROM_SIZE: usize = 8192;
const MAX_BANKS: usize = 64;
const BANK_MASK: u8 = 63;

pub struct CartMagicDesk {
    crt: Crt,
    mode: GameExromMode,
    bank: usize,
    roms: Vec<Option<DeviceRef>>,
    remap_request: bool,
}

impl CartMagicDesk {
    pub fn new(crt: Crt) -> Self {
        Self {
            crt,
            mode: GameExromMode::Invisible,
            bank: 0,
            roms: Vec::new(),
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

impl Device for CartMagicDesk {
    fn kind(&self) -> &'static str {
        "CART_MAGIC_DESK"
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
        if offset != 0 {
            return;
        }
        if !value.get_bit(7) {
            let bank = (value & BANK_MASK) as usize;
            if bank != self.bank {
                self.bank = bank;
                self.remap_request = true;
            }
            self.set_mode(GameExromMode::from_pins(
                self.crt.header.game,
                self.crt.header.exrom,
            ));
        } else {
            self.set_mode(GameExromMode::Invisible);
        }
    }
}

impl Cartridge for CartMagicDesk {
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
        let read = if roml && self.mode != GameExromMode::Invisible {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c64::crt::{Chip, ChipType, CrtHeader, HwType};

    fn setup() -> CartMagicDesk {
        let chips = (0..4)
            .map(|bank| {
                let mut data = vec![0x00; ROM_SIZE];
                data[0] = bank as u8;
                Chip {
                    chip_type: ChipType::Rom,
                    bank,
                    load_addr: 0x8000,
                    data,
                }
            })
            .collect();
        let mut cart = CartMagicDesk::new(Crt {
            header: CrtHeader {
                version: 0x0100,
                hw_type: HwType::MagicDesk,
                exrom: false,
                game: true,
                name: "MD".to_string(),
            },
            chips,
        });
        cart.reset_cart().unwrap();
        cart
    }

    #[test]
    fn bank_switch_and_disable() {
        let mut cart = setup();
        cart.write(0, 2);
        let (read, _) = cart.get_device(0x8000, false, true);
        assert_eq!(
            2,
            read.device.unwrap().borrow_mut().read(0, ReadMode::Read)
        );
        cart.write(0, 0x80);
        assert_eq!(GameExromMode::Invisible, cart.mode());
        let (read, _) = cart.get_device(0x8000, false, true);
        assert!(!read.is_mapped());
    }
}
