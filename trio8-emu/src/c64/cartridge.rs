// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{new_shared, DevMap, Device, Result, Shared};

use super::carts;
use super::crt::{Crt, HwType};

// Design:
//   A C64 cartridge is a device exposed in the expansion I/O window
//   ($DE00-$DFFF) that additionally drives the ROML/ROMH windows through
//   the PLA. Pin changes and bank switches are not applied synchronously to
//   the bus; the cartridge raises a remap request that the machine services
//   once the triggering bus write has completed.

/// Size of the expansion I/O window ($DE00-$DFFF).
pub const IO_SIZE: usize = 512;

/// GAME pin bit in a pin value (true = line high, inactive).
pub const PIN_GAME: u8 = 0x01;
/// EXROM pin bit in a pin value (true = line high, inactive).
pub const PIN_EXROM: u8 = 0x02;

/// The four GAME/EXROM configurations a cartridge can select.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GameExromMode {
    Mode8k,
    Mode16k,
    Ultimax,
    Invisible,
}

impl GameExromMode {
    /// Decode a mode from line levels (true = high).
    pub fn from_pins(game: bool, exrom: bool) -> Self {
        match (game, exrom) {
            (true, false) => GameExromMode::Mode8k,
            (false, false) => GameExromMode::Mode16k,
            (false, true) => GameExromMode::Ultimax,
            (true, true) => GameExromMode::Invisible,
        }
    }

    /// GAME line level.
    pub fn game(self) -> bool {
        matches!(self, GameExromMode::Mode8k | GameExromMode::Invisible)
    }

    /// EXROM line level.
    pub fn exrom(self) -> bool {
        matches!(self, GameExromMode::Ultimax | GameExromMode::Invisible)
    }

    /// Pin value with PIN_GAME/PIN_EXROM bits.
    pub fn pins(self) -> u8 {
        (if self.game() { PIN_GAME } else { 0 }) | (if self.exrom() { PIN_EXROM } else { 0 })
    }
}

pub trait Cartridge: Device {
    /// Load the CRT chips and set the GAME/EXROM state. Semantic validation
    /// happens here; an error leaves no attached state behind.
    fn reset_cart(&mut self) -> Result<()>;

    /// The device driving the given 4K block for the current ROML/ROMH line
    /// state, as a (read, write) pair. Unmapped replies leave the PLA
    /// template untouched.
    fn get_device(&mut self, addr: u16, romh: bool, roml: bool) -> (DevMap, DevMap);

    /// Current GAME/EXROM configuration.
    fn mode(&self) -> GameExromMode;

    /// Total size of the cartridge ROM/RAM payload.
    fn cart_size(&self) -> usize;

    /// Take the pending remap request raised by a register write. The
    /// machine polls this from its bus write observer.
    fn take_remap_request(&mut self) -> bool;

    fn name(&self) -> &str;
}

/// Instantiate the mapper matching the CRT hardware type. The returned
/// cartridge is unusable until `reset_cart` is called.
pub fn from_crt(crt: Crt) -> Result<Shared<dyn Cartridge>> {
    info!(target: "cart", "Cartridge {}, hardware type {:?}, exrom {}, game {}",
        crt.name(), crt.hw_type(), crt.header.exrom, crt.header.game);
    let cartridge: Shared<dyn Cartridge> = match crt.hw_type() {
        HwType::Generic => new_shared(carts::CartGeneric::new(crt)),
        HwType::SimonsBasic => new_shared(carts::CartSimonsBasic::new(crt)),
        HwType::OceanType1 => new_shared(carts::CartOceanType1::new(crt)),
        HwType::GameSystem3 => new_shared(carts::CartGameSystem3::new(crt)),
        HwType::Zaxxon => new_shared(carts::CartZaxxon::new(crt)),
        HwType::MagicDesk => new_shared(carts::CartMagicDesk::new(crt)),
        HwType::EasyFlash => new_shared(carts::CartEasyFlash::new(crt)),
    };
    Ok(cartridge)
}
