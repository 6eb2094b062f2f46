// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{Error, Result};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/CRT.TXT

/// CHIP section payload type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChipType {
    Rom,
    Ram,
    Flash,
    Eeprom,
}

impl ChipType {
    pub fn from(value: u16) -> Result<ChipType> {
        match value {
            0 => Ok(ChipType::Rom),
            1 => Ok(ChipType::Ram),
            2 => Ok(ChipType::Flash),
            3 => Ok(ChipType::Eeprom),
            _ => Err(Error::InvalidCartridge(format!(
                "invalid chip type {}",
                value
            ))),
        }
    }
}

/// One CHIP section of a CRT file.
pub struct Chip {
    pub chip_type: ChipType,
    pub bank: u16,
    pub load_addr: u16,
    pub data: Vec<u8>,
}

/// Cartridge hardware types selecting the mapper implementation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HwType {
    Generic,
    SimonsBasic,
    OceanType1,
    GameSystem3,
    Zaxxon,
    MagicDesk,
    EasyFlash,
}

impl HwType {
    pub fn from(value: u16) -> Result<HwType> {
        match value {
            0 => Ok(HwType::Generic),
            4 => Ok(HwType::SimonsBasic),
            5 => Ok(HwType::OceanType1),
            15 => Ok(HwType::GameSystem3),
            18 => Ok(HwType::Zaxxon),
            19 => Ok(HwType::MagicDesk),
            32 => Ok(HwType::EasyFlash),
            _ => Err(Error::InvalidCartridge(format!(
                "hardware type not supported: {}",
                value
            ))),
        }
    }
}

pub struct CrtHeader {
    pub version: u16,
    pub hw_type: HwType,
    /// /EXROM line level at reset (true = high, inactive).
    pub exrom: bool,
    /// /GAME line level at reset (true = high, inactive).
    pub game: bool,
    pub name: String,
}

/// In-memory model of a CRT cartridge file: validated header plus CHIP
/// sections in file order. Built by the loader; consumed by the mapper
/// implementations.
pub struct Crt {
    pub header: CrtHeader,
    pub chips: Vec<Chip>,
}

impl Crt {
    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn hw_type(&self) -> HwType {
        self.header.hw_type
    }

    /// Chips at the given load address, in file order.
    pub fn chips_at(&self, load_addr: u16) -> impl Iterator<Item = &Chip> {
        self.chips
            .iter()
            .filter(move |chip| chip.load_addr == load_addr)
    }
}
