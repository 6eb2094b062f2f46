// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::Read;
use std::str;

use byteorder::{BigEndian, ReadBytesExt};
use trio8_core::{Error, Result};
use trio8_emu::c64::{Chip, ChipType, Crt, CrtHeader, HwType};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/CRT.TXT

static HEADER_SIG: &str = "C64 CARTRIDGE   ";
static CHIP_SIG: &str = "CHIP";

const HEADER_MIN_SIZE: u32 = 0x40;
const CHIP_HEADER_SIZE: u32 = 0x10;

/// Parse a CRT cartridge image into its in-memory model. All multi-byte
/// fields are big-endian; CHIP sections follow the header until end of
/// file. Any structural violation fails with `InvalidCartridge`.
pub fn load(reader: &mut dyn Read) -> Result<Crt> {
    let header = read_header(reader)?;
    info!(target: "loader", "Found cartridge {}, version {}.{}, type {:?}",
        header.name, header.version >> 8, header.version & 0xff, header.hw_type);
    let mut chips = Vec::new();
    while let Some(chip) = read_chip(reader)? {
        info!(target: "loader", "Found chip {}, offset 0x{:04x}, size {}",
            chip.bank, chip.load_addr, chip.data.len());
        chips.push(chip);
    }
    Ok(Crt { header, chips })
}

fn invalid(message: &str) -> Error {
    Error::InvalidCartridge(message.to_string())
}

fn read_header(reader: &mut dyn Read) -> Result<CrtHeader> {
    let mut signature = [0u8; 16];
    reader
        .read_exact(&mut signature)
        .map_err(|_| invalid("invalid cartridge header"))?;
    if str::from_utf8(&signature) != Ok(HEADER_SIG) {
        return Err(invalid("invalid cartridge signature"));
    }
    let header_length = reader
        .read_u32::<BigEndian>()
        .map_err(|_| invalid("invalid cartridge header"))?;
    if header_length < HEADER_MIN_SIZE {
        return Err(invalid("invalid cartridge header length"));
    }
    let version = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid cartridge header"))?;
    let hw_type = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid cartridge header"))?;
    let exrom = reader.read_u8().map_err(|_| invalid("invalid cartridge header"))?;
    let game = reader.read_u8().map_err(|_| invalid("invalid cartridge header"))?;
    let mut reserved = [0u8; 6];
    reader
        .read_exact(&mut reserved)
        .map_err(|_| invalid("invalid cartridge header"))?;
    let mut name = [0u8; 32];
    reader
        .read_exact(&mut name)
        .map_err(|_| invalid("invalid cartridge header"))?;
    // skip extended headers
    let mut padding = vec![0u8; (header_length - HEADER_MIN_SIZE) as usize];
    reader
        .read_exact(&mut padding)
        .map_err(|_| invalid("invalid cartridge header"))?;

    let name = name
        .iter()
        .take_while(|byte| **byte != 0)
        .map(|byte| *byte as char)
        .collect::<String>();
    Ok(CrtHeader {
        version,
        hw_type: HwType::from(hw_type)?,
        exrom: exrom != 0,
        game: game != 0,
        name,
    })
}

fn read_chip(reader: &mut dyn Read) -> Result<Option<Chip>> {
    let mut signature = [0u8; 4];
    match reader.read(&mut signature) {
        Ok(0) => return Ok(None),
        Ok(4) => {}
        _ => return Err(invalid("invalid chip header")),
    }
    if str::from_utf8(&signature) != Ok(CHIP_SIG) {
        return Err(invalid("invalid chip signature"));
    }
    let length = reader
        .read_u32::<BigEndian>()
        .map_err(|_| invalid("invalid chip header"))?;
    let chip_type = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid chip header"))?;
    let bank = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid chip header"))?;
    let load_addr = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid chip header"))?;
    let rom_size = reader
        .read_u16::<BigEndian>()
        .map_err(|_| invalid("invalid chip header"))?;
    if length != CHIP_HEADER_SIZE + rom_size as u32 {
        return Err(invalid("invalid chip section size"));
    }
    let mut data = vec![0u8; rom_size as usize];
    reader
        .read_exact(&mut data)
        .map_err(|_| invalid("invalid chip data"))?;
    Ok(Some(Chip {
        chip_type: ChipType::from(chip_type)?,
        bank,
        load_addr,
        data,
    }))
}
