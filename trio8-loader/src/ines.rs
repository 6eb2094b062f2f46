// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::Read;
use std::path::PathBuf;

use trio8_core::{Error, Result};
use trio8_emu::nes::{Cartridge, InesHeader};

// SPEC: https://www.nesdev.org/wiki/INES

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;

/// Parse an iNES image and build the matching cartridge. `ram_path` is the
/// file backing battery RAM when the header asks for it; pass the path
/// derived from the image digest and the storage directory.
pub fn load(name: &str, reader: &mut dyn Read, ram_path: Option<PathBuf>) -> Result<Cartridge> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| Error::InvalidCartridge(format!("{}: can't read iNES header", name)))?;
    let header = InesHeader::from_bytes(&bytes)?;
    info!(target: "loader",
        "Found iNES image {}, mapper {}, PRG {}K, CHR {}K, mirroring {}, battery {}",
        name,
        header.mapper(),
        header.prg_size() / 1024,
        header.chr_size() / 1024,
        if header.vertical_mirror() { "vertical" } else { "horizontal" },
        header.persistent_ram());

    if header.trainer() {
        let mut trainer = [0u8; TRAINER_SIZE];
        reader
            .read_exact(&mut trainer)
            .map_err(|_| Error::InvalidCartridge(format!("{}: truncated trainer", name)))?;
    }

    let mut prg = vec![0u8; header.prg_size()];
    reader
        .read_exact(&mut prg)
        .map_err(|_| Error::InvalidCartridge(format!("{}: truncated PRG ROM", name)))?;
    let mut chr = vec![0u8; header.chr_size()];
    reader
        .read_exact(&mut chr)
        .map_err(|_| Error::InvalidCartridge(format!("{}: truncated CHR ROM", name)))?;

    Cartridge::new(name, header, prg, chr, ram_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::{Device, ReadMode};
    use trio8_emu::nes::PPU_OFFSET;

    fn nes_image(mapper: u8, prg_blocks: u8, chr_blocks: u8) -> Vec<u8> {
        let mut image = vec![0u8; HEADER_SIZE];
        image[0..4].copy_from_slice(b"NES\x1a");
        image[4] = prg_blocks;
        image[5] = chr_blocks;
        image[6] = mapper << 4;
        let mut prg = vec![0u8; prg_blocks as usize * 16384];
        prg[0] = 0x99;
        image.extend_from_slice(&prg);
        let mut chr = vec![0u8; chr_blocks as usize * 8192];
        if !chr.is_empty() {
            chr[0] = 0x77;
        }
        image.extend_from_slice(&chr);
        image
    }

    #[test]
    fn loads_nrom_image() {
        let image = nes_image(0, 2, 1);
        let mut cart = load("smb", &mut &image[..], None).unwrap();
        cart.reset();
        // CPU $8000 reads PRG byte 0, PPU $0000 reads CHR byte 0
        assert_eq!(0x99, cart.read(0x4000, ReadMode::Read));
        assert_eq!(0x77, cart.read(PPU_OFFSET, ReadMode::Read));
    }

    #[test]
    fn truncated_prg_rejected() {
        let mut image = nes_image(0, 2, 1);
        image.truncate(HEADER_SIZE + 1000);
        assert!(load("smb", &mut &image[..], None).is_err());
    }
}
