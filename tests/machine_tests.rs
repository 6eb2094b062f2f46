// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

// End-to-end checks across the loader, hardware and machine layers.

use trio8_core::{ControlChannel, Rom};
use trio8_emu::c64::cartridge::from_crt;
use trio8_system::{Nes, C64};

fn crt_image(hw_type: u16, exrom: u8, game: u8, chips: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"C64 CARTRIDGE   ");
    image.extend_from_slice(&0x40u32.to_be_bytes());
    image.extend_from_slice(&0x0100u16.to_be_bytes());
    image.extend_from_slice(&hw_type.to_be_bytes());
    image.push(exrom);
    image.push(game);
    image.extend_from_slice(&[0u8; 6]);
    let mut name = [0u8; 32];
    name[..5].copy_from_slice(b"E2E  ");
    image.extend_from_slice(&name);
    for (bank, load_addr, data) in chips {
        image.extend_from_slice(b"CHIP");
        image.extend_from_slice(&(0x10 + data.len() as u32).to_be_bytes());
        image.extend_from_slice(&0u16.to_be_bytes());
        image.extend_from_slice(&bank.to_be_bytes());
        image.extend_from_slice(&load_addr.to_be_bytes());
        image.extend_from_slice(&(data.len() as u16).to_be_bytes());
        image.extend_from_slice(data);
    }
    image
}

fn nes_image(mapper: u8, prg_blocks: u8, chr_blocks: u8) -> Vec<u8> {
    let mut image = vec![0u8; 16];
    image[0..4].copy_from_slice(b"NES\x1a");
    image[4] = prg_blocks;
    image[5] = chr_blocks;
    image[6] = mapper << 4;
    for bank in 0..prg_blocks as usize {
        let mut prg = vec![0u8; 16384];
        prg[0] = 0x50 + bank as u8;
        image.extend_from_slice(&prg);
    }
    for bank in 0..chr_blocks as usize {
        let mut chr = vec![0u8; 8192];
        chr[0] = 0x60 + bank as u8;
        image.extend_from_slice(&chr);
    }
    image
}

fn c64() -> C64 {
    C64::build_with_roms(
        Rom::new_with_data("basic", &[0x94; 0x2000]),
        Rom::new_with_data("chargen", &[0x3c; 0x1000]),
        Rom::new_with_data("kernal", &[0x85; 0x2000]),
        ControlChannel::new(),
    )
}

#[test]
fn generic_8k_cartridge_boot() {
    let mut roml = vec![0x00u8; 0x2000];
    roml[0] = 0x09;
    roml[1] = 0x80;
    let image = crt_image(0, 0, 1, &[(0, 0x8000, roml)]);
    let crt = trio8_loader::crt::load(&mut &image[..]).unwrap();
    let cartridge = from_crt(crt).unwrap();

    let mut c64 = c64();
    c64.attach_cartridge(cartridge).unwrap();
    c64.reset();
    assert_eq!(0x09, c64.read(0x8000));
    assert_eq!(0x80, c64.read(0x8001));
    // LORAM|HIRAM|CHAREN through the processor port keeps BASIC visible
    c64.write(0x0001, 0x37);
    assert_eq!(0x94, c64.read(0xa000));
}

#[test]
fn easy_flash_mode_and_bank_switching() {
    let mut chips = Vec::new();
    for bank in 0u16..8 {
        for load_addr in [0x8000u16, 0xe000].iter() {
            let mut data = vec![0x00u8; 0x2000];
            data[0] = bank as u8;
            data[1] = if *load_addr == 0x8000 { 0x01 } else { 0x02 };
            chips.push((bank, *load_addr, data));
        }
    }
    let image = crt_image(32, 1, 0, &chips);
    let crt = trio8_loader::crt::load(&mut &image[..]).unwrap();

    let mut c64 = c64();
    c64.attach_cartridge(from_crt(crt).unwrap()).unwrap();
    c64.reset();
    // Ultimax at reset with bank 0
    assert_eq!(0x00, c64.read(0x8000));
    // LED on, MXG = 101: Ultimax; then bank 3
    c64.write(0xde02, 0x85);
    c64.write(0xde00, 0x03);
    assert_eq!(0x03, c64.read(0x8000));
    assert_eq!(0x01, c64.read(0x8001));
    assert_eq!(0x03, c64.read(0xe000));
    assert_eq!(0x02, c64.read(0xe001));
    // 8K mode maps ROML only; the kernal comes back at $E000
    c64.write(0xde02, 0x06);
    assert_eq!(0x03, c64.read(0x8000));
    assert_eq!(0x85, c64.read(0xe000));
}

#[test]
fn crt_signature_is_mandatory() {
    let mut image = crt_image(0, 0, 1, &[]);
    image[3] = b'!';
    assert!(trio8_loader::crt::load(&mut &image[..]).is_err());
}

#[test]
fn nrom_reads_match_image_layout() {
    let image = nes_image(0, 2, 1);
    let cartridge = trio8_loader::ines::load("e2e", &mut &image[..], None).unwrap();
    let mut nes = Nes::default();
    nes.attach_cartridge(cartridge).unwrap();
    assert_eq!(0x50, nes.read(0x8000));
    assert_eq!(0x51, nes.read(0xc000));
    assert_eq!(0x60, nes.ppu_read(0x0000));
}

#[test]
fn mmc1_serial_writes_select_banks() {
    let image = nes_image(1, 4, 1);
    let cartridge = trio8_loader::ines::load("e2e", &mut &image[..], None).unwrap();
    let mut nes = Nes::default();
    nes.attach_cartridge(cartridge).unwrap();

    // control = 0x0C: 16K mode, fixed C000
    for bit in [0, 0, 1, 1, 0].iter() {
        nes.write(0x8000, *bit);
    }
    // PRG register = 2
    for bit in [0, 1, 0, 0, 0].iter() {
        nes.write(0xe000, *bit);
    }
    assert_eq!(0x52, nes.read(0x8000));
    assert_eq!(0x53, nes.read(0xc000));
}
