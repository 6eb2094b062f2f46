// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs;
use std::path::PathBuf;

use bit_field::BitField;
use trio8_core::{new_shared, Bank, Device, DeviceRef, Error, Ram, ReadMode, Result, Rom, Shared};

use super::ines::InesHeader;

// Design:
//   The cartridge is a single device covering both bus windows. Offsets
//   below PPU_OFFSET are the CPU side relative to $4000; offsets from
//   PPU_OFFSET up are the PPU side relative to $0000. Mapper families share
//   the bank plumbing and differ only in how bus writes move the banks.
//
//   CPU side                          PPU side
//   0000-1fff  unmapped ($4000)       c000-cfff  CHR LO ($0000)
//   2000-3fff  PRG RAM ($6000)        d000-dfff  CHR HI ($1000)
//   4000-7fff  PRG LO  ($8000)        e000-efff  nametables ($2000)
//   8000-bfff  PRG HI  ($C000)

/// First CPU address decoded by the cartridge device.
pub const CPU_WINDOW_BASE: u16 = 0x4000;
/// Device offset where the PPU window begins.
pub const PPU_OFFSET: usize = 0xc000;

const RAM_BASE: usize = 0x2000;
const PRG_LO_BASE: usize = 0x4000;
const PRG_HI_BASE: usize = 0x8000;
const PRG_BANK_SIZE: usize = 16384;
const CHR_HI_BASE: usize = 0x1000;
const VRAM_BASE: usize = 0x2000;
const CHR_BANK_SIZE: usize = 4096;
const CHR_RAM_SIZE: usize = 8192;
const RAM_BANK_SIZE: usize = 8192;
const VRAM_SIZE: usize = 2048;
const VRAM_MASK: usize = VRAM_SIZE - 1;

const A10: usize = 1 << 10;
const A11: usize = 1 << 11;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MirrorType {
    OneScreenLower = 0,
    OneScreenUpper = 1,
    Vertical = 2,
    Horizontal = 3,
}

#[derive(Clone, Copy, PartialEq)]
enum PrgMode {
    FixedC000,
    Fixed8000,
    Mode32k,
}

#[derive(Clone, Copy, PartialEq)]
enum Mapper {
    Nrom,
    Mmc1,
    Uxrom,
}

#[derive(Default)]
struct Mmc1State {
    shift: u8,
    count: u8,
    control: u8,
    prg_a18: bool,
}

pub struct Cartridge {
    name: String,
    header: InesHeader,
    mapper: Mapper,
    mirror: MirrorType,
    ram_path: Option<PathBuf>,
    vram: Ram,
    ram: Shared<Ram>,
    prg: Shared<Rom>,
    chr: DeviceRef,
    ram_bank: Bank,
    prg_lo: Bank,
    prg_hi: Bank,
    chr_lo: Bank,
    chr_hi: Bank,
    chr_mode_4k: bool,
    prg_mode: PrgMode,
    mmc1: Mmc1State,
}

impl Cartridge {
    /// Build a cartridge from a parsed iNES image. `ram_path` names the
    /// persistent RAM file when the header flags battery backup; previously
    /// saved contents are loaded here and written back on `save_ram`.
    pub fn new(
        name: &str,
        header: InesHeader,
        prg_data: Vec<u8>,
        chr_data: Vec<u8>,
        ram_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mapper = match header.mapper() {
            0 => Mapper::Nrom,
            1 => Mapper::Mmc1,
            2 => Mapper::Uxrom,
            other => {
                return Err(Error::InvalidCartridge(format!(
                    "{}: mapper not supported: {}",
                    name, other
                )));
            }
        };
        Self::validate(name, mapper, &header)?;
        if prg_data.len() != header.prg_size() || chr_data.len() != header.chr_size() {
            return Err(Error::InvalidCartridge(format!(
                "{}: payload does not match header sizes",
                name
            )));
        }

        let ram_size = header.prg_ram_size();
        let ram_path = if header.persistent_ram() { ram_path } else { None };
        let ram = match ram_path {
            Some(ref path) if path.exists() => {
                info!(target: "cart", "Loading persistent RAM from {}", path.display());
                let data = fs::read(path)?;
                if data.len() != ram_size {
                    return Err(Error::Io(format!(
                        "{}: invalid persistent RAM size {}",
                        path.display(),
                        data.len()
                    )));
                }
                Ram::new_with_data("prg-ram", &data)
            }
            _ => Ram::new("prg-ram", ram_size),
        };
        let ram = new_shared(ram);

        let prg = new_shared(Rom::new_with_data("prg", &prg_data));
        let chr: DeviceRef = if chr_data.is_empty() {
            new_shared(Ram::new("chr-ram", CHR_RAM_SIZE))
        } else {
            new_shared(Rom::new_with_data("chr", &chr_data))
        };

        let prg_ref: DeviceRef = prg.clone();
        let ram_ref: DeviceRef = ram.clone();
        let prg_lo = Bank::new(prg_ref.clone(), PRG_BANK_SIZE);
        let mut prg_hi = Bank::new(prg_ref, PRG_BANK_SIZE);
        prg_hi.set_bank(prg_hi.banks() - 1);
        let chr_lo = Bank::new_with_bank(chr.clone(), CHR_BANK_SIZE, 0);
        let chr_hi = Bank::new_with_bank(chr.clone(), CHR_BANK_SIZE, 1);
        let ram_bank = Bank::new(ram_ref, RAM_BANK_SIZE);

        let mirror = if header.vertical_mirror() {
            MirrorType::Vertical
        } else {
            MirrorType::Horizontal
        };

        Ok(Self {
            name: name.to_string(),
            header,
            mapper,
            mirror,
            ram_path,
            vram: Ram::new("vram", VRAM_SIZE),
            ram,
            prg,
            chr,
            ram_bank,
            prg_lo,
            prg_hi,
            chr_lo,
            chr_hi,
            chr_mode_4k: false,
            prg_mode: PrgMode::FixedC000,
            mmc1: Mmc1State::default(),
        })
    }

    fn validate(name: &str, mapper: Mapper, header: &InesHeader) -> Result<()> {
        let prg_size = header.prg_size();
        let chr_size = header.chr_size();
        if prg_size == 0 {
            return Err(Error::InvalidCartridge(format!(
                "{}: empty PRG ROM",
                name
            )));
        }
        match mapper {
            Mapper::Nrom => {
                if prg_size != 16384 && prg_size != 32768 {
                    return Err(Error::InvalidCartridge(format!(
                        "{}: invalid PRG ROM size {}, it must be 16K or 32K",
                        name, prg_size
                    )));
                }
                if chr_size != 0 && chr_size != 8192 {
                    return Err(Error::InvalidCartridge(format!(
                        "{}: invalid CHR ROM size {}, it must be 8K",
                        name, chr_size
                    )));
                }
            }
            Mapper::Uxrom => {
                if chr_size != 0 {
                    return Err(Error::InvalidCartridge(format!(
                        "{}: invalid CHR ROM size {}, it must be 0",
                        name, chr_size
                    )));
                }
            }
            Mapper::Mmc1 => {}
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    pub fn mirror(&self) -> MirrorType {
        self.mirror
    }

    /// Write persistent RAM back to disk, if the cartridge carries any.
    pub fn save_ram(&self) -> Result<()> {
        if let Some(ref path) = self.ram_path {
            info!(target: "cart", "Saving persistent RAM to {}", path.display());
            fs::write(path, self.ram.borrow().buffer())?;
        }
        Ok(())
    }

    fn cpu_read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < RAM_BASE {
            0
        } else if offset < PRG_LO_BASE {
            self.ram_bank.read(offset - RAM_BASE, mode)
        } else if offset < PRG_HI_BASE {
            self.prg_lo.read(offset - PRG_LO_BASE, mode)
        } else {
            self.prg_hi.read(offset - PRG_HI_BASE, mode)
        }
    }

    fn cpu_write(&mut self, offset: usize, value: u8) {
        if offset < RAM_BASE {
            return;
        }
        if offset < PRG_LO_BASE {
            self.ram_bank.write(offset - RAM_BASE, value);
            return;
        }
        match self.mapper {
            Mapper::Nrom => {}
            Mapper::Uxrom => self.prg_lo.set_bank(value as usize),
            Mapper::Mmc1 => self.mmc1_load_bit(offset, value),
        }
    }

    fn ppu_read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < CHR_HI_BASE {
            self.chr_lo.read(offset, mode)
        } else if offset < VRAM_BASE {
            self.chr_hi.read(offset - CHR_HI_BASE, mode)
        } else {
            let addr = self.vram_mirror(offset - VRAM_BASE) & VRAM_MASK;
            self.vram.read(addr, mode)
        }
    }

    fn ppu_write(&mut self, offset: usize, value: u8) {
        if offset < CHR_HI_BASE {
            self.chr_lo.write(offset, value);
        } else if offset < VRAM_BASE {
            self.chr_hi.write(offset - CHR_HI_BASE, value);
        } else {
            let addr = self.vram_mirror(offset - VRAM_BASE) & VRAM_MASK;
            self.vram.write(addr, value);
        }
    }

    // Horizontal mirroring pairs 2000/2400 and 2800/2C00; vertical pairs
    // 2000/2800 and 2400/2C00; one-screen modes collapse all four.
    fn vram_mirror(&self, addr: usize) -> usize {
        match self.mirror {
            MirrorType::OneScreenLower => addr & !0x0c00,
            MirrorType::OneScreenUpper => (addr & !0x0c00) | 0x0400,
            MirrorType::Vertical => addr,
            MirrorType::Horizontal => {
                let bit10 = (addr & A11) >> 1;
                (addr & !(A11 | A10)) | bit10
            }
        }
    }

    // -- MMC1

    fn mmc1_load_bit(&mut self, offset: usize, value: u8) {
        if value.get_bit(7) {
            // shift register reset forces "16K, fixed C000"
            let control = self.mmc1.control | 0x0c;
            self.mmc1_control(control);
            self.mmc1.shift = 0;
            self.mmc1.count = 0;
            return;
        }
        self.mmc1.shift |= (value & 1) << self.mmc1.count;
        self.mmc1.count += 1;
        if self.mmc1.count < 5 {
            return;
        }
        let data = self.mmc1.shift;
        self.mmc1.shift = 0;
        self.mmc1.count = 0;
        //  CPU      Register
        //  8000     control
        //  A000     CHR-0
        //  C000     CHR-1
        //  E000     PRG
        match offset >> 13 {
            0x2 => self.mmc1_control(data),
            0x3 => self.mmc1_chr(false, data),
            0x4 => self.mmc1_chr(true, data),
            0x5 => self.mmc1_prg(data),
            _ => {}
        }
    }

    fn mmc1_control(&mut self, value: u8) {
        self.mmc1.control = value & 0x1f;
        self.mirror = match value & 3 {
            0 => MirrorType::OneScreenLower,
            1 => MirrorType::OneScreenUpper,
            2 => MirrorType::Vertical,
            _ => MirrorType::Horizontal,
        };
        match (value >> 2) & 3 {
            0 | 1 => {
                self.prg_mode = PrgMode::Mode32k;
                self.prg_lo.set_bank(0);
                self.prg_hi.set_bank(1);
            }
            2 => {
                self.prg_mode = PrgMode::Fixed8000;
                self.prg_lo.set_bank(0);
            }
            _ => {
                self.prg_mode = PrgMode::FixedC000;
                let last = self.prg_hi.banks() - 1;
                self.prg_hi.set_bank(last);
            }
        }
        self.chr_mode_4k = value & 0x10 != 0;
    }

    fn mmc1_prg(&mut self, value: u8) {
        let bank = (value & 0x0f) as usize | ((self.mmc1.prg_a18 as usize) << 4);
        match self.prg_mode {
            PrgMode::Mode32k => {
                self.prg_lo.set_bank(bank & !1);
                self.prg_hi.set_bank(bank | 1);
            }
            PrgMode::Fixed8000 => self.prg_hi.set_bank(bank),
            PrgMode::FixedC000 => self.prg_lo.set_bank(bank),
        }
    }

    fn mmc1_chr(&mut self, hi: bool, value: u8) {
        let chr_size = self.chr.borrow().size();
        let mask = 0x01
            | if chr_size >= 16384 { 0x02 } else { 0 }
            | if chr_size >= 32768 { 0x04 } else { 0 }
            | if chr_size >= 65536 { 0x08 } else { 0 }
            | if chr_size == 131072 { 0x10 } else { 0 };
        let bank = (value & mask) as usize;
        if self.chr_mode_4k {
            if hi {
                self.chr_hi.set_bank(bank);
            } else {
                self.chr_lo.set_bank(bank);
            }
        } else {
            self.chr_lo.set_bank(bank & !1);
            self.chr_hi.set_bank(bank | 1);
        }

        // larger PRG RAM boards take their RAM bank from bits 2..3
        let ram_size = self.ram.borrow().size();
        if ram_size > 8192 {
            let bank = (value as usize >> 2) & if ram_size == 16384 { 1 } else { 3 };
            self.ram_bank.set_bank(bank);
        }

        // bit 4 drives PRG A18 on 512K boards
        if self.prg.borrow().size() == 524288 {
            let a18 = value & 0x10 != 0;
            if a18 != self.mmc1.prg_a18 {
                let lo = self.prg_lo.bank();
                let hi = self.prg_hi.bank();
                if a18 {
                    self.prg_lo.set_bank(lo | 0x10);
                    self.prg_hi.set_bank(hi | 0x10);
                } else {
                    self.prg_lo.set_bank(lo & !0x10);
                    self.prg_hi.set_bank(hi & !0x10);
                }
                self.mmc1.prg_a18 = a18;
            }
        }
    }
}

impl Device for Cartridge {
    fn kind(&self) -> &'static str {
        match self.mapper {
            Mapper::Nrom => "CART_NROM",
            Mapper::Mmc1 => "CART_SXROM",
            Mapper::Uxrom => "CART_UXROM",
        }
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        PPU_OFFSET + 0x3000
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        if offset < PPU_OFFSET {
            self.cpu_read(offset, mode)
        } else {
            self.ppu_read(offset - PPU_OFFSET, mode)
        }
    }

    fn write(&mut self, offset: usize, value: u8) {
        if offset < PPU_OFFSET {
            self.cpu_write(offset, value);
        } else {
            self.ppu_write(offset - PPU_OFFSET, value);
        }
    }

    fn reset(&mut self) {
        self.prg_mode = PrgMode::FixedC000;
        self.prg_lo.set_bank(0);
        let last = self.prg_hi.banks() - 1;
        self.prg_hi.set_bank(last);
        self.chr_mode_4k = false;
        self.chr_lo.set_bank(0);
        self.chr_hi.set_bank(1);
        self.ram_bank.set_bank(0);
        self.mmc1 = Mmc1State {
            control: 0x0c,
            ..Mmc1State::default()
        };
    }
}

impl Drop for Cartridge {
    fn drop(&mut self) {
        if let Err(err) = self.save_ram() {
            warn!(target: "cart", "{}: failed to save persistent RAM: {}", self.name, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::ines::HEADER_SIZE;
    use super::*;

    fn header(mapper: u8, prg_blocks: u8, chr_blocks: u8) -> InesHeader {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&super::super::ines::SIGNATURE);
        bytes[4] = prg_blocks;
        bytes[5] = chr_blocks;
        bytes[6] = mapper << 4;
        InesHeader::from_bytes(&bytes).unwrap()
    }

    fn prg(blocks: usize) -> Vec<u8> {
        let mut data = vec![0x00; blocks * 16384];
        for bank in 0..blocks {
            data[bank * 16384] = 0x10 + bank as u8;
        }
        data
    }

    fn chr() -> Vec<u8> {
        let mut data = vec![0x00; 8192];
        data[0] = 0xc0;
        data[0x1000] = 0xc1;
        data
    }

    #[test]
    fn nrom_16k_mirrors_prg() {
        let mut cart =
            Cartridge::new("nrom", header(0, 1, 1), prg(1), chr(), None).unwrap();
        cart.reset();
        // CPU $8000 and $C000 both read PRG byte 0
        assert_eq!(0x10, cart.read(PRG_LO_BASE, ReadMode::Read));
        assert_eq!(0x10, cart.read(PRG_HI_BASE, ReadMode::Read));
        // PPU $0000 reads CHR byte 0
        assert_eq!(0xc0, cart.read(PPU_OFFSET, ReadMode::Read));
    }

    #[test]
    fn nrom_32k_maps_both_banks() {
        let mut cart =
            Cartridge::new("nrom", header(0, 2, 1), prg(2), chr(), None).unwrap();
        cart.reset();
        assert_eq!(0x10, cart.read(PRG_LO_BASE, ReadMode::Read));
        assert_eq!(0x11, cart.read(PRG_HI_BASE, ReadMode::Read));
    }

    #[test]
    fn uxrom_switches_low_bank() {
        let mut cart =
            Cartridge::new("uxrom", header(2, 4, 0), prg(4), Vec::new(), None).unwrap();
        cart.reset();
        cart.write(PRG_LO_BASE, 2);
        assert_eq!(0x12, cart.read(PRG_LO_BASE, ReadMode::Read));
        // last bank stays fixed at $C000
        assert_eq!(0x13, cart.read(PRG_HI_BASE, ReadMode::Read));
    }

    #[test]
    fn mmc1_shift_register_commits_on_fifth_write() {
        let mut cart =
            Cartridge::new("mmc1", header(1, 4, 1), prg(4), chr(), None).unwrap();
        cart.reset();
        // select PRG mode "fixed C000" (control = 0x0C) via five writes to $8000
        for bit in [0, 0, 1, 1, 0].iter() {
            cart.write(PRG_LO_BASE, *bit);
        }
        // select PRG bank 2 via five writes to $E000
        for bit in [0, 1, 0, 0, 0].iter() {
            cart.write(PRG_HI_BASE + 0x2000, *bit);
        }
        assert_eq!(0x12, cart.read(PRG_LO_BASE, ReadMode::Read));
        assert_eq!(0x13, cart.read(PRG_HI_BASE, ReadMode::Read));
    }

    #[test]
    fn mmc1_reset_bit_restores_fixed_c000() {
        let mut cart =
            Cartridge::new("mmc1", header(1, 4, 1), prg(4), chr(), None).unwrap();
        cart.reset();
        for bit in [0, 0, 0, 0, 0].iter() {
            cart.write(PRG_LO_BASE, *bit);
        }
        cart.write(PRG_LO_BASE, 0x80);
        assert_eq!(0x0c, cart.mmc1.control);
        assert_eq!(0, cart.mmc1.count);
        // 32K mode was selected by the zero control write, the reset forces
        // the last bank back to $C000
        assert_eq!(0x13, cart.read(PRG_HI_BASE, ReadMode::Read));
    }

    #[test]
    fn unsupported_mapper_rejected() {
        let result = Cartridge::new("m4", header(4, 2, 1), prg(2), chr(), None);
        assert!(result.is_err());
    }

    #[test]
    fn horizontal_mirroring_pairs_nametables() {
        let mut cart =
            Cartridge::new("nrom", header(0, 1, 1), prg(1), chr(), None).unwrap();
        cart.reset();
        cart.write(PPU_OFFSET + VRAM_BASE + 0x0001, 0x5a);
        // horizontal: $2400 mirrors $2000
        assert_eq!(
            0x5a,
            cart.read(PPU_OFFSET + VRAM_BASE + 0x0401, ReadMode::Read)
        );
        // $2800 is the other pair
        assert_ne!(
            0x5a,
            cart.read(PPU_OFFSET + VRAM_BASE + 0x0801, ReadMode::Read)
        );
    }
}
