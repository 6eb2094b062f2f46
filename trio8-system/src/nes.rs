// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;
use std::sync::Arc;

use trio8_core::{
    new_shared, AddressSpace, Clock, ControlChannel, Cpu, DevMap, Device, Joystick, Ram, ReadMode,
    Result, Shared,
};
use trio8_emu::nes::{Cartridge, PPU_OFFSET};

// Design:
//   Two address spaces share the cartridge device: the CPU bus decodes 32
//   blocks of 2K (internal RAM mirrored four times, the cartridge from
//   $4000 up), the PPU bus decodes 8 blocks of 2K (pattern tables and the
//   mirrored nametables, both inside the cartridge). PPU registers and the
//   APU belong to their chips and stay unmapped here.

const NTSC_FREQUENCY: u32 = 1_789_773;

const CPU_BLOCKS: usize = 32;
const PPU_BLOCKS: usize = 8;
const BLOCK_SIZE: usize = 0x0800;

pub struct Nes {
    cpu_aspace: Rc<AddressSpace>,
    ppu_aspace: Rc<AddressSpace>,
    ram: Shared<Ram>,
    cartridge: Option<Shared<Cartridge>>,
    joystick_1: Shared<Joystick>,
    joystick_2: Shared<Joystick>,
    cpu: Option<Box<dyn Cpu>>,
    clock: Rc<Clock>,
}

impl Nes {
    pub fn build(control: Arc<ControlChannel>) -> Nes {
        info!(target: "nes", "Initializing system");
        let cpu_aspace = Rc::new(AddressSpace::new(CPU_BLOCKS, BLOCK_SIZE, 0xffff));
        let ppu_aspace = Rc::new(AddressSpace::new(PPU_BLOCKS, BLOCK_SIZE, 0x3fff));
        let ram = new_shared(Ram::new("ram", BLOCK_SIZE));

        let machine = Nes {
            cpu_aspace,
            ppu_aspace,
            ram,
            cartridge: None,
            joystick_1: new_shared(Joystick::new()),
            joystick_2: new_shared(Joystick::new()),
            cpu: None,
            clock: Rc::new(Clock::new(NTSC_FREQUENCY, control)),
        };
        machine.remap();
        machine
    }

    fn remap(&self) {
        let mut cpu_map = vec![DevMap::none(); CPU_BLOCKS];
        // internal 2K RAM mirrored through $0000-$1FFF
        for block in cpu_map.iter_mut().take(4) {
            *block = DevMap::new(self.ram.clone(), 0);
        }
        let mut ppu_map = vec![DevMap::none(); PPU_BLOCKS];
        if let Some(ref cart) = self.cartridge {
            // cartridge window: CPU $4000-$FFFF
            for (i, block) in cpu_map.iter_mut().enumerate().skip(8) {
                *block = DevMap::new(cart.clone(), (i - 8) * BLOCK_SIZE);
            }
            // pattern tables and nametables; $3000-$3FFF mirrors $2000
            for (i, block) in ppu_map.iter_mut().enumerate() {
                let mirror = if i < 6 { i } else { i - 2 };
                *block = DevMap::new(cart.clone(), PPU_OFFSET + mirror * BLOCK_SIZE);
            }
        }
        self.cpu_aspace.remap(cpu_map.clone(), cpu_map, 0xffff);
        self.ppu_aspace.remap(ppu_map.clone(), ppu_map, 0x3fff);
    }

    pub fn attach_cartridge(&mut self, cartridge: Cartridge) -> Result<()> {
        info!(target: "nes", "Attached cartridge {}", cartridge.name());
        self.cartridge = Some(new_shared(cartridge));
        self.remap();
        self.reset();
        Ok(())
    }

    pub fn detach_cartridge(&mut self) {
        self.cartridge = None;
        self.remap();
    }

    pub fn reset(&self) {
        info!(target: "nes", "Resetting system");
        self.clock.reset();
        if let Some(ref cart) = self.cartridge {
            cart.borrow_mut().reset();
        }
        self.joystick_1.borrow().reset();
        self.joystick_2.borrow().reset();
    }

    pub fn cpu_aspace(&self) -> Rc<AddressSpace> {
        self.cpu_aspace.clone()
    }

    pub fn ppu_aspace(&self) -> Rc<AddressSpace> {
        self.ppu_aspace.clone()
    }

    pub fn clock(&self) -> Rc<Clock> {
        self.clock.clone()
    }

    pub fn joystick_1(&self) -> Shared<Joystick> {
        self.joystick_1.clone()
    }

    pub fn joystick_2(&self) -> Shared<Joystick> {
        self.joystick_2.clone()
    }

    pub fn cartridge(&self) -> Option<Shared<Cartridge>> {
        self.cartridge.clone()
    }

    pub fn set_cpu(&mut self, cpu: Box<dyn Cpu>) {
        self.cpu = Some(cpu);
    }

    pub fn take_cpu(&mut self) -> Option<Box<dyn Cpu>> {
        self.cpu.take()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.cpu_aspace.read(addr, ReadMode::Read)
    }

    pub fn write(&self, addr: u16, value: u8) {
        self.cpu_aspace.write(addr, value)
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.ppu_aspace.read(addr, ReadMode::Read)
    }

    pub fn ppu_write(&self, addr: u16, value: u8) {
        self.ppu_aspace.write(addr, value)
    }
}

impl Default for Nes {
    fn default() -> Self {
        Self::build(ControlChannel::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_emu::nes::InesHeader;

    fn header(mapper: u8, prg_blocks: u8, chr_blocks: u8) -> InesHeader {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(b"NES\x1a");
        bytes[4] = prg_blocks;
        bytes[5] = chr_blocks;
        bytes[6] = mapper << 4;
        InesHeader::from_bytes(&bytes).unwrap()
    }

    fn nrom(prg_blocks: usize) -> Cartridge {
        let mut prg = vec![0u8; prg_blocks * 16384];
        prg[0] = 0xa9;
        if prg_blocks > 1 {
            prg[16384] = 0xaa;
        }
        let mut chr = vec![0u8; 8192];
        chr[0] = 0xc0;
        Cartridge::new("smb", header(0, prg_blocks as u8, 1), prg, chr, None).unwrap()
    }

    #[test]
    fn internal_ram_mirrors() {
        let nes = Nes::default();
        nes.write(0x0000, 0x12);
        assert_eq!(0x12, nes.read(0x0800));
        assert_eq!(0x12, nes.read(0x1800));
    }

    #[test]
    fn nrom_16k_end_to_end() {
        let mut nes = Nes::default();
        nes.attach_cartridge(nrom(1)).unwrap();
        assert_eq!(0xa9, nes.read(0x8000));
        // 16K image mirrored at $C000
        assert_eq!(0xa9, nes.read(0xc000));
        assert_eq!(0xc0, nes.ppu_read(0x0000));
    }

    #[test]
    fn nrom_32k_end_to_end() {
        let mut nes = Nes::default();
        nes.attach_cartridge(nrom(2)).unwrap();
        assert_eq!(0xa9, nes.read(0x8000));
        assert_eq!(0xaa, nes.read(0xc000));
    }

    #[test]
    fn nametable_mirror_on_ppu_bus() {
        let mut nes = Nes::default();
        nes.attach_cartridge(nrom(1)).unwrap();
        nes.ppu_write(0x2002, 0x66);
        assert_eq!(0x66, nes.ppu_read(0x3002));
    }

    #[test]
    fn uxrom_bank_switch_via_bus_write() {
        let mut nes = Nes::default();
        let mut prg = vec![0u8; 4 * 16384];
        for bank in 0..4 {
            prg[bank * 16384] = 0x20 + bank as u8;
        }
        let cart = Cartridge::new("uxrom", header(2, 4, 0), prg, Vec::new(), None).unwrap();
        nes.attach_cartridge(cart).unwrap();
        nes.write(0x8000, 2);
        assert_eq!(0x22, nes.read(0x8000));
        assert_eq!(0x23, nes.read(0xc000));
    }
}
