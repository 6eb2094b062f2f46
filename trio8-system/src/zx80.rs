// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use trio8_core::{
    new_shared, new_shared_cell, AddressSpace, Clock, ControlChannel, Cpu, DevMap, Device,
    DeviceRef, Keyboard, Ram, ReadMode, Result, Rom, Shared, SharedCell,
};
use trio8_emu::zx::{Cassette, CassetteO, CassetteP, ZxKeyboard};

use crate::config::RomSpec;

// Design:
//   The ZX-80/81 bus decodes very little: the ROM mirrors below $4000, RAM
//   mirrors above it, and everything else happens on I/O port $FE and on
//   the refresh cycles the video logic snoops. The A6 line of the address
//   bus drives /INT; the machine derives it from the address-bus hook of
//   the address space and latches it for the CPU collaborator.

const FREQUENCY: u32 = 3_250_000;

const BLOCKS: usize = 16;
const BLOCK_SIZE: usize = 0x1000;

/// ROM generation, which also selects the cassette format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Zx80Model {
    /// 4K ROM, `.o` cassette files.
    Rom4k,
    /// 8K ROM, `.p` cassette files.
    Rom8k,
}

/// View of a device mirrored into a larger window.
struct Mirrored {
    device: DeviceRef,
    mask: usize,
}

impl Device for Mirrored {
    fn kind(&self) -> &'static str {
        "MIRROR"
    }

    // the view repeats across the whole bus window
    fn size(&self) -> usize {
        0x10000
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        self.device.borrow_mut().read(offset & self.mask, mode)
    }

    fn write(&mut self, offset: usize, value: u8) {
        self.device.borrow_mut().write(offset & self.mask, value)
    }
}

pub struct Zx80 {
    aspace: Rc<AddressSpace>,
    ram: Shared<Ram>,
    model: Zx80Model,
    keyboard: Shared<Keyboard>,
    cassette: Option<Cassette>,
    int_line: SharedCell<bool>,
    cpu: Option<Box<dyn Cpu>>,
    clock: Rc<Clock>,
}

impl Zx80 {
    pub fn build(
        model: Zx80Model,
        rom: &RomSpec,
        ram_size: usize,
        control: Arc<ControlChannel>,
    ) -> Result<Zx80> {
        let rom_size = match model {
            Zx80Model::Rom4k => 0x1000,
            Zx80Model::Rom8k => 0x2000,
        };
        let rom = match rom.digest {
            Some(ref digest) => Rom::new_with_digest("rom", &rom.path, digest)?,
            None => Rom::new_with_size("rom", &rom.path, rom_size)?,
        };
        Ok(Self::build_with_rom(model, rom, ram_size, control))
    }

    pub fn build_with_rom(
        model: Zx80Model,
        rom: Rom,
        ram_size: usize,
        control: Arc<ControlChannel>,
    ) -> Zx80 {
        info!(target: "zx80", "Initializing system, {:?}, {}K RAM", model, ram_size / 1024);
        assert!(ram_size == 0x0400 || ram_size == 0x4000);
        let aspace = Rc::new(AddressSpace::new(BLOCKS, BLOCK_SIZE, 0xffff));
        let ram = new_shared(Ram::new("ram", ram_size));
        let rom_size = rom.size();
        let rom: DeviceRef = new_shared(rom);
        let rom_mirror: DeviceRef = new_shared(Mirrored {
            device: rom,
            mask: rom_size - 1,
        });
        let ram_mirror: DeviceRef = new_shared(Mirrored {
            device: ram.clone(),
            mask: ram_size - 1,
        });

        let mut map = Vec::with_capacity(BLOCKS);
        for block in 0..BLOCKS {
            let base = (block * BLOCK_SIZE) & 0x3fff;
            if block < 4 {
                map.push(DevMap::new(rom_mirror.clone(), base & (rom_size - 1)));
            } else {
                map.push(DevMap::new(ram_mirror.clone(), base & (ram_size - 1)));
            }
        }
        aspace.remap(map.clone(), map, 0xffff);

        let int_line = new_shared_cell(false);
        let int_for_hook = int_line.clone();
        aspace.set_bus_hook(Some(Box::new(move |addr| {
            // A6 is wired to the CPU /INT pin
            int_for_hook.set(addr & 0x0040 == 0);
        })));

        Zx80 {
            aspace,
            ram,
            model,
            keyboard: new_shared(Keyboard::new(Box::new(ZxKeyboard::new()))),
            cassette: None,
            int_line,
            cpu: None,
            clock: Rc::new(Clock::new(FREQUENCY, control)),
        }
    }

    /// Mount the cassette directory; the backend format follows the ROM
    /// generation.
    pub fn attach_cassette_dir(&mut self, dir: &Path) -> Result<()> {
        let backend: Box<dyn trio8_emu::zx::CassetteBackend> = match self.model {
            Zx80Model::Rom4k => Box::new(CassetteO::new(dir)?),
            Zx80Model::Rom8k => Box::new(CassetteP::new(dir)?),
        };
        self.cassette = Some(Cassette::new(self.clock.clone(), backend));
        Ok(())
    }

    pub fn reset(&mut self) {
        info!(target: "zx80", "Resetting system");
        self.clock.reset();
        self.int_line.set(false);
        self.keyboard.borrow_mut().reset();
        if let Some(ref mut cassette) = self.cassette {
            cassette.restart();
        }
    }

    /// I/O read on the ZX bus: any even port scans the keyboard half-row
    /// selected by the high address byte; bit 7 carries the cassette input.
    pub fn io_read(&mut self, port: u16) -> u8 {
        if port & 1 != 0 {
            return 0xff;
        }
        let rows = (port >> 8) as u8;
        let mut value = self.keyboard.borrow().scan(rows) & 0x7f;
        if let Some(ref mut cassette) = self.cassette {
            if cassette.read() {
                value |= 0x80;
            }
        }
        value
    }

    /// I/O write: the cassette MIC line follows the written level.
    pub fn io_write(&mut self, _port: u16, value: u8) {
        if let Some(ref mut cassette) = self.cassette {
            cassette.write(value & 0x80 != 0);
        }
    }

    pub fn model(&self) -> Zx80Model {
        self.model
    }

    pub fn aspace(&self) -> Rc<AddressSpace> {
        self.aspace.clone()
    }

    pub fn clock(&self) -> Rc<Clock> {
        self.clock.clone()
    }

    pub fn keyboard(&self) -> Shared<Keyboard> {
        self.keyboard.clone()
    }

    pub fn ram(&self) -> Shared<Ram> {
        self.ram.clone()
    }

    /// Latched /INT state derived from A6.
    pub fn int_line(&self) -> SharedCell<bool> {
        self.int_line.clone()
    }

    pub fn cassette_mut(&mut self) -> Option<&mut Cassette> {
        self.cassette.as_mut()
    }

    pub fn set_cpu(&mut self, cpu: Box<dyn Cpu>) {
        self.cpu = Some(cpu);
    }

    pub fn take_cpu(&mut self) -> Option<Box<dyn Cpu>> {
        self.cpu.take()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.aspace.read(addr, ReadMode::Read)
    }

    pub fn write(&self, addr: u16, value: u8) {
        self.aspace.write(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::keyboard::Key;

    fn setup(ram_size: usize) -> Zx80 {
        let mut rom = vec![0x00u8; 0x2000];
        rom[0] = 0xd3;
        rom[0x1fff] = 0x76;
        Zx80::build_with_rom(
            Zx80Model::Rom8k,
            Rom::new_with_data("rom", &rom),
            ram_size,
            ControlChannel::new(),
        )
    }

    #[test]
    fn rom_mirrors_below_4000() {
        let zx = setup(0x4000);
        assert_eq!(0xd3, zx.read(0x0000));
        assert_eq!(0xd3, zx.read(0x2000));
        assert_eq!(0x76, zx.read(0x3fff));
    }

    #[test]
    fn ram_mirrors_above_8000() {
        let zx = setup(0x4000);
        zx.write(0x4123, 0x42);
        assert_eq!(0x42, zx.read(0x8123));
        assert_eq!(0x42, zx.read(0xc123));
    }

    #[test]
    fn small_ram_wraps_in_block() {
        let zx = setup(0x0400);
        zx.write(0x4000, 0x11);
        assert_eq!(0x11, zx.read(0x4400));
        assert_eq!(0x11, zx.read(0x7c00));
    }

    #[test]
    fn int_follows_a6() {
        let zx = setup(0x4000);
        zx.aspace().address_bus(0x0040);
        assert!(!zx.int_line().get());
        zx.aspace().address_bus(0x0000);
        assert!(zx.int_line().get());
    }

    #[test]
    fn keyboard_on_port_fe() {
        let mut zx = setup(0x4000);
        zx.keyboard().borrow_mut().key_pressed(Key::Q);
        // Q is half-row A10 (row 2), column D0
        assert_eq!(0x7e, zx.io_read(0xfbfe));
        zx.keyboard().borrow_mut().key_released(Key::Q);
        assert_eq!(0x7f, zx.io_read(0xfbfe));
    }
}
