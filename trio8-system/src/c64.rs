// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;
use std::sync::Arc;

use trio8_core::{
    new_shared, new_shared_cell, AddressSpace, Clock, ControlChannel, Cpu, Device, DeviceRef,
    IoPort, Joystick, Keyboard, NibbleRam, Ram, ReadMode, Result, Rom, Shared, SharedCell,
};
use trio8_emu::c64::cartridge::{Cartridge, GameExromMode};
use trio8_emu::c64::{pla, C64Keyboard, Pla};

use crate::config::RomSpec;

// Design:
//   C64 represents the machine and the connections between its parts. The
//   PLA owns the address space mappings; the zero-page device routes the
//   6510 processor port at $00/$01 into the PLA mode bits; the I/O window
//   at $D000 multiplexes color RAM, the keyboard port and the cartridge
//   registers. Chip emulation (VIC/SID/CIA) and the CPU core itself are
//   external collaborators.

const PAL_FREQUENCY: u32 = 985_248;

const RAM_PATTERN: u64 = 0x00ff_00ff_00ff_00ff;

pub struct C64Roms {
    pub basic: RomSpec,
    pub chargen: RomSpec,
    pub kernal: RomSpec,
}

/// Zero page view of system RAM with the 6510 I/O port at $00/$01.
struct ZeroPage {
    ram: DeviceRef,
    port: Rc<IoPort>,
}

impl Device for ZeroPage {
    fn kind(&self) -> &'static str {
        "RAM"
    }

    fn label(&self) -> &str {
        "ram"
    }

    fn size(&self) -> usize {
        0x10000
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        match offset {
            0 => self.port.get_direction(),
            1 => self.port.get_value(),
            _ => self.ram.borrow_mut().read(offset, mode),
        }
    }

    fn write(&mut self, offset: usize, value: u8) {
        match offset {
            0 => self.port.set_direction(value),
            1 => self.port.set_value(value),
            _ => self.ram.borrow_mut().write(offset, value),
        }
    }
}

/// The $D000-$DFFF window: color RAM, the keyboard scan port and the
/// expansion I/O range. VIC and SID registers belong to their chips and
/// read back open.
struct C64Io {
    color_ram: DeviceRef,
    keyboard: Shared<Keyboard>,
    cartridge: Option<Shared<dyn Cartridge>>,
    pla: SharedCell<Option<Rc<Pla>>>,
}

const IO_COLOR_BASE: usize = 0x0800;
const IO_KBD_ROW: usize = 0x0c00;
const IO_KBD_COL: usize = 0x0c01;
const IO_EXP_BASE: usize = 0x0e00;

impl C64Io {
    fn service_cartridge(&self) {
        let request = self
            .cartridge
            .as_ref()
            .map(|cart| cart.borrow_mut().take_remap_request())
            .unwrap_or(false);
        if request {
            if let Some(cart) = self.cartridge.as_ref() {
                let mode = cart.borrow().mode();
                if let Some(pla) = self.pla.take() {
                    pla.set_mode(mode_pins(mode), pla::GAME | pla::EXROM, true);
                    self.pla.set(Some(pla));
                }
            }
        }
    }
}

fn mode_pins(mode: GameExromMode) -> u8 {
    (if mode.game() { pla::GAME } else { 0 }) | (if mode.exrom() { pla::EXROM } else { 0 })
}

impl Device for C64Io {
    fn kind(&self) -> &'static str {
        "IO"
    }

    fn size(&self) -> usize {
        0x1000
    }

    fn read(&mut self, offset: usize, mode: ReadMode) -> u8 {
        let value = match offset {
            IO_COLOR_BASE..=0x0bff => {
                self.color_ram.borrow_mut().read(offset - IO_COLOR_BASE, mode)
            }
            IO_KBD_COL => self.keyboard.borrow().read(),
            IO_EXP_BASE..=0x0fff => match self.cartridge {
                Some(ref cart) => cart.borrow_mut().read(offset - IO_EXP_BASE, mode),
                None => 0xff,
            },
            _ => 0xff,
        };
        if mode == ReadMode::Read {
            self.service_cartridge();
        }
        value
    }

    fn write(&mut self, offset: usize, value: u8) {
        match offset {
            IO_COLOR_BASE..=0x0bff => {
                self.color_ram.borrow_mut().write(offset - IO_COLOR_BASE, value)
            }
            IO_KBD_ROW => self.keyboard.borrow_mut().set_row(value),
            IO_EXP_BASE..=0x0fff => {
                if let Some(ref cart) = self.cartridge {
                    cart.borrow_mut().write(offset - IO_EXP_BASE, value);
                }
            }
            _ => {}
        }
        self.service_cartridge();
    }
}

pub struct C64 {
    aspace: Rc<AddressSpace>,
    pla: Rc<Pla>,
    ram: Shared<Ram>,
    color_ram: Shared<NibbleRam>,
    cpu_port: Rc<IoPort>,
    io: Shared<C64Io>,
    cartridge: Option<Shared<dyn Cartridge>>,
    keyboard: Shared<Keyboard>,
    joystick_1: Shared<Joystick>,
    joystick_2: Shared<Joystick>,
    cpu: Option<Box<dyn Cpu>>,
    clock: Rc<Clock>,
}

impl C64 {
    pub fn build(roms: &C64Roms, control: Arc<ControlChannel>) -> Result<C64> {
        let basic = load_rom("basic", &roms.basic, 0x2000)?;
        let chargen = load_rom("chargen", &roms.chargen, 0x1000)?;
        let kernal = load_rom("kernal", &roms.kernal, 0x2000)?;
        Ok(Self::build_with_roms(basic, chargen, kernal, control))
    }

    /// Build from ROM images already in memory (tests, embedders).
    pub fn build_with_roms(
        basic: Rom,
        chargen: Rom,
        kernal: Rom,
        control: Arc<ControlChannel>,
    ) -> C64 {
        info!(target: "c64", "Initializing system");
        let aspace = Rc::new(AddressSpace::new(16, 0x1000, 0xffff));
        let ram = new_shared(Ram::new_with_pattern("ram", 0x10000, RAM_PATTERN, true));
        let color_ram = new_shared(NibbleRam::new("color-ram", 0x0400));
        let cpu_port = Rc::new(IoPort::new(0x2f, 0xff));
        let keyboard: Shared<Keyboard> = new_shared(Keyboard::new(Box::new(C64Keyboard::new())));
        let joystick_1 = new_shared(Joystick::new());
        let joystick_2 = new_shared(Joystick::new());

        let zero_page: DeviceRef = new_shared(ZeroPage {
            ram: ram.clone(),
            port: cpu_port.clone(),
        });
        let io = new_shared(C64Io {
            color_ram: color_ram.clone(),
            keyboard: keyboard.clone(),
            cartridge: None,
            pla: new_shared_cell(None),
        });

        let basic: DeviceRef = new_shared(basic);
        let kernal: DeviceRef = new_shared(kernal);
        let chargen: DeviceRef = new_shared(chargen);
        let io_dev: DeviceRef = io.clone();
        let pla = Rc::new(Pla::new(aspace.clone(), zero_page, basic, kernal, chargen, io_dev));
        io.borrow().pla.set(Some(pla.clone()));

        // processor port bits 0..2 drive LORAM/HIRAM/CHAREN
        let pla_for_port = pla.clone();
        cpu_port.set_observer(Some(Box::new(move |value| {
            pla_for_port.set_mode(value, pla::LORAM | pla::HIRAM | pla::CHAREN, false);
        })));

        let machine = C64 {
            aspace,
            pla,
            ram,
            color_ram,
            cpu_port,
            io,
            cartridge: None,
            keyboard,
            joystick_1,
            joystick_2,
            cpu: None,
            clock: Rc::new(Clock::new(PAL_FREQUENCY, control)),
        };
        machine.reset();
        machine
    }

    pub fn reset(&self) {
        info!(target: "c64", "Resetting system");
        self.clock.reset();
        self.pla.reset();
        self.cpu_port.set_direction(0x2f);
        self.cpu_port.set_value(0x37);
        if let Some(ref cart) = self.cartridge {
            let mode = cart.borrow().mode();
            self.pla
                .set_mode(mode_pins(mode), pla::GAME | pla::EXROM, true);
        }
        self.keyboard.borrow_mut().reset();
        self.joystick_1.borrow().reset();
        self.joystick_2.borrow().reset();
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

    pub fn joystick_1(&self) -> Shared<Joystick> {
        self.joystick_1.clone()
    }

    pub fn joystick_2(&self) -> Shared<Joystick> {
        self.joystick_2.clone()
    }

    pub fn ram(&self) -> Shared<Ram> {
        self.ram.clone()
    }

    pub fn color_ram(&self) -> Shared<NibbleRam> {
        self.color_ram.clone()
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

    /// Attach a cartridge: validate it, wire its mapping callback into the
    /// PLA and propagate its GAME/EXROM lines.
    pub fn attach_cartridge(&mut self, cartridge: Shared<dyn Cartridge>) -> Result<()> {
        cartridge.borrow_mut().reset_cart()?;
        info!(target: "c64", "Attached cartridge {}, {} bytes",
            cartridge.borrow().name(), cartridge.borrow().cart_size());
        self.io.borrow_mut().cartridge = Some(cartridge.clone());
        let cart_for_map = cartridge.clone();
        self.pla.set_extmap(Some(Box::new(move |addr, romh, roml| {
            cart_for_map.borrow_mut().get_device(addr, romh, roml)
        })));
        let mode = cartridge.borrow().mode();
        self.cartridge = Some(cartridge);
        self.pla
            .set_mode(mode_pins(mode), pla::GAME | pla::EXROM, true);
        Ok(())
    }

    pub fn detach_cartridge(&mut self) {
        self.cartridge = None;
        self.io.borrow_mut().cartridge = None;
        self.pla.set_extmap(None);
        self.pla
            .set_mode(pla::GAME | pla::EXROM, pla::GAME | pla::EXROM, true);
    }
}

fn load_rom(label: &str, spec: &RomSpec, size: usize) -> Result<Rom> {
    match spec.digest {
        Some(ref digest) => Rom::new_with_digest(label, &spec.path, digest),
        None => Rom::new_with_size(label, &spec.path, size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::keyboard::Key;
    use trio8_emu::c64::cartridge::from_crt;
    use trio8_emu::c64::{Chip, ChipType, Crt, CrtHeader, HwType};

    fn setup() -> C64 {
        let basic = Rom::new_with_data("basic", &[0x94; 0x2000]);
        let chargen = Rom::new_with_data("chargen", &[0x3c; 0x1000]);
        let kernal = Rom::new_with_data("kernal", &[0x85; 0x2000]);
        C64::build_with_roms(basic, chargen, kernal, ControlChannel::new())
    }

    fn cart_8k(marker: u8) -> Shared<dyn Cartridge> {
        let mut data = vec![0x00; 0x2000];
        data[0] = marker;
        let crt = Crt {
            header: CrtHeader {
                version: 0x0100,
                hw_type: HwType::Generic,
                exrom: false,
                game: true,
                name: "TEST".to_string(),
            },
            chips: vec![Chip {
                chip_type: ChipType::Rom,
                bank: 0,
                load_addr: 0x8000,
                data,
            }],
        };
        from_crt(crt).unwrap()
    }

    fn easy_flash(banks: u16) -> Shared<dyn Cartridge> {
        let mut chips = Vec::new();
        for bank in 0..banks {
            for load_addr in [0x8000u16, 0xe000].iter() {
                let mut data = vec![0x00; 0x2000];
                data[0] = bank as u8;
                data[1] = if *load_addr == 0x8000 { 0x4c } else { 0x4d };
                chips.push(Chip {
                    chip_type: ChipType::Flash,
                    bank,
                    load_addr: *load_addr,
                    data,
                });
            }
        }
        from_crt(Crt {
            header: CrtHeader {
                version: 0x0100,
                hw_type: HwType::EasyFlash,
                exrom: true,
                game: false,
                name: "EF".to_string(),
            },
            chips,
        })
        .unwrap()
    }

    #[test]
    fn default_memory_map() {
        let c64 = setup();
        assert_eq!(0x94, c64.read(0xa000));
        assert_eq!(0x85, c64.read(0xe000));
        c64.write(0x0400, 0x41);
        assert_eq!(0x41, c64.read(0x0400));
    }

    #[test]
    fn processor_port_switches_banks() {
        let c64 = setup();
        // all RAM
        c64.write(0xa123, 0x11);
        c64.write(0x0001, 0x30);
        assert_eq!(0x11, c64.read(0xa123));
        // LORAM|HIRAM|CHAREN restores BASIC
        c64.write(0x0001, 0x37);
        assert_eq!(0x94, c64.read(0xa000));
    }

    #[test]
    fn chargen_visible_without_charen() {
        let c64 = setup();
        c64.write(0x0001, 0x33);
        assert_eq!(0x3c, c64.read(0xd000));
    }

    #[test]
    fn color_ram_in_io_window() {
        let c64 = setup();
        c64.write(0xd800, 0x07);
        assert_eq!(0xf7, c64.read(0xd800));
    }

    #[test]
    fn generic_cartridge_boot() {
        let mut c64 = setup();
        c64.attach_cartridge(cart_8k(0x42)).unwrap();
        c64.reset();
        assert_eq!(0x42, c64.read(0x8000));
        // BASIC still mapped in 8K mode
        c64.write(0x0001, 0x37);
        assert_eq!(0x94, c64.read(0xa000));
        c64.detach_cartridge();
        c64.write(0x8000, 0x55);
        assert_eq!(0x55, c64.read(0x8000));
    }

    #[test]
    fn easy_flash_ultimax_remap() {
        let mut c64 = setup();
        c64.attach_cartridge(easy_flash(8)).unwrap();
        c64.reset();
        // LED on, MXG = 101: Ultimax
        c64.write(0xde02, 0x85);
        c64.write(0xde00, 0x03);
        assert_eq!(0x03, c64.read(0x8000));
        assert_eq!(0x4c, c64.read(0x8001));
        assert_eq!(0x03, c64.read(0xe000));
        assert_eq!(0x4d, c64.read(0xe001));
        // 8K mode: bank register still selects the ROML bank
        c64.write(0xde02, 0x06);
        c64.write(0xde00, 0x05);
        assert_eq!(0x05, c64.read(0x8000));
        assert_eq!(0x85, c64.read(0xe000));
    }

    #[test]
    fn keyboard_scan_through_io_port() {
        let c64 = setup();
        c64.keyboard().borrow_mut().key_pressed(Key::A);
        // A is row 1, column 2
        c64.write(0xdc00, !0x02);
        assert_eq!(!0x04u8, c64.read(0xdc01));
        c64.keyboard().borrow_mut().key_released(Key::A);
        assert_eq!(0xff, c64.read(0xdc01));
    }

    #[test]
    fn open_bus_in_io_window() {
        let c64 = setup();
        // VIC register area is owned by the (external) chip
        assert_eq!(0xff, c64.read(0xd020));
    }
}
