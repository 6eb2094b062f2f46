// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trio8_core::{AddressSpace, DevMap, DeviceRef};

// SPEC: https://www.c64-wiki.com/wiki/Bank_Switching
//
// Design:
//   The 64K address space is subdivided into 16 4K blocks; the PLA input
//   pins LORAM/HIRAM/CHAREN/GAME/EXROM form a 5-bit mode selecting one of
//   32 precomputed read/write map pairs. After the template is applied the
//   attached cartridge is asked, per block, whether it drives ROML/ROMH for
//   that block; a mapped reply overrides the template slot. The ROML/ROMH
//   line equations follow "The C64 PLA Dissected" (Thomas Giesel).

pub const LORAM: u8 = 0x01;
pub const HIRAM: u8 = 0x02;
pub const CHAREN: u8 = 0x04;
pub const GAME: u8 = 0x08;
pub const EXROM: u8 = 0x10;
pub const MODE_MASK: u8 = LORAM | HIRAM | CHAREN | GAME | EXROM;

const A15: u16 = 1 << 15;
const A14: u16 = 1 << 14;
const A13: u16 = 1 << 13;

const BLOCKS: usize = 16;
const MODES: usize = 32;
const ADDR_MASK: u16 = 0xffff;

/// Cartridge hook: asked per 4K block on every remap; returns the read and
/// write devices the cartridge drives for that block, if any.
pub type ExtMap = Box<dyn FnMut(u16, bool, bool) -> (DevMap, DevMap)>;

pub struct Pla {
    aspace: Rc<AddressSpace>,
    read_modes: Vec<Vec<DevMap>>,
    write_modes: Vec<Vec<DevMap>>,
    mode: Cell<u8>,
    extmap: RefCell<Option<ExtMap>>,
}

fn ram_map(ram: &DeviceRef) -> Vec<DevMap> {
    (0..BLOCKS)
        .map(|i| DevMap::new(ram.clone(), i * 0x1000))
        .collect()
}

impl Pla {
    pub fn new(
        aspace: Rc<AddressSpace>,
        ram: DeviceRef,
        basic: DeviceRef,
        kernal: DeviceRef,
        chargen: DeviceRef,
        io: DeviceRef,
    ) -> Self {
        assert_eq!(BLOCKS, aspace.blocks());

        let set_basic = |map: &mut Vec<DevMap>| {
            map[0xa] = DevMap::new(basic.clone(), 0x0000);
            map[0xb] = DevMap::new(basic.clone(), 0x1000);
        };
        let set_kernal = |map: &mut Vec<DevMap>| {
            map[0xe] = DevMap::new(kernal.clone(), 0x0000);
            map[0xf] = DevMap::new(kernal.clone(), 0x1000);
        };
        let set_chargen = |map: &mut Vec<DevMap>| {
            map[0xd] = DevMap::new(chargen.clone(), 0x0000);
        };
        let set_io = |map: &mut Vec<DevMap>| {
            map[0xd] = DevMap::new(io.clone(), 0x0000);
        };
        let clear = |map: &mut Vec<DevMap>, blocks: &[usize]| {
            for block in blocks {
                map[*block] = DevMap::none();
            }
        };

        // all RAM (modes 0, 1, 4, 8, 12, 24, 28)
        let mode_00 = ram_map(&ram);

        // 16K cartridge without I/O
        let mut mode_02 = ram_map(&ram);
        clear(&mut mode_02, &[0xa, 0xb]);
        set_chargen(&mut mode_02);
        set_kernal(&mut mode_02);

        let mut mode_03 = ram_map(&ram);
        clear(&mut mode_03, &[0x8, 0x9, 0xa, 0xb]);
        set_chargen(&mut mode_03);
        set_kernal(&mut mode_03);

        // RAM with I/O visible
        let mut mode_05 = ram_map(&ram);
        set_io(&mut mode_05);

        let mut mode_06 = ram_map(&ram);
        clear(&mut mode_06, &[0xa, 0xb]);
        set_io(&mut mode_06);
        set_kernal(&mut mode_06);

        let mut mode_07 = ram_map(&ram);
        clear(&mut mode_07, &[0x8, 0x9, 0xa, 0xb]);
        set_io(&mut mode_07);
        set_kernal(&mut mode_07);

        let mut mode_09 = ram_map(&ram);
        set_chargen(&mut mode_09);

        let mut mode_10 = ram_map(&ram);
        set_chargen(&mut mode_10);
        set_kernal(&mut mode_10);

        let mut mode_11 = ram_map(&ram);
        clear(&mut mode_11, &[0x8, 0x9]);
        set_basic(&mut mode_11);
        set_chargen(&mut mode_11);
        set_kernal(&mut mode_11);

        let mut mode_14 = ram_map(&ram);
        set_io(&mut mode_14);
        set_kernal(&mut mode_14);

        let mut mode_15 = ram_map(&ram);
        clear(&mut mode_15, &[0x8, 0x9]);
        set_basic(&mut mode_15);
        set_io(&mut mode_15);
        set_kernal(&mut mode_15);

        // Ultimax: only the lowest 8K of RAM and the I/O window decode
        let mut mode_16 = ram_map(&ram);
        clear(
            &mut mode_16,
            &[0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb, 0xc, 0xe, 0xf],
        );
        set_io(&mut mode_16);

        let mut mode_27 = ram_map(&ram);
        set_basic(&mut mode_27);
        set_chargen(&mut mode_27);
        set_kernal(&mut mode_27);

        let mut mode_31 = ram_map(&ram);
        set_basic(&mut mode_31);
        set_io(&mut mode_31);
        set_kernal(&mut mode_31);

        let read_modes: Vec<Vec<DevMap>> = vec![
            mode_00.clone(),
            mode_00.clone(),
            mode_02,
            mode_03,
            mode_00.clone(),
            mode_05.clone(),
            mode_06,
            mode_07,
            mode_00.clone(),
            mode_09.clone(),
            mode_10.clone(),
            mode_11,
            mode_00.clone(),
            mode_05.clone(),
            mode_14.clone(),
            mode_15,
            mode_16.clone(),
            mode_16.clone(),
            mode_16.clone(),
            mode_16.clone(),
            mode_16.clone(),
            mode_16.clone(),
            mode_16.clone(),
            mode_16,
            mode_00.clone(),
            mode_09,
            mode_10,
            mode_27,
            mode_00.clone(),
            mode_05.clone(),
            mode_14,
            mode_31,
        ];

        // In Ultimax writes reach RAM only in the lowest 8K, ROML/ROMH
        // windows stay writable for cartridge RAM.
        let mut wmode_16 = ram_map(&ram);
        clear(&mut wmode_16, &[0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0xa, 0xb, 0xc]);
        set_io(&mut wmode_16);

        let write_modes: Vec<Vec<DevMap>> = (0..MODES)
            .map(|mode| match mode {
                0x05..=0x07 | 0x0d..=0x0f | 0x1d..=0x1f => mode_05.clone(),
                0x10..=0x17 => wmode_16.clone(),
                _ => mode_00.clone(),
            })
            .collect();

        Self {
            aspace,
            read_modes,
            write_modes,
            mode: Cell::new(MODE_MASK),
            extmap: RefCell::new(None),
        }
    }

    pub fn reset(&self) {
        self.mode.set(LORAM | HIRAM | CHAREN | GAME | EXROM);
        self.remap();
    }

    pub fn mode(&self) -> u8 {
        self.mode.get()
    }

    pub fn aspace(&self) -> Rc<AddressSpace> {
        self.aspace.clone()
    }

    /// Set PLA input pins. `mask` selects the pins to change; `force`
    /// rebuilds the mappings even when the mode value is unchanged (used by
    /// cartridges that switch banks without touching GAME/EXROM).
    pub fn set_mode(&self, pins: u8, mask: u8, force: bool) {
        let mask = mask & MODE_MASK;
        let mode = (self.mode.get() & !mask) | (pins & mask);
        if mode != self.mode.get() || force {
            trace!(target: "mem::banks", "Switching to mode {:02x}", mode);
            self.mode.set(mode);
            self.remap();
        }
    }

    /// Install the cartridge mapping callback; pass `None` on detach.
    pub fn set_extmap(&self, extmap: Option<ExtMap>) {
        *self.extmap.borrow_mut() = extmap;
    }

    fn romh(&self, addr: u16) -> bool {
        let mode = self.mode.get();
        ((mode & (HIRAM | EXROM | GAME)) == HIRAM && (addr & (A15 | A14 | A13)) == (A15 | A13))
            || ((mode & (EXROM | GAME)) == EXROM && (addr & (A15 | A14 | A13)) == (A15 | A14 | A13))
    }

    fn roml(&self, addr: u16) -> bool {
        let mode = self.mode.get();
        ((mode & (LORAM | HIRAM | EXROM)) == (LORAM | HIRAM) && (addr & (A15 | A14 | A13)) == A15)
            || ((mode & (EXROM | GAME)) == EXROM && (addr & (A15 | A14 | A13)) == A15)
    }

    fn remap(&self) {
        let mode = self.mode.get() as usize;
        let mut read_map = self.read_modes[mode].clone();
        let mut write_map = self.write_modes[mode].clone();
        let mut extmap = self.extmap.borrow_mut();
        if let Some(ref mut extmap) = *extmap {
            for block in 0..BLOCKS {
                let addr = (block as u16) << 12;
                let romh = self.romh(addr);
                let roml = self.roml(addr);
                if !(romh || roml) {
                    continue;
                }
                let (read_dev, write_dev) = extmap(addr, romh, roml);
                if read_dev.is_mapped() {
                    read_map[block] = read_dev;
                }
                if write_dev.is_mapped() {
                    write_map[block] = write_dev;
                }
            }
        }
        self.aspace.remap(read_map, write_map, ADDR_MASK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::{new_shared, Ram, ReadMode, Rom};

    fn setup() -> (Rc<AddressSpace>, Pla) {
        let aspace = Rc::new(AddressSpace::new(16, 0x1000, 0xffff));
        let ram = new_shared(Ram::new("ram", 0x10000));
        let basic = new_shared(Rom::new_with_data("basic", &[0x10; 0x2000]));
        let kernal = new_shared(Rom::new_with_data("kernal", &[0x12; 0x2000]));
        let chargen = new_shared(Rom::new_with_data("chargen", &[0x11; 0x1000]));
        let io = new_shared(Ram::new("io", 0x1000));
        io.borrow_mut().fill(0x22);
        let pla = Pla::new(aspace.clone(), ram, basic, kernal, chargen, io);
        pla.reset();
        (aspace, pla)
    }

    #[test]
    fn mode_31_maps_basic_io_kernal() {
        let (aspace, _pla) = setup();
        assert_eq!(0x10, aspace.read(0xa000, ReadMode::Read));
        assert_eq!(0x22, aspace.read(0xd000, ReadMode::Read));
        assert_eq!(0x12, aspace.read(0xe000, ReadMode::Read));
    }

    #[test]
    fn mode_27_maps_chargen() {
        let (aspace, pla) = setup();
        pla.set_mode(LORAM | HIRAM | GAME | EXROM, MODE_MASK, false);
        assert_eq!(0x11, aspace.read(0xd000, ReadMode::Read));
    }

    #[test]
    fn ram_only_mode_hides_roms() {
        let (aspace, pla) = setup();
        aspace.write(0xa000, 0x55);
        pla.set_mode(GAME | EXROM, MODE_MASK, false);
        assert_eq!(0x55, aspace.read(0xa000, ReadMode::Read));
    }

    #[test]
    fn rom_writes_fall_through_to_ram() {
        let (aspace, pla) = setup();
        aspace.write(0xe123, 0x77);
        pla.set_mode(GAME | EXROM, MODE_MASK, false);
        assert_eq!(0x77, aspace.read(0xe123, ReadMode::Read));
    }

    #[test]
    fn extmap_overrides_roml_block() {
        let (aspace, pla) = setup();
        let roml = new_shared(Rom::new_with_data("roml", &[0x5a; 0x2000]));
        pla.set_extmap(Some(Box::new(move |addr, _romh, roml_sel| {
            if roml_sel {
                (DevMap::new(roml.clone(), (addr - 0x8000) as usize), DevMap::none())
            } else {
                (DevMap::none(), DevMap::none())
            }
        })));
        // 8K cartridge: GAME high, EXROM low
        pla.set_mode(LORAM | HIRAM | CHAREN | GAME, MODE_MASK, true);
        assert_eq!(0x5a, aspace.read(0x8000, ReadMode::Read));
        assert_eq!(0x5a, aspace.read(0x9fff, ReadMode::Read));
    }
}
