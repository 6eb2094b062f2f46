// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};
use std::io;
use std::io::Write;

use crate::device::{DeviceRef, ReadMode};

// Design:
//   The logical address space is subdivided into fixed-size blocks, each
//   mapped to a backing device plus a base offset. Bank switchers (PLA,
//   cartridge mappers) swap entire map tables in one remap call. Map slots
//   may be unmapped; reads from unmapped slots return the latched data-bus
//   byte (open bus).
//
//   Interior mutability keeps bus traffic re-entrant: a device write may
//   trigger a remap of the very address space that dispatched it, so map
//   table borrows are released before device dispatch.

/// One address-space slot: backing device and base offset within it.
/// An empty slot models an unmapped (open bus) region.
#[derive(Clone)]
pub struct DevMap {
    pub device: Option<DeviceRef>,
    pub base: usize,
}

impl DevMap {
    pub fn new(device: DeviceRef, base: usize) -> Self {
        Self {
            device: Some(device),
            base,
        }
    }

    pub fn none() -> Self {
        Self {
            device: None,
            base: 0,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.device.is_some()
    }
}

pub type WriteObserver = Box<dyn FnMut(u16, u8)>;
pub type BusHook = Box<dyn FnMut(u16)>;

pub struct AddressSpace {
    read_map: RefCell<Vec<DevMap>>,
    write_map: RefCell<Vec<DevMap>>,
    mask: Cell<u16>,
    block_shift: u32,
    block_mask: usize,
    data_bus: Cell<u8>,
    addr_bus: Cell<u16>,
    write_observer: RefCell<Option<WriteObserver>>,
    bus_hook: RefCell<Option<BusHook>>,
}

impl AddressSpace {
    /// Create an address space of `blocks` slots of `block_size` bytes each.
    /// `blocks * block_size` must equal the decoded address range and
    /// `block_size` must be a power of two.
    pub fn new(blocks: usize, block_size: usize, mask: u16) -> Self {
        assert!(block_size.is_power_of_two());
        assert_eq!(blocks * block_size, mask as usize + 1);
        Self {
            read_map: RefCell::new(vec![DevMap::none(); blocks]),
            write_map: RefCell::new(vec![DevMap::none(); blocks]),
            mask: Cell::new(mask),
            block_shift: block_size.trailing_zeros(),
            block_mask: block_size - 1,
            data_bus: Cell::new(0),
            addr_bus: Cell::new(0),
            write_observer: RefCell::new(None),
            bus_hook: RefCell::new(None),
        }
    }

    pub fn blocks(&self) -> usize {
        self.read_map.borrow().len()
    }

    pub fn block_size(&self) -> usize {
        self.block_mask + 1
    }

    /// Last byte seen on the data bus.
    pub fn data_bus(&self) -> u8 {
        self.data_bus.get()
    }

    /// Last address seen on the address bus.
    pub fn addr_bus(&self) -> u16 {
        self.addr_bus.get()
    }

    /// Called by higher layers when the bus address changes without a
    /// read or write (refresh cycles, /INT derivation on the ZX-80).
    pub fn address_bus(&self, addr: u16) {
        self.addr_bus.set(addr & self.mask.get());
        let mut hook = self.bus_hook.borrow_mut();
        if let Some(ref mut hook) = *hook {
            hook(addr & self.mask.get());
        }
    }

    pub fn set_bus_hook(&self, hook: Option<BusHook>) {
        *self.bus_hook.borrow_mut() = hook;
    }

    /// Install a write observer invoked after the device write completes.
    /// Used by cartridge mappers that watch writes in windows they do not
    /// own.
    pub fn set_write_observer(&self, observer: Option<WriteObserver>) {
        *self.write_observer.borrow_mut() = observer;
    }

    /// Atomically adopt a new map pair. The caller machine excludes
    /// concurrent bus traffic; within the emulator thread the swap is safe
    /// at any point because in-flight dispatches hold entry clones.
    pub fn remap(&self, read_map: Vec<DevMap>, write_map: Vec<DevMap>, mask: u16) {
        assert_eq!(read_map.len(), self.read_map.borrow().len());
        assert_eq!(write_map.len(), self.write_map.borrow().len());
        *self.read_map.borrow_mut() = read_map;
        *self.write_map.borrow_mut() = write_map;
        self.mask.set(mask);
    }

    pub fn read(&self, addr: u16, mode: ReadMode) -> u8 {
        let addr = addr & self.mask.get();
        let entry = self.read_map.borrow()[addr as usize >> self.block_shift].clone();
        let value = match entry.device {
            Some(device) => {
                let offset = entry.base + (addr as usize & self.block_mask);
                device.borrow_mut().read(offset, mode)
            }
            None => self.data_bus.get(),
        };
        if let ReadMode::Read = mode {
            self.addr_bus.set(addr);
            self.data_bus.set(value);
        }
        value
    }

    pub fn write(&self, addr: u16, value: u8) {
        let addr = addr & self.mask.get();
        self.addr_bus.set(addr);
        self.data_bus.set(value);
        let entry = self.write_map.borrow()[addr as usize >> self.block_shift].clone();
        if let Some(device) = entry.device {
            let offset = entry.base + (addr as usize & self.block_mask);
            device.borrow_mut().write(offset, value);
        }
        let mut observer = self.write_observer.borrow_mut();
        if let Some(ref mut observer) = *observer {
            observer(addr, value);
        }
    }

    /// Dump the current read mappings, one line per block.
    pub fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        let map = self.read_map.borrow();
        let block_size = self.block_size();
        for (i, entry) in map.iter().enumerate() {
            let base = (i * block_size) as u16;
            match entry.device {
                Some(ref device) => {
                    let device = device.borrow();
                    writeln!(
                        out,
                        "{:04x}-{:04x}  {:<10} {:<16} offset {:04x}",
                        base,
                        base.wrapping_add((block_size - 1) as u16),
                        device.kind(),
                        device.label(),
                        entry.base
                    )?;
                }
                None => {
                    writeln!(
                        out,
                        "{:04x}-{:04x}  {:<10}",
                        base,
                        base.wrapping_add((block_size - 1) as u16),
                        "-"
                    )?;
                }
            }
        }
        Ok(())
    }
}
