// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;
use std::io::Write;

use crate::clock::Clock;
use crate::util::Shared;

/// Access mode seen by a device. `Peek` must be side-effect free; it is used
/// by the monitor and by state dumps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReadMode {
    Read,
    Peek,
}

/// Device represents an addressable byte-oriented component. Offsets are
/// relative to the device; `offset < size()` is a precondition and a
/// violation is a caller bug that aborts the process.
pub trait Device {
    /// Short device class name, e.g. "RAM".
    fn kind(&self) -> &'static str;
    /// Label assigned at construction, used in mapping dumps.
    fn label(&self) -> &str {
        ""
    }
    /// Addressable size of this device in bytes.
    fn size(&self) -> usize;
    /// Read a byte from the specified offset.
    fn read(&mut self, offset: usize, mode: ReadMode) -> u8;
    /// Write a byte to the specified offset.
    fn write(&mut self, offset: usize, value: u8);
    /// Handle reset signal. Most memories survive reset untouched.
    fn reset(&mut self) {}

    /// Hex dump of the device contents, addresses biased by `base`.
    fn dump(&mut self, out: &mut dyn Write, base: u16) -> io::Result<()> {
        let size = self.size();
        let mut offset = 0;
        while offset < size {
            let row = usize::min(16, size - offset);
            write!(out, "{:04x}: ", base.wrapping_add(offset as u16))?;
            for i in 0..row {
                write!(out, "{:02x} ", self.read(offset + i, ReadMode::Peek))?;
            }
            writeln!(out)?;
            offset += row;
        }
        Ok(())
    }
}

pub type DeviceRef = Shared<dyn Device>;

/// CPU cores are external collaborators. The substrate drives them through
/// this interface only: the scheduler calls `step`, the monitor uses the
/// register and disassembly accessors.
pub trait Cpu {
    /// Decode and execute one instruction, returning the number of clock
    /// cycles consumed. Returning 0 requests termination.
    fn step(&mut self, clock: &Clock) -> u64;
    /// Handle reset signal.
    fn reset(&mut self);
    fn pc(&self) -> u16;
    fn set_pc(&mut self, value: u16);
    /// Register file rendered for the monitor.
    fn regs(&self) -> String;
    /// Value of a named register ("a", "pc", "p.n", ...), if it exists.
    fn regvalue(&self, name: &str) -> Option<u16>;
    /// Request a monitor break before the next instruction.
    fn ebreak(&mut self);
    /// Read a byte through the CPU's bus connection.
    fn read(&mut self, address: u16) -> u8;
    /// Side-effect free read.
    fn peek(&mut self, address: u16) -> u8;
    /// Write a byte through the CPU's bus connection.
    fn write(&mut self, address: u16, value: u8);
    /// Disassemble `count` instructions starting at `addr`.
    fn disass(
        &mut self,
        out: &mut dyn Write,
        addr: u16,
        count: usize,
        show_pc: bool,
    ) -> io::Result<u16>;
}
