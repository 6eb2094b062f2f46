// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;

use trio8_core::{Error, Result};

/// Capability set a CPU core exposes to the monitor. The monitor itself is
/// CPU-agnostic: register names, disassembly syntax and the memory map all
/// come through this interface.
pub trait MonitoredCpu {
    /// Register file rendered as a single line.
    fn regs(&mut self) -> String;
    fn pc(&mut self) -> u16;
    fn set_pc(&mut self, addr: u16);
    /// Side-effect free memory read.
    fn peek(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
    /// Disassemble `count` instructions starting at `addr`.
    fn disass(
        &mut self,
        out: &mut dyn Write,
        addr: u16,
        count: usize,
        show_pc: bool,
    ) -> io::Result<()>;
    /// Dump the current memory mappings.
    fn mmap(&mut self, out: &mut dyn Write) -> io::Result<()>;
    /// Break into the monitor before the next instruction.
    fn ebreak(&mut self);
    /// Value of a named register, e.g. "a", "pc" or "p.n".
    fn regvalue(&mut self, name: &str) -> Result<u16>;

    /// Inject the content of a file into memory. Returns start and size.
    fn load(&mut self, path: &Path, start: u16) -> Result<(u16, usize)> {
        let data = fs::read(path).map_err(|err| Error::Io(format!("{}: {}", path.display(), err)))?;
        let mut addr = start;
        for byte in &data {
            self.write(addr, *byte);
            addr = addr.wrapping_add(1);
        }
        Ok((start, data.len()))
    }

    /// Write a memory range (inclusive) into a file.
    fn save(&mut self, path: &Path, start: u16, end: u16) -> Result<()> {
        let mut data = Vec::with_capacity((end as usize) - (start as usize) + 1);
        let mut addr = start;
        loop {
            data.push(self.peek(addr));
            if addr == end {
                break;
            }
            addr = addr.wrapping_add(1);
        }
        fs::write(path, data).map_err(|err| Error::Io(format!("{}: {}", path.display(), err)))
    }

    /// Set or query the log level.
    fn loglevel(&mut self, level: Option<&str>) -> Result<String> {
        if let Some(level) = level {
            let filter = LevelFilter::from_str(level)
                .map_err(|_| Error::InvalidArgument(format!("invalid log level {}", level)))?;
            log::set_max_level(filter);
        }
        Ok(log::max_level().to_string())
    }

    /// Documentation shown by the breakpoint help command.
    fn bpdoc(&mut self, _topic: &str) -> String {
        concat!(
            "breakpoint condition: <val> <op> <val>\n",
            "  <val> = [*]$hex | [*]#dec | [*]register\n",
            "  <op>  = <= | >= | == | != | < | > | & | |\n",
            "examples:\n",
            "  b 1005 a == $aa\n",
            "  b d012 *d011 != #0\n"
        )
        .to_string()
    }
}
