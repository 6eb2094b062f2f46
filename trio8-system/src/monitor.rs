// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;
use std::io::Write;
use std::rc::Rc;

use trio8_core::{AddressSpace, Cpu, ReadMode};
use trio8_debug::MonitoredCpu;

/// Bridges a machine (its CPU core plus address space) to the monitor's
/// capability interface. Register access goes to the CPU, memory access to
/// the bus, the memory map to the address space.
pub struct SystemMonitor {
    cpu: Box<dyn Cpu>,
    aspace: Rc<AddressSpace>,
}

impl SystemMonitor {
    pub fn new(cpu: Box<dyn Cpu>, aspace: Rc<AddressSpace>) -> Self {
        Self { cpu, aspace }
    }

    pub fn into_cpu(self) -> Box<dyn Cpu> {
        self.cpu
    }
}

impl MonitoredCpu for SystemMonitor {
    fn regs(&mut self) -> String {
        self.cpu.regs()
    }

    fn pc(&mut self) -> u16 {
        self.cpu.pc()
    }

    fn set_pc(&mut self, addr: u16) {
        self.cpu.set_pc(addr);
    }

    fn peek(&mut self, addr: u16) -> u8 {
        self.aspace.read(addr, ReadMode::Peek)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.aspace.write(addr, value);
    }

    fn disass(
        &mut self,
        out: &mut dyn Write,
        addr: u16,
        count: usize,
        show_pc: bool,
    ) -> io::Result<()> {
        self.cpu.disass(out, addr, count, show_pc).map(|_| ())
    }

    fn mmap(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.aspace.dump(out)
    }

    fn ebreak(&mut self) {
        self.cpu.ebreak();
    }

    fn regvalue(&mut self, name: &str) -> trio8_core::Result<u16> {
        self.cpu.regvalue(name).ok_or_else(|| {
            trio8_core::Error::InvalidArgument(format!("invalid register {}", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::{new_shared, Clock, DevMap, Ram};
    use trio8_debug::Monitor;

    struct StubCpu {
        pc: u16,
        a: u16,
        aspace: Rc<AddressSpace>,
    }

    impl Cpu for StubCpu {
        fn step(&mut self, _clock: &Clock) -> u64 {
            1
        }
        fn reset(&mut self) {}
        fn pc(&self) -> u16 {
            self.pc
        }
        fn set_pc(&mut self, value: u16) {
            self.pc = value;
        }
        fn regs(&self) -> String {
            format!("A={:04x} PC={:04x}", self.a, self.pc)
        }
        fn regvalue(&self, name: &str) -> Option<u16> {
            match name {
                "a" => Some(self.a),
                "pc" => Some(self.pc),
                _ => None,
            }
        }
        fn ebreak(&mut self) {}
        fn read(&mut self, address: u16) -> u8 {
            self.aspace.read(address, ReadMode::Read)
        }
        fn peek(&mut self, address: u16) -> u8 {
            self.aspace.read(address, ReadMode::Peek)
        }
        fn write(&mut self, address: u16, value: u8) {
            self.aspace.write(address, value)
        }
        fn disass(
            &mut self,
            out: &mut dyn Write,
            addr: u16,
            _count: usize,
            _show_pc: bool,
        ) -> io::Result<u16> {
            writeln!(out, "{:04x}  ???", addr)?;
            Ok(addr.wrapping_add(1))
        }
    }

    fn setup() -> Monitor<SystemMonitor> {
        let aspace = Rc::new(AddressSpace::new(16, 0x1000, 0xffff));
        let ram = new_shared(Ram::new("ram", 0x10000));
        let map: Vec<_> = (0..16)
            .map(|i| DevMap::new(ram.clone(), i * 0x1000))
            .collect();
        aspace.remap(map.clone(), map, 0xffff);
        let cpu = Box::new(StubCpu {
            pc: 0x1000,
            a: 0xaa,
            aspace: aspace.clone(),
        });
        Monitor::new(SystemMonitor::new(cpu, aspace), None)
    }

    #[test]
    fn monitor_drives_machine_through_capabilities() {
        let mut monitor = setup();
        monitor.cpu_mut().write(0x2000, 0x77);
        assert_eq!(0x77, monitor.cpu_mut().peek(0x2000));
        assert_eq!(0xaa, monitor.cpu_mut().regvalue("a").unwrap());
        assert!(monitor.cpu_mut().regvalue("ix").is_err());
    }

    #[test]
    fn conditional_breakpoint_against_machine_state() {
        let mut monitor = setup();
        monitor.execute_line("b 1000 a == $aa");
        assert!(monitor.is_breakpoint());
        monitor.execute_line("bd 1000");
        assert!(!monitor.is_breakpoint());
    }
}
