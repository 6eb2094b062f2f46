// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use trio8_core::{Error, Result};

use crate::condition::{compile, Cond};
use crate::cpu::MonitoredCpu;
use crate::readline::Readline;

// The monitor runs on the emulator thread while the scheduler is parked on
// the breakpoint/pause protocol; input arrives from the monitor I/O thread
// through stdin. Commands never abort the REPL: errors are reported and
// the prompt returns.

const PROMPT_SUFFIX: &str = "> ";

/// Conventional history file name under the storage directory.
pub const HISTFILE: &str = "monitor.hist";

/// What the REPL does after a command.
#[derive(PartialEq, Debug)]
pub enum Step {
    /// Stay in the monitor.
    Continue,
    /// Leave the monitor and resume the emulation.
    Resume,
    /// Terminate the emulator.
    Quit,
}

/// Parse a number with the monitor conventions: `$` hex, `#` decimal,
/// `#$` hex, bare values default to hexadecimal.
pub fn to_number(text: &str) -> Result<u16> {
    let mut text = text;
    let mut radix = 16;
    if let Some(stripped) = text.strip_prefix('#') {
        radix = 10;
        text = stripped;
    }
    if let Some(stripped) = text.strip_prefix('$') {
        radix = 16;
        text = stripped;
    }
    u16::from_str_radix(text, radix)
        .map_err(|_| Error::InvalidNumber(format!("invalid value {}", text)))
}

type Breakpoint<C> = Option<(Cond<C>, String)>;

pub struct Monitor<C: MonitoredCpu> {
    cpu: C,
    rd: Readline,
    breakpoints: HashMap<u16, Breakpoint<C>>,
    prev_line: String,
    prev_cmd: String,
}

impl<C: MonitoredCpu + 'static> Monitor<C> {
    pub fn new(cpu: C, histfile: Option<PathBuf>) -> Self {
        Self {
            cpu,
            rd: Readline::new(histfile),
            breakpoints: HashMap::new(),
            prev_line: String::new(),
            prev_cmd: String::new(),
        }
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    /// Install a breakpoint; `cond` of None is unconditional.
    pub fn add_breakpoint(&mut self, addr: u16, cond: Breakpoint<C>) {
        self.breakpoints.insert(addr, cond);
    }

    pub fn del_breakpoint(&mut self, addr: u16) {
        self.breakpoints.remove(&addr);
    }

    pub fn has_breakpoints(&self) -> bool {
        !self.breakpoints.is_empty()
    }

    /// Evaluate the breakpoint table at the current program counter,
    /// reporting a hit to the terminal.
    pub fn is_breakpoint(&mut self) -> bool {
        let pc = self.cpu.pc();
        match self.breakpoints.get(&pc) {
            None => false,
            Some(None) => {
                self.rd.write(&format!("Breakpoint at ${:04x}\n", pc));
                true
            }
            Some(Some((cond, text))) => {
                if cond(&mut self.cpu) != 0 {
                    self.rd
                        .write(&format!("Conditional breakpoint at ${:04x} {}\n", pc, text));
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Enter the monitor REPL. Returns true to continue the emulation,
    /// false to terminate it.
    pub fn run(&mut self) -> bool {
        loop {
            let prompt = self.prompt();
            let line = match self.rd.getline(&prompt) {
                Ok(Some(line)) => line,
                Ok(None) => return false,
                Err(err) => {
                    warn!(target: "monitor", "Input error: {}", err);
                    return false;
                }
            };
            match self.execute_line(&line) {
                Step::Continue => {}
                Step::Resume => return true,
                Step::Quit => return false,
            }
        }
    }

    /// Parse and execute one command line.
    pub fn execute_line(&mut self, line: &str) -> Step {
        let line = line.trim().to_string();
        let line = if line.is_empty() {
            self.prev_line.clone()
        } else {
            line
        };
        if line.is_empty() || line.starts_with('#') {
            return Step::Continue;
        }
        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        self.prev_line = line;
        self.prev_cmd = args[0].clone();
        let result = match args[0].as_str() {
            "assemble" | "a" => self.cmd_assemble(&args),
            "disass" | "d" => self.cmd_disass(&args),
            "dump" | "x" => self.cmd_dump(&args),
            "regs" | "r" => self.cmd_regs(),
            "mmap" | "m" => self.cmd_mmap(),
            "bpadd" | "b" => self.cmd_bp_add(&args),
            "bpdel" | "bd" => self.cmd_bp_del(&args),
            "bpclear" | "bc" => self.cmd_bp_clear(),
            "bplist" | "bl" => self.cmd_bp_list(),
            "go" | "g" => self.cmd_go(&args),
            "si" | "s" => self.cmd_step(&args),
            "load" | "l" => self.cmd_load(&args),
            "save" | "w" => self.cmd_save(&args),
            "loglevel" | "lv" => self.cmd_loglevel(&args),
            "fc" => self.cmd_history(),
            "quit" | "q" => Ok(Step::Quit),
            "help" | "h" | "?" => self.cmd_help(),
            other => Err(Error::InvalidArgument(format!("invalid command {}", other))),
        };
        match result {
            Ok(step) => step,
            Err(err) => {
                self.rd.write(&format!("{}\n", err));
                Step::Continue
            }
        }
    }

    fn prompt(&mut self) -> String {
        let mut text = String::new();
        if self.prev_cmd == "s" || self.prev_cmd == "si" {
            let pc = self.cpu.pc();
            let mut out = Vec::new();
            if self.cpu.disass(&mut out, pc, 1, true).is_ok() {
                text.push_str(&String::from_utf8_lossy(&out));
            }
            text.push_str(&self.cpu.regs());
            text.push('\n');
        }
        text.push_str(&format!("${:04x}{}", self.cpu.pc(), PROMPT_SUFFIX));
        text
    }

    fn to_addr(&mut self, text: &str, default: u16) -> Result<u16> {
        if text == "." {
            Ok(default)
        } else {
            to_number(text)
        }
    }

    // -- Commands

    fn cmd_assemble(&mut self, args: &[String]) -> Result<Step> {
        let pc = self.cpu.pc();
        let mut addr = match args.get(1) {
            Some(text) => self.to_addr(text, pc)?,
            None => pc,
        };
        self.rd
            .write("Entering edit mode. To finish write '.' or an empty line\n");
        loop {
            let line = match self.rd.getline(&format!("${:04x}: ", addr)) {
                Ok(Some(line)) => line,
                _ => break,
            };
            let line = line.trim();
            if line.is_empty() || line == "." {
                break;
            }
            let mut bytes = Vec::new();
            let mut valid = true;
            for token in line.split_whitespace() {
                match to_number(token) {
                    Ok(value) if value <= 0xff => bytes.push(value as u8),
                    _ => {
                        self.rd.write(&format!("Invalid value: {}\n", token));
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                for byte in bytes {
                    self.cpu.write(addr, byte);
                    addr = addr.wrapping_add(1);
                }
            }
        }
        Ok(Step::Continue)
    }

    fn cmd_disass(&mut self, args: &[String]) -> Result<Step> {
        let pc = self.cpu.pc();
        let addr = match args.get(1) {
            Some(text) => self.to_addr(text, pc)?,
            None => pc,
        };
        let count = match args.get(2) {
            Some(text) => to_number(text)? as usize,
            None => 16,
        };
        let mut out = Vec::new();
        self.cpu
            .disass(&mut out, addr, count, true)
            .map_err(|err| Error::Io(err.to_string()))?;
        self.rd.write(&String::from_utf8_lossy(&out));
        Ok(Step::Continue)
    }

    fn cmd_dump(&mut self, args: &[String]) -> Result<Step> {
        let pc = self.cpu.pc();
        let addr = match args.get(1) {
            Some(text) => self.to_addr(text, pc)?,
            None => pc,
        };
        let count = match args.get(2) {
            Some(text) => to_number(text)? as usize,
            None => 16,
        };
        let mut text = String::new();
        let mut offset = 0;
        while offset < count {
            let row = usize::min(16, count - offset);
            let base = addr.wrapping_add(offset as u16);
            text.push_str(&format!("{:04x}: ", base));
            let mut ascii = String::new();
            for i in 0..16 {
                if i < row {
                    let byte = self.cpu.peek(base.wrapping_add(i as u16));
                    text.push_str(&format!("{:02x} ", byte));
                    ascii.push(if (0x20..0x7f).contains(&byte) {
                        byte as char
                    } else {
                        '.'
                    });
                } else {
                    text.push_str("   ");
                }
            }
            text.push_str(&format!(" {}\n", ascii));
            offset += row;
        }
        self.rd.write(&text);
        Ok(Step::Continue)
    }

    fn cmd_regs(&mut self) -> Result<Step> {
        let regs = self.cpu.regs();
        self.rd.write(&format!("{}\n", regs));
        Ok(Step::Continue)
    }

    fn cmd_mmap(&mut self) -> Result<Step> {
        let mut out = Vec::new();
        self.cpu
            .mmap(&mut out)
            .map_err(|err| Error::Io(err.to_string()))?;
        self.rd.write(&String::from_utf8_lossy(&out));
        Ok(Step::Continue)
    }

    fn cmd_bp_add(&mut self, args: &[String]) -> Result<Step> {
        let arg = match args.get(1) {
            Some(arg) => arg.clone(),
            None => return Ok(Step::Continue),
        };
        if arg == "help" || arg == "h" || arg == "?" {
            let doc = self.cpu.bpdoc(&args[0]);
            self.rd.write(&doc);
            return Ok(Step::Continue);
        }
        let pc = self.cpu.pc();
        let addr = self.to_addr(&arg, pc)?;
        let cond = if args.len() > 2 {
            let text = args[2..].join(" ");
            let cond = compile(&mut self.cpu, &text)?;
            Some((cond, text))
        } else {
            None
        };
        self.add_breakpoint(addr, cond);
        Ok(Step::Continue)
    }

    fn cmd_bp_del(&mut self, args: &[String]) -> Result<Step> {
        let pc = self.cpu.pc();
        for arg in &args[1..] {
            match self.to_addr(arg, pc) {
                Ok(addr) => self.del_breakpoint(addr),
                Err(err) => self.rd.write(&format!("{}\n", err)),
            }
        }
        Ok(Step::Continue)
    }

    fn cmd_bp_clear(&mut self) -> Result<Step> {
        self.breakpoints.clear();
        Ok(Step::Continue)
    }

    fn cmd_bp_list(&mut self) -> Result<Step> {
        let pc = self.cpu.pc();
        let mut addrs: Vec<u16> = self.breakpoints.keys().copied().collect();
        addrs.sort_unstable();
        let mut text = String::new();
        for addr in addrs {
            text.push_str(&format!("${:04x}", addr));
            if let Some(Some((_, cond))) = self.breakpoints.get(&addr) {
                text.push_str(&format!(" {}", cond));
            }
            text.push_str(if addr == pc { " <\n" } else { "\n" });
        }
        self.rd.write(&text);
        Ok(Step::Continue)
    }

    fn cmd_go(&mut self, args: &[String]) -> Result<Step> {
        if let Some(arg) = args.get(1) {
            let pc = self.cpu.pc();
            let addr = self.to_addr(arg, pc)?;
            self.cpu.set_pc(addr);
        }
        Ok(Step::Resume)
    }

    fn cmd_step(&mut self, args: &[String]) -> Result<Step> {
        if let Some(arg) = args.get(1) {
            let pc = self.cpu.pc();
            let addr = self.to_addr(arg, pc)?;
            self.cpu.set_pc(addr);
        }
        self.cpu.ebreak();
        Ok(Step::Resume)
    }

    fn cmd_load(&mut self, args: &[String]) -> Result<Step> {
        let fname = args
            .get(1)
            .ok_or_else(|| Error::InvalidArgument("missing file name".to_string()))?;
        let addr = match args.get(2) {
            Some(text) => to_number(text)?,
            None => 0,
        };
        let (start, size) = self.cpu.load(Path::new(fname), addr)?;
        self.rd.write(&format!(
            "load: {} loaded at ${:04x}, size {} (${:04x})\n",
            fname, start, size, size
        ));
        Ok(Step::Continue)
    }

    fn cmd_save(&mut self, args: &[String]) -> Result<Step> {
        if args.len() != 4 {
            return Err(Error::InvalidArgument(
                "usage: save <fname> <start> <end>".to_string(),
            ));
        }
        let start = to_number(&args[2])?;
        let end = to_number(&args[3])?;
        if end < start {
            return Err(Error::InvalidArgument(
                "end address smaller than start address".to_string(),
            ));
        }
        self.cpu.save(Path::new(&args[1]), start, end)?;
        Ok(Step::Continue)
    }

    fn cmd_loglevel(&mut self, args: &[String]) -> Result<Step> {
        let level = self.cpu.loglevel(args.get(1).map(String::as_str))?;
        self.rd.write(&format!("{}\n", level));
        Ok(Step::Continue)
    }

    fn cmd_history(&mut self) -> Result<Step> {
        let text: String = self
            .rd
            .history()
            .iter()
            .map(|line| format!("{}\n", line))
            .collect();
        self.rd.write(&text);
        Ok(Step::Continue)
    }

    fn cmd_help(&mut self) -> Result<Step> {
        let help = concat!(
            "assemble  a   .|$addr             Enter bytes from $addr\n",
            "disass    d   [.|$addr [n]]       Disassemble n instructions\n",
            "dump      x   [.|$addr [n]]       Dump n bytes of memory\n",
            "regs      r                       Show registers\n",
            "mmap      m                       Show memory map\n",
            "bpadd     b   $addr [cond]        Add a breakpoint (b help for conditions)\n",
            "bpdel     bd  $addr               Delete breakpoint\n",
            "bpclear   bc                      Clear all breakpoints\n",
            "bplist    bl                      List breakpoints\n",
            "go        g   [.|$addr]           Run from $addr\n",
            "si        s   [.|$addr]           Execute single instruction\n",
            "load      l   fname [$addr]       Load a binary file\n",
            "save      w   fname $start $end   Save a memory range\n",
            "loglevel  lv  [level]             Show or set the log level\n",
            "fc                                Show command history\n",
            "quit      q                       Terminate the emulator\n",
            "help      h|?                     This help\n",
        );
        self.rd.write(help);
        Ok(Step::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::io::Write;

    struct TestCpu {
        a: u16,
        pc: u16,
        ebreak: bool,
        mem: Vec<u8>,
    }

    impl TestCpu {
        fn new() -> Self {
            Self {
                a: 0,
                pc: 0x1000,
                ebreak: false,
                mem: vec![0; 0x10000],
            }
        }
    }

    impl MonitoredCpu for TestCpu {
        fn regs(&mut self) -> String {
            format!("A={:02x} PC={:04x}", self.a, self.pc)
        }
        fn pc(&mut self) -> u16 {
            self.pc
        }
        fn set_pc(&mut self, addr: u16) {
            self.pc = addr;
        }
        fn peek(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
        fn disass(
            &mut self,
            out: &mut dyn Write,
            addr: u16,
            _count: usize,
            _show_pc: bool,
        ) -> io::Result<()> {
            writeln!(out, "{:04x}  ???", addr)
        }
        fn mmap(&mut self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "0000-ffff RAM")
        }
        fn ebreak(&mut self) {
            self.ebreak = true;
        }
        fn regvalue(&mut self, name: &str) -> trio8_core::Result<u16> {
            match name {
                "a" => Ok(self.a),
                "pc" => Ok(self.pc),
                _ => Err(Error::InvalidArgument(format!("invalid register {}", name))),
            }
        }
    }

    #[test]
    fn number_prefixes() {
        assert_eq!(0x10, to_number("10").unwrap());
        assert_eq!(0x10, to_number("$10").unwrap());
        assert_eq!(10, to_number("#10").unwrap());
        assert_eq!(0x10, to_number("#$10").unwrap());
        assert!(to_number("zz").is_err());
    }

    #[test]
    fn conditional_breakpoint_fires_on_match() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Continue, monitor.execute_line("b 1005 a == $aa"));
        monitor.cpu_mut().pc = 0x1005;
        monitor.cpu_mut().a = 0x12;
        assert!(!monitor.is_breakpoint());
        monitor.cpu_mut().a = 0xaa;
        assert!(monitor.is_breakpoint());
    }

    #[test]
    fn unconditional_breakpoint() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        monitor.execute_line("b 2000");
        monitor.cpu_mut().pc = 0x2000;
        assert!(monitor.is_breakpoint());
        monitor.execute_line("bd 2000");
        assert!(!monitor.is_breakpoint());
    }

    #[test]
    fn go_resumes_at_address() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Resume, monitor.execute_line("g c000"));
        assert_eq!(0xc000, monitor.cpu_mut().pc);
    }

    #[test]
    fn step_requests_ebreak() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Resume, monitor.execute_line("s"));
        assert!(monitor.cpu_mut().ebreak);
    }

    #[test]
    fn quit_exits() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Quit, monitor.execute_line("q"));
    }

    #[test]
    fn empty_line_repeats_previous() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Resume, monitor.execute_line("g"));
        assert_eq!(Step::Resume, monitor.execute_line(""));
    }

    #[test]
    fn invalid_command_reports_and_continues() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        assert_eq!(Step::Continue, monitor.execute_line("bogus"));
        assert_eq!(Step::Continue, monitor.execute_line("b zz"));
    }

    #[test]
    fn dot_resolves_to_pc() {
        let mut monitor = Monitor::new(TestCpu::new(), None);
        monitor.cpu_mut().pc = 0x4321;
        assert_eq!(Step::Resume, monitor.execute_line("g ."));
        assert_eq!(0x4321, monitor.cpu_mut().pc);
    }
}
