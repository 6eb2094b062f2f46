// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::PathBuf;

use structopt::StructOpt;
use trio8_system::Config;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Machine {
    C64,
    Nes,
    Zx80,
    ZxSpectrum,
}

fn parse_machine(text: &str) -> Result<Machine, String> {
    match text {
        "c64" => Ok(Machine::C64),
        "nes" => Ok(Machine::Nes),
        "zx80" | "zx81" => Ok(Machine::Zx80),
        "zxspectrum" | "spectrum" => Ok(Machine::ZxSpectrum),
        _ => Err(format!("invalid machine {}", text)),
    }
}

fn parse_key_val(text: &str) -> Result<(String, String), String> {
    let pos = text
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", text))?;
    Ok((text[..pos].to_string(), text[pos + 1..].to_string()))
}

#[derive(StructOpt, Debug)]
#[structopt(name = "trio8")]
pub struct Opt {
    /// attach and boot image (crt, nes, tap, o, p)
    #[structopt(parse(from_os_str))]
    pub image: Option<PathBuf>,

    /// machine to emulate: c64, nes, zx80, zxspectrum
    #[structopt(long, default_value = "c64", parse(try_from_str = parse_machine))]
    pub machine: Machine,
    /// configuration file
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,
    /// run without a window
    #[structopt(long)]
    pub console: bool,
    /// wall-clock delay factor (1.0 real time, 0 free-run)
    #[structopt(long)]
    pub delay: Option<f64>,
    /// disable wall-clock pacing
    #[structopt(long = "warp")]
    pub warp_mode: bool,

    // -- Devices
    /// key mapping file
    #[structopt(long, parse(from_os_str))]
    pub keymap: Option<PathBuf>,
    /// cassette directory (zx80/zx81)
    #[structopt(long, parse(from_os_str))]
    pub cassdir: Option<PathBuf>,
    /// skip pulse-level tape loading (zxspectrum)
    #[structopt(long)]
    pub fastload: bool,

    // -- Roms
    /// filename of the basic ROM (c64)
    #[structopt(long, parse(from_os_str))]
    pub basic: Option<PathBuf>,
    /// filename of the character generator ROM (c64)
    #[structopt(long, parse(from_os_str))]
    pub chargen: Option<PathBuf>,
    /// filename of the kernal ROM (c64)
    #[structopt(long, parse(from_os_str))]
    pub kernal: Option<PathBuf>,
    /// filename of the system ROM (zx machines)
    #[structopt(long, parse(from_os_str))]
    pub rom: Option<PathBuf>,

    // -- Debug
    /// set a breakpoint at this address
    #[structopt(long)]
    pub bp: Vec<String>,
    /// enter the monitor before booting
    #[structopt(long)]
    pub debug: bool,

    // -- Logging
    /// set log level
    #[structopt(long = "loglevel", default_value = "info")]
    pub log_level: String,
    /// set log level for a target, e.g. --log mem=trace
    #[structopt(long = "log", parse(try_from_str = parse_key_val))]
    pub log_target_level: Vec<(String, String)>,
}

/// Overlay command line options on top of the configuration.
pub fn apply(config: &mut Config, opt: &Opt) {
    config.set("global", "loglevel", &opt.log_level);
    if let Some(delay) = opt.delay {
        config.set("global", "delay", &delay.to_string());
    }
    if opt.warp_mode {
        config.set("global", "delay", "0");
    }
    if let Some(ref path) = opt.keymap {
        config.set("global", "keymap", &path.to_string_lossy());
    }
    if let Some(ref path) = opt.cassdir {
        config.set("zx80", "cassdir", &path.to_string_lossy());
    }
    if opt.fastload {
        config.set("zxspectrum", "fastload", "yes");
    }
    if let Some(ref path) = opt.basic {
        config.set("c64", "basic", &path.to_string_lossy());
    }
    if let Some(ref path) = opt.chargen {
        config.set("c64", "chargen", &path.to_string_lossy());
    }
    if let Some(ref path) = opt.kernal {
        config.set("c64", "kernal", &path.to_string_lossy());
    }
    if let Some(ref path) = opt.rom {
        config.set("zx80", "rom-file", &path.to_string_lossy());
        config.set("zxspectrum", "rom-file", &path.to_string_lossy());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_names() {
        assert_eq!(Machine::Zx80, parse_machine("zx81").unwrap());
        assert!(parse_machine("amiga").is_err());
    }

    #[test]
    fn cli_overrides_config() {
        let mut config = Config::new();
        let opt = Opt::from_iter(vec!["trio8", "--warp", "--loglevel", "debug"]);
        apply(&mut config, &opt);
        assert_eq!("0", config.get_or("global", "delay", ""));
        assert_eq!("debug", config.get_or("global", "loglevel", ""));
    }
}
