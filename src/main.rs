// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod cli;
mod execution;
mod logger;

use std::fs;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};
use structopt::StructOpt;

use trio8_emu::c64::cartridge::from_crt;
use trio8_loader::ImageKind;
use trio8_system::{C64Roms, Config, Nes, RomSpec, Zx80, Zx80Model, ZxSpectrum, C64};

use crate::cli::{Machine, Opt};
use crate::execution::Emulator;
use crate::logger::Logger;

static NAME: &str = "trio8";

fn main() {
    let opt = Opt::from_args();
    match run(&opt) {
        Ok(_) => process::exit(0),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

/// Values the emulator thread needs, extracted from config and command
/// line before the machine is built on its own thread.
struct Boot {
    machine: Machine,
    console: bool,
    image: Option<PathBuf>,
    keymap: Option<PathBuf>,
    cassdir: Option<PathBuf>,
    fast_load: bool,
    delay: f64,
    storage_dir: PathBuf,
    basic: Option<PathBuf>,
    chargen: Option<PathBuf>,
    kernal: Option<PathBuf>,
    rom: Option<PathBuf>,
}

fn run(opt: &Opt) -> Result<()> {
    let mut config = Config::new();
    if let Some(ref path) = opt.config {
        let mut file = File::open(path)
            .with_context(|| format!("can't open configuration {}", path.display()))?;
        config
            .load(&mut file)
            .with_context(|| format!("{}", path.display()))?;
    }
    cli::apply(&mut config, opt);

    let logger = Logger::build(
        config.get_or("global", "loglevel", "info"),
        &opt.log_target_level,
    )?;
    Logger::enable(logger)?;
    info!("Starting {}", NAME);

    fs::create_dir_all(config.storage_dir()).with_context(|| {
        format!(
            "can't create storage directory {}",
            config.storage_dir().display()
        )
    })?;

    let boot = Boot {
        machine: opt.machine,
        console: opt.console,
        image: opt.image.clone(),
        keymap: config.get("global", "keymap").map(PathBuf::from),
        cassdir: config.get("zx80", "cassdir").map(PathBuf::from),
        fast_load: config.get_bool("zxspectrum", "fastload", false)?,
        delay: config.get_f64("global", "delay", 1.0)?,
        storage_dir: config.storage_dir().to_path_buf(),
        basic: config.get("c64", "basic").map(PathBuf::from),
        chargen: config.get("c64", "chargen").map(PathBuf::from),
        kernal: config.get("c64", "kernal").map(PathBuf::from),
        rom: config.get("zx80", "rom-file").map(PathBuf::from),
    };
    if opt.debug || !opt.bp.is_empty() {
        // the monitor needs a CPU core wired through the Cpu trait
        return Err(anyhow!(
            "no CPU core is attached to this build; the monitor requires one"
        ));
    }

    let emulator = Emulator::spawn(move |control| {
        let result = boot_machine(&boot, control);
        if let Err(ref err) = result {
            error!("{:#}", err);
        }
        result
    })?;
    emulator.join()
}

fn boot_machine(
    boot: &Boot,
    control: std::sync::Arc<trio8_core::ControlChannel>,
) -> Result<()> {
    match boot.machine {
        Machine::C64 => boot_c64(boot, control),
        Machine::Nes => boot_nes(boot, control),
        Machine::Zx80 => boot_zx80(boot, control),
        Machine::ZxSpectrum => boot_zxspectrum(boot, control),
    }
}

fn rom_spec(path: &Option<PathBuf>, what: &str) -> Result<RomSpec> {
    let path = path
        .as_ref()
        .ok_or_else(|| anyhow!("missing {} ROM, pass it on the command line", what))?;
    Ok(RomSpec::new(path))
}

fn dump_mmap(console: bool, aspace: &trio8_core::AddressSpace) -> Result<()> {
    if console {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        aspace.dump(&mut out)?;
    }
    Ok(())
}

fn boot_c64(boot: &Boot, control: std::sync::Arc<trio8_core::ControlChannel>) -> Result<()> {
    let roms = C64Roms {
        basic: rom_spec(&boot.basic, "basic")?,
        chargen: rom_spec(&boot.chargen, "chargen")?,
        kernal: rom_spec(&boot.kernal, "kernal")?,
    };
    let mut c64 = C64::build(&roms, control)?;
    load_keymap(&c64.keyboard(), &boot.keymap)?;
    if let Some(ref path) = boot.image {
        match ImageKind::from_path(path)? {
            ImageKind::Crt => {
                let mut file = File::open(path)
                    .with_context(|| format!("can't open {}", path.display()))?;
                let crt = trio8_loader::crt::load(&mut file)?;
                c64.attach_cartridge(from_crt(crt)?)?;
                c64.reset();
            }
            other => return Err(anyhow!("image type {:?} not supported on the C64", other)),
        }
    }
    dump_mmap(boot.console, &c64.aspace())?;
    run_clock(&c64.clock(), boot.delay)
}

fn boot_nes(boot: &Boot, control: std::sync::Arc<trio8_core::ControlChannel>) -> Result<()> {
    let mut nes = Nes::build(control);
    if let Some(ref path) = boot.image {
        if ImageKind::from_path(path)? != ImageKind::Ines {
            return Err(anyhow!("the NES boots iNES images only"));
        }
        let data = fs::read(path).with_context(|| format!("can't open {}", path.display()))?;
        let ram_path = boot
            .storage_dir
            .join(format!("{}.ram", trio8_loader::digest(&data)));
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "cartridge".to_string());
        let cartridge = trio8_loader::ines::load(&name, &mut &data[..], Some(ram_path))?;
        nes.attach_cartridge(cartridge)?;
    }
    dump_mmap(boot.console, &nes.cpu_aspace())?;
    run_clock(&nes.clock(), boot.delay)
}

fn boot_zx80(boot: &Boot, control: std::sync::Arc<trio8_core::ControlChannel>) -> Result<()> {
    let model = Zx80Model::Rom8k;
    let rom = rom_spec(&boot.rom, "system")?;
    let mut zx = Zx80::build(model, &rom, 0x4000, control)?;
    load_keymap(&zx.keyboard(), &boot.keymap)?;
    if let Some(ref dir) = boot.cassdir {
        zx.attach_cassette_dir(dir)?;
    }
    dump_mmap(boot.console, &zx.aspace())?;
    run_clock(&zx.clock(), boot.delay)
}

fn boot_zxspectrum(
    boot: &Boot,
    control: std::sync::Arc<trio8_core::ControlChannel>,
) -> Result<()> {
    let rom = rom_spec(&boot.rom, "system")?;
    let mut zx = ZxSpectrum::build(&rom, control)?;
    load_keymap(&zx.keyboard(), &boot.keymap)?;
    zx.set_fast_load(boot.fast_load);
    if let Some(ref path) = boot.image {
        if ImageKind::from_path(path)? != ImageKind::Tap {
            return Err(anyhow!("the Spectrum boots TAP images only"));
        }
        let mut file = File::open(path).with_context(|| format!("can't open {}", path.display()))?;
        zx.attach_tape(trio8_loader::tap::load(&mut file)?);
    }
    dump_mmap(boot.console, &zx.aspace())?;
    run_clock(&zx.clock(), boot.delay)
}

fn load_keymap(
    keyboard: &trio8_core::Shared<trio8_core::Keyboard>,
    path: &Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = path {
        let mut file =
            File::open(path).with_context(|| format!("can't open keymap {}", path.display()))?;
        keyboard.borrow_mut().load_mapping(&mut file)?;
        info!("Loaded key mapping {}", path.display());
    }
    Ok(())
}

/// Drive the machine clock on this (the emulator) thread. Without a CPU
/// core attached the participant list is empty and the scheduler returns
/// immediately; with cores wired in this is the main loop.
fn run_clock(clock: &std::rc::Rc<trio8_core::Clock>, delay: f64) -> Result<()> {
    clock.set_delay(delay);
    clock.run();
    info!("Machine halted after {} cycles", clock.cycles());
    Ok(())
}
