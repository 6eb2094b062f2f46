// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod c64;
mod config;
mod monitor;
mod nes;
mod zx80;
mod zxspectrum;

pub use self::c64::{C64Roms, C64};
pub use self::config::{Config, RomSpec};
pub use self::monitor::SystemMonitor;
pub use self::nes::Nes;
pub use self::zx80::{Zx80, Zx80Model};
pub use self::zxspectrum::ZxSpectrum;
