// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod aspace;
mod bank;
mod clock;
mod device;
mod error;
mod io_port;
mod joystick;
pub mod keyboard;
mod nibble_ram;
mod ram;
mod rom;
mod util;

pub use self::aspace::{AddressSpace, BusHook, DevMap, WriteObserver};
pub use self::bank::{Bank, RamBank, RomBank};
pub use self::clock::{Clock, Clockable, ControlChannel};
pub use self::device::{Cpu, Device, DeviceRef, ReadMode};
pub use self::error::{Error, Result};
pub use self::io_port::{IoPort, Pin};
pub use self::joystick::Joystick;
pub use self::keyboard::{Key, Keyboard, MatrixBackend, VjoyKeys};
pub use self::nibble_ram::NibbleRam;
pub use self::ram::Ram;
pub use self::rom::Rom;
pub use self::util::{new_shared, new_shared_cell, Shared, SharedCell};
