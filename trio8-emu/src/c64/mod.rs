// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub mod cartridge;
mod carts;
mod crt;
mod keyboard;
pub mod pla;

pub use self::cartridge::{Cartridge, GameExromMode, IO_SIZE};
pub use self::crt::{Chip, ChipType, Crt, CrtHeader, HwType};
pub use self::keyboard::C64Keyboard;
pub use self::pla::Pla;
