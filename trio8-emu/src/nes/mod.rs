// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

mod cartridge;
mod ines;

pub use self::cartridge::{Cartridge, MirrorType, CPU_WINDOW_BASE, PPU_OFFSET};
pub use self::ines::InesHeader;
