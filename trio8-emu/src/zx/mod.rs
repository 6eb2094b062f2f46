// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

mod cassette;
mod charset;
mod keyboard;
mod tape;

pub use self::cassette::{Cassette, CassetteBackend, CassetteO, CassetteP, RxCmd, RxData};
pub use self::charset::{ascii_to_zx81, zx81_to_ascii};
pub use self::keyboard::ZxKeyboard;
pub use self::tape::{
    fast_load, parity, FastLoadCpu, HeaderBlock, TapPlayer, TapRecorder, TapReader, FLAG_DATA,
    FLAG_HEADER, LD_BYTES_RET_ADDR, LD_BYTES_TRAP_ADDR,
};
