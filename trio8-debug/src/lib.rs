// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod condition;
mod cpu;
mod monitor;
mod readline;

pub use self::condition::{compile, Cond};
pub use self::cpu::MonitoredCpu;
pub use self::monitor::{to_number, Monitor, Step, HISTFILE};
pub use self::readline::Readline;
