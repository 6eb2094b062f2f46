// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use trio8_core::ControlChannel;

// Thread model: the emulator thread owns the machine and the clock; the
// main thread keeps the control channel. Pausing blocks until the
// scheduler acknowledges, after which machine state may be inspected
// safely; stopping makes the scheduler exit and the thread result is
// surfaced on join.

pub struct Emulator {
    control: Arc<ControlChannel>,
    handle: thread::JoinHandle<Result<()>>,
}

impl Emulator {
    /// Spawn the emulator thread. The body receives the shared control
    /// channel and is expected to build the machine and run its clock.
    pub fn spawn<F>(body: F) -> Result<Emulator>
    where
        F: FnOnce(Arc<ControlChannel>) -> Result<()> + Send + 'static,
    {
        let control = ControlChannel::new();
        let thread_control = control.clone();
        let handle = thread::Builder::new()
            .name("emulator".to_string())
            .spawn(move || body(thread_control))?;
        Ok(Emulator { control, handle })
    }

    pub fn control(&self) -> Arc<ControlChannel> {
        self.control.clone()
    }

    /// Request a pause and wait for the scheduler to confirm it.
    pub fn pause_wait(&self) {
        self.control.pause_wait();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    /// Signal termination and wait for the emulator thread to finish.
    pub fn stop_and_join(self) -> Result<()> {
        self.control.stop();
        self.handle
            .join()
            .map_err(|_| anyhow!("emulator thread panicked"))?
    }

    /// Wait for the emulator thread without signalling a stop.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| anyhow!("emulator thread panicked"))?
    }
}
