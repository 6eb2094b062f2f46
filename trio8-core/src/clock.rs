// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::util::Shared;

// Design:
//   Cooperative scheduling on the emulator thread. Every participant keeps a
//   cycle balance; each scheduler step runs the participant with the lowest
//   balance and credits it with the cycle count its tick returned. The
//   resulting interleaving is a pure function of the initial configuration,
//   which is what makes runs reproducible. Wall-clock pacing and the
//   pause/stop protocol are checked at step-count boundaries only.

/// Steps between control-flag polls and pacing checks.
const CONTROL_CYCLES: u64 = 0x1000;

/// A clocked component. `tick` returns the number of cycles that must pass
/// before it runs again; returning 0 requests termination of the emulation.
pub trait Clockable {
    fn tick(&mut self, clock: &Clock) -> u64;
}

/// Cross-thread control surface of the scheduler: three flags plus a parking
/// primitive. The UI thread signals, the emulator thread polls at cycle
/// boundaries.
pub struct ControlChannel {
    pause: AtomicBool,
    stop: AtomicBool,
    paused_ack: Mutex<bool>,
    cond: Condvar,
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self {
            pause: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            paused_ack: Mutex::new(false),
            cond: Condvar::new(),
        }
    }
}

impl ControlChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Request a pause without waiting for it to take effect.
    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    /// Request a pause and block until the scheduler has confirmed it. Once
    /// this returns the caller may safely mutate machine state from its own
    /// thread.
    pub fn pause_wait(&self) {
        self.pause.store(true, Ordering::SeqCst);
        let mut ack = self.paused_ack.lock().unwrap();
        while !*ack && !self.is_stopped() {
            ack = self.cond.wait(ack).unwrap();
        }
    }

    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
        self.cond.notify_all();
    }

    /// Scheduler side: park while the pause flag is raised, acknowledging
    /// the pause to any `pause_wait` caller.
    fn park(&self) {
        let mut ack = self.paused_ack.lock().unwrap();
        *ack = true;
        self.cond.notify_all();
        while self.is_paused() && !self.is_stopped() {
            ack = self.cond.wait(ack).unwrap();
        }
        *ack = false;
    }
}

struct Participant {
    device: Shared<dyn Clockable>,
    balance: u64,
}

pub struct Clock {
    frequency: u32,
    delay: Cell<f64>,
    cycles: Cell<u64>,
    participants: RefCell<Vec<Participant>>,
    control: Arc<ControlChannel>,
}

impl Clock {
    pub fn new(frequency: u32, control: Arc<ControlChannel>) -> Self {
        Self {
            frequency,
            delay: Cell::new(1.0),
            cycles: Cell::new(0),
            participants: RefCell::new(Vec::new()),
            control,
        }
    }

    /// Register a participant. Registration order is the tie-break order of
    /// the scheduler and part of the machine's contract with its chips.
    pub fn attach(&self, device: Shared<dyn Clockable>) {
        self.participants.borrow_mut().push(Participant {
            device,
            balance: 0,
        });
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Wall-time scale factor: 1.0 is real time, 0 disables pacing, 2.0 runs
    /// at half speed.
    pub fn set_delay(&self, delay: f64) {
        self.delay.set(delay);
    }

    pub fn delay(&self) -> f64 {
        self.delay.get()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }

    /// Emulated time in microseconds derived from the cycle counter.
    pub fn time_us(&self) -> u64 {
        (self.cycles.get() as u128 * 1_000_000 / self.frequency as u128) as u64
    }

    pub fn control(&self) -> Arc<ControlChannel> {
        self.control.clone()
    }

    pub fn reset(&self) {
        self.cycles.set(0);
        for participant in self.participants.borrow_mut().iter_mut() {
            participant.balance = 0;
        }
    }

    /// Run the scheduler until a stop is signalled or a participant requests
    /// termination by returning 0 from its tick.
    pub fn run(&self) {
        info!(target: "clock", "Starting scheduler at {} Hz, delay {}", self.frequency, self.delay.get());
        let mut anchor = Instant::now();
        let mut anchor_cycles = self.cycles.get();
        let mut steps: u64 = 0;
        loop {
            if steps % CONTROL_CYCLES == 0 {
                if self.control.is_stopped() {
                    break;
                }
                if self.control.is_paused() {
                    self.control.park();
                    if self.control.is_stopped() {
                        break;
                    }
                    anchor = Instant::now();
                    anchor_cycles = self.cycles.get();
                }
                self.pace(anchor, anchor_cycles);
            }
            if !self.step() {
                self.control.stop();
                break;
            }
            steps += 1;
        }
        info!(target: "clock", "Scheduler stopped at cycle {}", self.cycles.get());
    }

    /// Run a bounded number of scheduler steps without pacing. Returns the
    /// number of steps actually executed.
    pub fn run_steps(&self, count: usize) -> usize {
        for i in 0..count {
            if self.control.is_stopped() || !self.step() {
                return i;
            }
        }
        count
    }

    fn step(&self) -> bool {
        let (index, device) = {
            let participants = self.participants.borrow();
            if participants.is_empty() {
                return false;
            }
            let mut index = 0;
            for (i, participant) in participants.iter().enumerate() {
                if participant.balance < participants[index].balance {
                    index = i;
                }
            }
            (index, participants[index].device.clone())
        };
        let cycles = device.borrow_mut().tick(self);
        if cycles == 0 {
            return false;
        }
        self.participants.borrow_mut()[index].balance += cycles;
        self.cycles.set(self.cycles.get().wrapping_add(1));
        true
    }

    fn pace(&self, anchor: Instant, anchor_cycles: u64) {
        let delay = self.delay.get();
        if delay <= 0.0 {
            return;
        }
        let executed = self.cycles.get() - anchor_cycles;
        let target = executed as f64 / self.frequency as f64 * delay;
        let elapsed = anchor.elapsed().as_secs_f64();
        if target > elapsed {
            std::thread::sleep(Duration::from_secs_f64(target - elapsed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    struct FixedChip {
        id: u8,
        cycles: u64,
        trace: Shared<Vec<u8>>,
        remaining: usize,
    }

    impl Clockable for FixedChip {
        fn tick(&mut self, _clock: &Clock) -> u64 {
            if self.remaining == 0 {
                return 0;
            }
            self.remaining -= 1;
            self.trace.borrow_mut().push(self.id);
            self.cycles
        }
    }

    fn run_fixture() -> Vec<u8> {
        let control = ControlChannel::new();
        let clock = Clock::new(1_000_000, control);
        clock.set_delay(0.0);
        let trace = new_shared(Vec::new());
        for (id, cycles) in [(1u8, 3u64), (2, 5), (3, 2)].iter() {
            clock.attach(new_shared(FixedChip {
                id: *id,
                cycles: *cycles,
                trace: trace.clone(),
                remaining: 40,
            }));
        }
        clock.run_steps(100);
        let result = trace.borrow().clone();
        result
    }

    #[test]
    fn deterministic_interleaving() {
        let first = run_fixture();
        let second = run_fixture();
        assert_eq!(first, second);
    }

    #[test]
    fn smallest_balance_runs_first() {
        let trace = run_fixture();
        // all balances start at 0, so the first three ticks follow
        // registration order
        assert_eq!(&[1u8, 2, 3][..], &trace[0..3]);
        // chip 3 has the smallest quantum and runs most often
        let count3 = trace.iter().filter(|id| **id == 3).count();
        let count2 = trace.iter().filter(|id| **id == 2).count();
        assert!(count3 > count2);
    }

    #[test]
    fn tick_returning_zero_terminates() {
        let control = ControlChannel::new();
        let clock = Clock::new(1_000_000, control.clone());
        let trace = new_shared(Vec::new());
        clock.attach(new_shared(FixedChip {
            id: 1,
            cycles: 1,
            trace,
            remaining: 5,
        }));
        clock.run_steps(100);
        assert_eq!(5, clock.cycles());
    }

    #[test]
    fn stop_prevents_further_steps() {
        let control = ControlChannel::new();
        control.stop();
        let clock = Clock::new(985_248, control);
        let trace = new_shared(Vec::new());
        clock.attach(new_shared(FixedChip {
            id: 1,
            cycles: 1,
            trace,
            remaining: 1000,
        }));
        clock.run();
        assert_eq!(0, clock.cycles());
    }

    #[test]
    fn time_follows_cycles() {
        let control = ControlChannel::new();
        let clock = Clock::new(1_000_000, control);
        let trace = new_shared(Vec::new());
        clock.attach(new_shared(FixedChip {
            id: 1,
            cycles: 1,
            trace,
            remaining: 2500,
        }));
        clock.run_steps(2500);
        assert_eq!(2500, clock.time_us());
    }
}
