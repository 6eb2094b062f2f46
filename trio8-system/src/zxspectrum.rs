// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::rc::Rc;
use std::sync::Arc;

use trio8_core::{
    new_shared, AddressSpace, Clock, ControlChannel, Cpu, DevMap, Device, Keyboard, Ram, ReadMode,
    Result, Rom, Shared,
};
use trio8_emu::zx::{
    fast_load, FastLoadCpu, TapPlayer, TapReader, TapRecorder, ZxKeyboard, LD_BYTES_TRAP_ADDR,
};

use crate::config::RomSpec;

// Design:
//   48K Spectrum: 16K ROM at the bottom, 48K RAM above, everything else on
//   the ULA port $FE. The tape player renders TAP pulses against emulated
//   time for the EAR bit; the recorder measures MIC transitions back into
//   TAP blocks. When fast loading is enabled the LD-BYTES ROM routine is
//   trapped and the next block is injected directly.

const FREQUENCY: u32 = 3_500_000;

const BLOCKS: usize = 16;
const BLOCK_SIZE: usize = 0x1000;
const ROM_SIZE: usize = 0x4000;
const RAM_SIZE: usize = 0xc000;

pub struct ZxSpectrum {
    aspace: Rc<AddressSpace>,
    ram: Shared<Ram>,
    keyboard: Shared<Keyboard>,
    player: Option<TapPlayer>,
    pulse_end: u64,
    ear: bool,
    recorder: TapRecorder,
    mic: bool,
    mic_time: u64,
    fast_load: bool,
    cpu: Option<Box<dyn Cpu>>,
    clock: Rc<Clock>,
}

impl ZxSpectrum {
    pub fn build(rom: &RomSpec, control: Arc<ControlChannel>) -> Result<ZxSpectrum> {
        let rom = match rom.digest {
            Some(ref digest) => Rom::new_with_digest("rom", &rom.path, digest)?,
            None => Rom::new_with_size("rom", &rom.path, ROM_SIZE)?,
        };
        Ok(Self::build_with_rom(rom, control))
    }

    pub fn build_with_rom(rom: Rom, control: Arc<ControlChannel>) -> ZxSpectrum {
        info!(target: "zxsp", "Initializing system");
        assert_eq!(ROM_SIZE, rom.size());
        let aspace = Rc::new(AddressSpace::new(BLOCKS, BLOCK_SIZE, 0xffff));
        let ram = new_shared(Ram::new("ram", RAM_SIZE));
        let rom = new_shared(rom);

        let mut map = Vec::with_capacity(BLOCKS);
        for block in 0..BLOCKS {
            if block < 4 {
                map.push(DevMap::new(rom.clone(), block * BLOCK_SIZE));
            } else {
                map.push(DevMap::new(ram.clone(), (block - 4) * BLOCK_SIZE));
            }
        }
        let mut write_map = map.clone();
        for block in write_map.iter_mut().take(4) {
            *block = DevMap::none();
        }
        aspace.remap(map, write_map, 0xffff);

        ZxSpectrum {
            aspace,
            ram,
            keyboard: new_shared(Keyboard::new(Box::new(ZxKeyboard::new()))),
            player: None,
            pulse_end: 0,
            ear: false,
            recorder: TapRecorder::new(),
            mic: false,
            mic_time: 0,
            fast_load: false,
            cpu: None,
            clock: Rc::new(Clock::new(FREQUENCY, control)),
        }
    }

    pub fn reset(&mut self) {
        info!(target: "zxsp", "Resetting system");
        self.clock.reset();
        self.keyboard.borrow_mut().reset();
        self.pulse_end = 0;
        self.ear = false;
        self.mic = false;
        self.mic_time = 0;
    }

    /// Mount a tape for playback.
    pub fn attach_tape(&mut self, reader: TapReader) {
        self.player = Some(TapPlayer::new(reader));
        self.pulse_end = 0;
    }

    pub fn detach_tape(&mut self) {
        self.player = None;
    }

    pub fn set_fast_load(&mut self, enabled: bool) {
        self.fast_load = enabled;
    }

    /// Blocks recorded from the MIC line so far, each parity-checked.
    pub fn take_recorded_blocks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.recorder).finish()
    }

    /// ULA port read: keyboard half-rows in bits 0..4, EAR in bit 6.
    pub fn ula_read(&mut self, port: u16) -> u8 {
        if port & 1 != 0 {
            return 0xff;
        }
        let rows = (port >> 8) as u8;
        let mut value = self.keyboard.borrow().scan(rows) & 0x1f | 0xa0;
        if self.ear_level() {
            value |= 0x40;
        }
        value
    }

    /// ULA port write: bit 3 drives MIC, bit 4 the speaker, bits 0..2 the
    /// border colour (left to the video collaborator).
    pub fn ula_write(&mut self, port: u16, value: u8) {
        if port & 1 != 0 {
            return;
        }
        let mic = value & 0x08 != 0;
        if mic != self.mic {
            let now = self.clock.time_us();
            let duration = now.saturating_sub(self.mic_time);
            self.mic = mic;
            self.mic_time = now;
            self.recorder.pulse(duration);
        }
    }

    /// Current EAR level from the tape player, advanced to emulated time.
    pub fn ear_level(&mut self) -> bool {
        let player = match self.player {
            Some(ref mut player) => player,
            None => return false,
        };
        let now = self.clock.time_us();
        while now >= self.pulse_end {
            match player.next_pulse() {
                Some(duration) => {
                    self.ear = player.level();
                    self.pulse_end += duration;
                }
                None => {
                    self.ear = false;
                    break;
                }
            }
        }
        self.ear
    }

    /// Service the fast-load trap: when enabled and the CPU sits on the
    /// LD-BYTES entry, inject the next tape block directly.
    pub fn service_fast_load(&mut self, cpu: &mut dyn FastLoadCpu, pc: u16) -> Result<bool> {
        if !self.fast_load || pc != LD_BYTES_TRAP_ADDR {
            return Ok(false);
        }
        let player = match self.player {
            Some(ref mut player) => player,
            None => return Ok(false),
        };
        fast_load(cpu, player.reader_mut())?;
        Ok(true)
    }

    pub fn aspace(&self) -> Rc<AddressSpace> {
        self.aspace.clone()
    }

    pub fn clock(&self) -> Rc<Clock> {
        self.clock.clone()
    }

    pub fn keyboard(&self) -> Shared<Keyboard> {
        self.keyboard.clone()
    }

    pub fn ram(&self) -> Shared<Ram> {
        self.ram.clone()
    }

    pub fn set_cpu(&mut self, cpu: Box<dyn Cpu>) {
        self.cpu = Some(cpu);
    }

    pub fn take_cpu(&mut self) -> Option<Box<dyn Cpu>> {
        self.cpu.take()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.aspace.read(addr, ReadMode::Read)
    }

    pub fn write(&self, addr: u16, value: u8) {
        self.aspace.write(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_core::Clockable;
    use trio8_emu::zx::{parity, HeaderBlock, FLAG_DATA};

    struct Ticker;
    impl Clockable for Ticker {
        fn tick(&mut self, _clock: &Clock) -> u64 {
            1
        }
    }

    fn setup() -> ZxSpectrum {
        let mut rom = vec![0x00u8; ROM_SIZE];
        rom[0] = 0xf3;
        ZxSpectrum::build_with_rom(Rom::new_with_data("rom", &rom), ControlChannel::new())
    }

    fn data_block(payload: &[u8]) -> Vec<u8> {
        let mut block = vec![FLAG_DATA];
        block.extend_from_slice(payload);
        let parity = parity(&block);
        block.push(parity);
        block
    }

    #[test]
    fn memory_layout() {
        let zx = setup();
        assert_eq!(0xf3, zx.read(0x0000));
        // ROM is write protected
        zx.write(0x0000, 0x55);
        assert_eq!(0xf3, zx.read(0x0000));
        zx.write(0x4000, 0x55);
        assert_eq!(0x55, zx.read(0x4000));
        zx.write(0xffff, 0xaa);
        assert_eq!(0xaa, zx.read(0xffff));
    }

    #[test]
    fn ear_renders_pilot_tone() {
        let mut zx = setup();
        // 3.5 MHz: scale scheduler steps to microseconds is not 1:1, attach
        // a ticker and convert through time_us
        zx.clock().attach(new_shared(Ticker));
        let header = HeaderBlock {
            block_type: 3,
            name: *b"noise     ",
            length: 2,
            param1: 0,
            param2: 0,
        };
        zx.attach_tape(TapReader::from_blocks(vec![header.to_block()]));
        let mut transitions = 0;
        let mut level = zx.ear_level();
        for _ in 0..20000 {
            zx.clock().run_steps(350); // 100 us
            let sample = zx.ear_level();
            if sample != level {
                level = sample;
                transitions += 1;
            }
        }
        assert!(transitions > 100);
    }

    #[test]
    fn mic_writes_record_blocks() {
        let mut zx = setup();
        zx.clock().attach(new_shared(Ticker));
        let block = data_block(&[0x12, 0x34]);
        let mut player = TapPlayer::new(TapReader::from_blocks(vec![block.clone()]));
        let mut mic = false;
        while let Some(duration) = player.next_pulse() {
            mic = !mic;
            let steps = duration * u64::from(FREQUENCY) / 1_000_000;
            zx.clock().run_steps(steps as usize);
            zx.ula_write(0x00fe, if mic { 0x08 } else { 0x00 });
        }
        // final edge to close the last pulse
        zx.clock().run_steps(3500 * 2);
        zx.ula_write(0x00fe, if mic { 0x00 } else { 0x08 });
        assert_eq!(vec![block], zx.take_recorded_blocks());
    }

    #[test]
    fn keyboard_on_ula_port() {
        let mut zx = setup();
        zx.keyboard()
            .borrow_mut()
            .key_pressed(trio8_core::keyboard::Key::P);
        // P is half-row A13, column D0
        let value = zx.ula_read(0xdffe);
        assert_eq!(0, value & 0x01);
        assert_ne!(0, value & 0xa0);
    }
}
