// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use trio8_core::{Error, Result};

// SPEC: https://sinclair.wiki.zxnet.co.uk/wiki/TAP_format
//
// ZX-Spectrum tape blocks: a pilot tone, two sync pulses, then two equal
// pulses per data bit. Header blocks (flag 0x00) announce type, name and
// length; data blocks (flag 0xff) carry the payload. The last byte of every
// block is the XOR parity of the preceding bytes.

pub const PILOT_PULSE_TIME: u64 = 619;
pub const PILOT_PULSE_COUNT_HEADER: u32 = 4032;
pub const PILOT_PULSE_COUNT_DATA: u32 = 1612;
pub const SYNC1_PULSE_TIME: u64 = 190;
pub const SYNC2_PULSE_TIME: u64 = 210;
pub const BIT_0_PULSE_TIME: u64 = 244;
pub const BIT_1_PULSE_TIME: u64 = 488;
pub const PAUSE_TIME: u64 = 500_000;

const SYNC_TOLERANCE: u64 = 25;
const BIT_TOLERANCE: u64 = 60;
const PILOT_TOLERANCE: u64 = 70;
const MIN_PILOT_PULSES: u32 = 32;

pub const FLAG_HEADER: u8 = 0x00;
pub const FLAG_DATA: u8 = 0xff;

/// XOR parity over a byte slice.
pub fn parity(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

/// The 17-byte payload of a header block (without flag and parity).
pub struct HeaderBlock {
    pub block_type: u8,
    pub name: [u8; 10],
    pub length: u16,
    pub param1: u16,
    pub param2: u16,
}

impl HeaderBlock {
    /// Decode from a full tape block (flag + payload + parity).
    pub fn from_block(block: &[u8]) -> Option<Self> {
        if block.len() != 19 || block[0] != FLAG_HEADER {
            return None;
        }
        let mut name = [0u8; 10];
        name.copy_from_slice(&block[2..12]);
        Some(Self {
            block_type: block[1],
            name,
            length: u16::from_le_bytes([block[12], block[13]]),
            param1: u16::from_le_bytes([block[14], block[15]]),
            param2: u16::from_le_bytes([block[16], block[17]]),
        })
    }

    /// Encode as a full tape block with flag and parity.
    pub fn to_block(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(19);
        block.push(FLAG_HEADER);
        block.push(self.block_type);
        block.extend_from_slice(&self.name);
        block.extend_from_slice(&self.length.to_le_bytes());
        block.extend_from_slice(&self.param1.to_le_bytes());
        block.extend_from_slice(&self.param2.to_le_bytes());
        let parity = parity(&block);
        block.push(parity);
        block
    }

    pub fn name_string(&self) -> String {
        String::from_utf8_lossy(&self.name).trim_end().to_string()
    }
}

/// Sequence of tape blocks read from a TAP container.
pub struct TapReader {
    blocks: Vec<Vec<u8>>,
    pos: usize,
}

impl TapReader {
    pub fn from_blocks(blocks: Vec<Vec<u8>>) -> Self {
        Self { blocks, pos: 0 }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn next_block(&mut self) -> Option<&[u8]> {
        if self.pos < self.blocks.len() {
            let block = &self.blocks[self.pos];
            self.pos += 1;
            Some(block)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.blocks.len()
    }
}

enum PlayState {
    NextBlock,
    Pilot(u32),
    Sync1,
    Sync2,
    Data { index: usize, bit: u8, half: bool },
    Pause,
    Done,
}

/// Renders a TAP block sequence as a pulse stream. Each pulse is one
/// half-wave; the line level toggles on every pulse.
pub struct TapPlayer {
    reader: TapReader,
    state: PlayState,
    block: Vec<u8>,
    level: bool,
}

impl TapPlayer {
    pub fn new(reader: TapReader) -> Self {
        Self {
            reader,
            state: PlayState::NextBlock,
            block: Vec::new(),
            level: false,
        }
    }

    pub fn level(&self) -> bool {
        self.level
    }

    /// Direct access to the underlying block sequence (fast load).
    pub fn reader_mut(&mut self) -> &mut TapReader {
        &mut self.reader
    }

    /// Duration in microseconds of the next pulse, or None at end of tape.
    pub fn next_pulse(&mut self) -> Option<u64> {
        loop {
            match self.state {
                PlayState::NextBlock => {
                    match self.reader.next_block() {
                        Some(block) => {
                            self.block = block.to_vec();
                            let count = if self.block.first() == Some(&FLAG_HEADER) {
                                PILOT_PULSE_COUNT_HEADER
                            } else {
                                PILOT_PULSE_COUNT_DATA
                            };
                            self.state = PlayState::Pilot(count);
                        }
                        None => {
                            self.state = PlayState::Done;
                        }
                    }
                    continue;
                }
                PlayState::Pilot(remaining) => {
                    if remaining == 0 {
                        self.state = PlayState::Sync1;
                        continue;
                    }
                    self.state = PlayState::Pilot(remaining - 1);
                    self.level = !self.level;
                    return Some(PILOT_PULSE_TIME);
                }
                PlayState::Sync1 => {
                    self.state = PlayState::Sync2;
                    self.level = !self.level;
                    return Some(SYNC1_PULSE_TIME);
                }
                PlayState::Sync2 => {
                    self.state = PlayState::Data {
                        index: 0,
                        bit: 0x80,
                        half: false,
                    };
                    self.level = !self.level;
                    return Some(SYNC2_PULSE_TIME);
                }
                PlayState::Data { index, bit, half } => {
                    if index >= self.block.len() {
                        self.state = PlayState::Pause;
                        continue;
                    }
                    let one = self.block[index] & bit != 0;
                    let duration = if one { BIT_1_PULSE_TIME } else { BIT_0_PULSE_TIME };
                    self.state = if !half {
                        PlayState::Data {
                            index,
                            bit,
                            half: true,
                        }
                    } else if bit == 1 {
                        PlayState::Data {
                            index: index + 1,
                            bit: 0x80,
                            half: false,
                        }
                    } else {
                        PlayState::Data {
                            index,
                            bit: bit >> 1,
                            half: false,
                        }
                    };
                    self.level = !self.level;
                    return Some(duration);
                }
                PlayState::Pause => {
                    self.state = PlayState::NextBlock;
                    self.level = false;
                    return Some(PAUSE_TIME);
                }
                PlayState::Done => return None,
            }
        }
    }
}

enum RecordState {
    Pilot(u32),
    Sync,
    Data,
}

/// Rebuilds tape blocks from a measured pulse stream. Completed blocks are
/// kept only when their XOR parity closes to zero.
pub struct TapRecorder {
    state: RecordState,
    first_half: Option<u64>,
    bits: u32,
    byte: u8,
    block: Vec<u8>,
    blocks: Vec<Vec<u8>>,
}

fn near(duration: u64, target: u64, tolerance: u64) -> bool {
    duration + tolerance >= target && duration <= target + tolerance
}

impl TapRecorder {
    pub fn new() -> Self {
        Self {
            state: RecordState::Pilot(0),
            first_half: None,
            bits: 0,
            byte: 0,
            block: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Feed one measured pulse (half-wave duration in microseconds).
    pub fn pulse(&mut self, duration: u64) {
        match self.state {
            RecordState::Pilot(count) => {
                if near(duration, PILOT_PULSE_TIME, PILOT_TOLERANCE) {
                    self.state = RecordState::Pilot(count + 1);
                } else if count >= MIN_PILOT_PULSES
                    && near(duration, SYNC1_PULSE_TIME, SYNC_TOLERANCE)
                {
                    self.state = RecordState::Sync;
                } else {
                    self.state = RecordState::Pilot(0);
                }
            }
            RecordState::Sync => {
                if near(duration, SYNC2_PULSE_TIME, SYNC_TOLERANCE) {
                    self.block.clear();
                    self.bits = 0;
                    self.byte = 0;
                    self.first_half = None;
                    self.state = RecordState::Data;
                } else {
                    self.state = RecordState::Pilot(0);
                }
            }
            RecordState::Data => {
                let zero = near(duration, BIT_0_PULSE_TIME, BIT_TOLERANCE);
                let one = near(duration, BIT_1_PULSE_TIME, BIT_TOLERANCE);
                if !zero && !one {
                    // pilot of the next block or the end-of-stream gap
                    self.finalize();
                    self.state = RecordState::Pilot(u32::from(near(
                        duration,
                        PILOT_PULSE_TIME,
                        PILOT_TOLERANCE,
                    )));
                    return;
                }
                match self.first_half {
                    None => self.first_half = Some(duration),
                    Some(first) => {
                        let bit = near(first, BIT_1_PULSE_TIME, BIT_TOLERANCE);
                        self.first_half = None;
                        self.byte = (self.byte << 1) | bit as u8;
                        self.bits += 1;
                        if self.bits == 8 {
                            self.block.push(self.byte);
                            self.byte = 0;
                            self.bits = 0;
                        }
                    }
                }
            }
        }
    }

    /// Flush a pending block at end of stream.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.finalize();
        self.blocks
    }

    fn finalize(&mut self) {
        if self.block.is_empty() {
            return;
        }
        if self.bits != 0 {
            warn!(target: "tape", "Discarding block with {} stray bits", self.bits);
        } else if parity(&self.block) != 0 {
            warn!(target: "tape", "Discarding block with bad parity, {} bytes", self.block.len());
        } else {
            self.blocks.push(self.block.clone());
        }
        self.block.clear();
        self.bits = 0;
        self.byte = 0;
        self.first_half = None;
    }
}

impl Default for TapRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// -- Fast load

/// Entry of the 48K ROM LD-BYTES routine, the fast-load trap address.
pub const LD_BYTES_TRAP_ADDR: u16 = 0x0556;
/// Common exit of LD-BYTES.
pub const LD_BYTES_RET_ADDR: u16 = 0x05e2;

/// Register window the fast loader needs from the Z80 core.
pub trait FastLoadCpu {
    fn a(&self) -> u8;
    fn set_a(&mut self, value: u8);
    fn ix(&self) -> u16;
    fn set_ix(&mut self, value: u16);
    fn de(&self) -> u16;
    fn set_de(&mut self, value: u16);
    fn set_pc(&mut self, value: u16);
    fn set_carry(&mut self, value: bool);
    fn poke(&mut self, addr: u16, value: u8);
}

/// Replace a pulse-level LD-BYTES execution with a direct copy of the next
/// tape block into memory, leaving the register file as the ROM routine
/// would: IX past the loaded area, DE zero, A zero and carry set on
/// success.
pub fn fast_load(cpu: &mut dyn FastLoadCpu, reader: &mut TapReader) -> Result<()> {
    let requested = cpu.de() as usize;
    let expected_flag = cpu.a();
    let block = reader
        .next_block()
        .ok_or_else(|| Error::Io("end of tape".to_string()))?;
    let flag = *block.first().unwrap_or(&0);
    if flag != expected_flag || block.len() < 2 || block.len() - 2 < requested {
        debug!(target: "tape", "Fast load miss: flag {:02x}, expected {:02x}", flag, expected_flag);
        cpu.set_carry(false);
        cpu.set_pc(LD_BYTES_RET_ADDR);
        return Ok(());
    }
    let data = block[1..1 + requested].to_vec();
    let mut addr = cpu.ix();
    for byte in &data {
        cpu.poke(addr, *byte);
        addr = addr.wrapping_add(1);
    }
    cpu.set_ix(addr);
    cpu.set_de(0);
    cpu.set_a(0);
    cpu.set_carry(true);
    cpu.set_pc(LD_BYTES_RET_ADDR);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_block(payload: &[u8]) -> Vec<u8> {
        let mut block = Vec::with_capacity(payload.len() + 2);
        block.push(FLAG_DATA);
        block.extend_from_slice(payload);
        let parity = parity(&block);
        block.push(parity);
        block
    }

    #[test]
    fn header_block_roundtrip() {
        let header = HeaderBlock {
            block_type: 3,
            name: *b"screen    ",
            length: 6912,
            param1: 16384,
            param2: 32768,
        };
        let block = header.to_block();
        assert_eq!(19, block.len());
        assert_eq!(0, parity(&block));
        let decoded = HeaderBlock::from_block(&block).unwrap();
        assert_eq!(3, decoded.block_type);
        assert_eq!("screen", decoded.name_string());
        assert_eq!(6912, decoded.length);
    }

    #[test]
    fn player_emits_pilot_sync_data() {
        let header = HeaderBlock {
            block_type: 0,
            name: *b"game      ",
            length: 2,
            param1: 0,
            param2: 0,
        };
        let mut player = TapPlayer::new(TapReader::from_blocks(vec![header.to_block()]));
        for _ in 0..PILOT_PULSE_COUNT_HEADER {
            assert_eq!(Some(PILOT_PULSE_TIME), player.next_pulse());
        }
        assert_eq!(Some(SYNC1_PULSE_TIME), player.next_pulse());
        assert_eq!(Some(SYNC2_PULSE_TIME), player.next_pulse());
        // flag byte 0x00: sixteen short pulses
        for _ in 0..16 {
            assert_eq!(Some(BIT_0_PULSE_TIME), player.next_pulse());
        }
    }

    #[test]
    fn pulse_roundtrip_preserves_blocks() {
        let blocks = vec![
            HeaderBlock {
                block_type: 3,
                name: *b"noise     ",
                length: 4,
                param1: 0x4000,
                param2: 0,
            }
            .to_block(),
            data_block(&[0xde, 0xad, 0xbe, 0xef]),
        ];
        let mut player = TapPlayer::new(TapReader::from_blocks(blocks.clone()));
        let mut recorder = TapRecorder::new();
        while let Some(duration) = player.next_pulse() {
            recorder.pulse(duration);
        }
        assert_eq!(blocks, recorder.finish());
    }

    #[test]
    fn recorder_drops_bad_parity() {
        let mut block = data_block(&[1, 2, 3]);
        let last = block.len() - 1;
        block[last] ^= 0xff;
        let mut player = TapPlayer::new(TapReader::from_blocks(vec![block]));
        let mut recorder = TapRecorder::new();
        while let Some(duration) = player.next_pulse() {
            recorder.pulse(duration);
        }
        assert!(recorder.finish().is_empty());
    }

    struct TestCpu {
        a: u8,
        ix: u16,
        de: u16,
        pc: u16,
        carry: bool,
        mem: Vec<u8>,
    }

    impl FastLoadCpu for TestCpu {
        fn a(&self) -> u8 {
            self.a
        }
        fn set_a(&mut self, value: u8) {
            self.a = value;
        }
        fn ix(&self) -> u16 {
            self.ix
        }
        fn set_ix(&mut self, value: u16) {
            self.ix = value;
        }
        fn de(&self) -> u16 {
            self.de
        }
        fn set_de(&mut self, value: u16) {
            self.de = value;
        }
        fn set_pc(&mut self, value: u16) {
            self.pc = value;
        }
        fn set_carry(&mut self, value: bool) {
            self.carry = value;
        }
        fn poke(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    #[test]
    fn fast_load_copies_block() {
        let mut reader = TapReader::from_blocks(vec![data_block(&[0x11, 0x22, 0x33])]);
        let mut cpu = TestCpu {
            a: FLAG_DATA,
            ix: 0x8000,
            de: 3,
            pc: LD_BYTES_TRAP_ADDR,
            carry: false,
            mem: vec![0; 0x10000],
        };
        fast_load(&mut cpu, &mut reader).unwrap();
        assert_eq!(&[0x11, 0x22, 0x33][..], &cpu.mem[0x8000..0x8003]);
        assert_eq!(0x8003, cpu.ix);
        assert_eq!(0, cpu.de);
        assert_eq!(0, cpu.a);
        assert!(cpu.carry);
        assert_eq!(LD_BYTES_RET_ADDR, cpu.pc);
    }

    #[test]
    fn fast_load_flag_mismatch_fails_cleanly() {
        let mut reader = TapReader::from_blocks(vec![data_block(&[0x11])]);
        let mut cpu = TestCpu {
            a: FLAG_HEADER,
            ix: 0x8000,
            de: 1,
            pc: LD_BYTES_TRAP_ADDR,
            carry: true,
            mem: vec![0; 0x10000],
        };
        fast_load(&mut cpu, &mut reader).unwrap();
        assert!(!cpu.carry);
        assert_eq!(LD_BYTES_RET_ADDR, cpu.pc);
    }
}
