// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::Read;

use rand::Rng;

use crate::device::{Device, ReadMode};
use crate::error::{Error, Result};

/// One random byte for every 128 bytes of capacity models the weak cells of
/// an uninitialised DRAM array at power-on.
const RANDOM_BYTES_PER: usize = 128;

pub struct Ram {
    label: String,
    data: Vec<u8>,
}

impl Ram {
    pub fn new(label: &str, capacity: usize) -> Self {
        Self {
            label: label.to_string(),
            data: vec![0x00; capacity],
        }
    }

    /// Initialise with a repeating 64-bit pattern, little-endian byte order.
    /// With `randomize` set, a bounded number of random bytes is written at
    /// random positions. Randomisation happens once; `reset` never repeats it.
    pub fn new_with_pattern(label: &str, capacity: usize, pattern: u64, randomize: bool) -> Self {
        let mut data = vec![0x00; capacity];
        let bytes = pattern.to_le_bytes();
        for (i, value) in data.iter_mut().enumerate() {
            *value = bytes[i % 8];
        }
        if randomize && capacity > 0 {
            let mut rng = rand::thread_rng();
            let count = usize::max(1, capacity / RANDOM_BYTES_PER);
            for _ in 0..count {
                let pos = rng.gen_range(0..capacity);
                data[pos] = rng.gen();
            }
        }
        Self {
            label: label.to_string(),
            data,
        }
    }

    pub fn new_with_data(label: &str, data: &[u8]) -> Self {
        Self {
            label: label.to_string(),
            data: data.to_vec(),
        }
    }

    /// Initialise with up to `count` bytes from a reader; `count` of 0 means
    /// read to end.
    pub fn from_reader(label: &str, reader: &mut dyn Read, count: usize) -> Result<Self> {
        let mut data = Vec::new();
        if count == 0 {
            reader.read_to_end(&mut data)?;
        } else {
            data = vec![0x00; count];
            reader
                .read_exact(&mut data)
                .map_err(|_| Error::Io(format!("{}: short read, expected {} bytes", label, count)))?;
        }
        Ok(Self {
            label: label.to_string(),
            data,
        })
    }

    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, pattern: u8) {
        for byte in self.data.iter_mut() {
            *byte = pattern;
        }
    }

    pub fn load(&mut self, data: &[u8], offset: usize) {
        let mut address = offset;
        let len = self.data.len();
        for byte in data {
            self.data[address % len] = *byte;
            address += 1;
        }
    }
}

impl Device for Ram {
    fn kind(&self) -> &'static str {
        "RAM"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: usize, _mode: ReadMode) -> u8 {
        self.data[offset]
    }

    fn write(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_with_capacity() {
        let ram = Ram::new("ram", 0x10000);
        assert_eq!(0x10000, ram.size());
    }

    #[test]
    fn read_write_roundtrip() {
        let mut ram = Ram::new("ram", 0x10000);
        for addr in (0..0x10000).step_by(0x111) {
            ram.write(addr, (addr & 0xff) as u8);
            assert_eq!((addr & 0xff) as u8, ram.read(addr, ReadMode::Read));
        }
    }

    #[test]
    fn pattern_fill_little_endian() {
        let ram = Ram::new_with_pattern("ram", 16, 0x00ff_00ff_00ff_00ff, false);
        assert_eq!(0xff, ram.buffer()[0]);
        assert_eq!(0x00, ram.buffer()[1]);
        assert_eq!(0xff, ram.buffer()[8]);
    }

    #[test]
    fn reset_preserves_contents() {
        let mut ram = Ram::new("ram", 16);
        ram.write(3, 0x5a);
        ram.reset();
        assert_eq!(0x5a, ram.read(3, ReadMode::Read));
    }

    #[test]
    fn from_reader_short_read_fails() {
        let data = [0u8; 4];
        let result = Ram::from_reader("ram", &mut &data[..], 8);
        assert!(result.is_err());
    }
}
