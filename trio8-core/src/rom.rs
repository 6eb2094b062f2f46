// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::device::{Device, ReadMode};
use crate::error::{Error, Result};

pub struct Rom {
    label: String,
    data: Vec<u8>,
}

impl Rom {
    pub fn new_with_data(label: &str, data: &[u8]) -> Self {
        Self {
            label: label.to_string(),
            data: data.to_vec(),
        }
    }

    /// Initialise with `count` bytes from a reader; `count` of 0 means read
    /// to end.
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

    /// Load from a file whose SHA-256 digest must equal `digest`.
    pub fn new_with_digest(label: &str, path: &Path, digest: &str) -> Result<Self> {
        let rom = Self::load(label, path)?;
        let signature = rom.signature();
        if signature != digest.to_lowercase() {
            return Err(Error::Io(format!(
                "{}: invalid signature: expected {}, calculated {}",
                path.display(),
                digest,
                signature
            )));
        }
        Ok(rom)
    }

    /// Load from a file that must be exactly `size` bytes long (0 disables
    /// the check).
    pub fn new_with_size(label: &str, path: &Path, size: usize) -> Result<Self> {
        let rom = Self::load(label, path)?;
        if size > 0 && rom.data.len() != size {
            return Err(Error::Io(format!(
                "{}: invalid file size {}, it must be {}",
                path.display(),
                rom.data.len(),
                size
            )));
        }
        Ok(rom)
    }

    fn load(label: &str, path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|err| Error::Io(format!("{}: {}", path.display(), err)))?;
        Self::from_reader(label, &mut file, 0)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    /// SHA-256 digest of the ROM contents as a lowercase hex string.
    pub fn signature(&self) -> String {
        let digest = Sha256::digest(&self.data);
        let mut text = String::with_capacity(64);
        for byte in digest {
            text.push_str(&format!("{:02x}", byte));
        }
        text
    }
}

impl Device for Rom {
    fn kind(&self) -> &'static str {
        "ROM"
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
        trace!(target: "device",
            "{}: write attempt at offset {:04x}, data {:02x}, ignored", self.label, offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_is_ignored() {
        let mut rom = Rom::new_with_data("rom", &[1, 2, 3]);
        rom.write(1, 0xff);
        assert_eq!(2, rom.read(1, ReadMode::Read));
    }

    #[test]
    fn signature_matches_known_digest() {
        // sha256 of the empty input.
        let rom = Rom::new_with_data("rom", &[]);
        assert_eq!(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            rom.signature()
        );
    }

    #[test]
    fn digest_and_size_checks() {
        let dir = std::env::temp_dir().join(format!("trio8-rom-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("basic.rom");
        std::fs::write(&path, b"hello").unwrap();
        let digest = Rom::new_with_data("rom", b"hello").signature();
        assert!(Rom::new_with_digest("basic", &path, &digest).is_ok());
        assert!(Rom::new_with_digest("basic", &path, "1234").is_err());
        assert!(Rom::new_with_size("basic", &path, 5).is_ok());
        assert!(Rom::new_with_size("basic", &path, 9).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
