// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::Read;

use trio8_core::{Error, Result};

// `.o` (ZX-80) and `.p` (ZX-81) files are raw memory images starting at the
// BASIC system area. The cassette interface serves them byte by byte; the
// loaders here only validate and stage them.

/// Load address of `.p` images (ZX-81 system area).
pub const P_LOAD_ADDR: u16 = 0x4000;
/// Load address of `.o` images (ZX-80 system area).
pub const O_LOAD_ADDR: u16 = 0x4000;

/// Largest raw image a 16K machine can take.
const MAX_IMAGE_SIZE: usize = 0x4000;

/// Read a raw ZX-80/81 memory image.
pub fn load(reader: &mut dyn Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|err| Error::Io(err.to_string()))?;
    if data.is_empty() {
        return Err(Error::Io("empty image".to_string()));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(Error::Io(format!(
            "image too large: {} bytes, at most {} supported",
            data.len(),
            MAX_IMAGE_SIZE
        )));
    }
    info!(target: "loader", "Found ZX image, {} bytes", data.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_image() {
        let image = vec![0x42u8; 1024];
        assert_eq!(1024, load(&mut &image[..]).unwrap().len());
    }

    #[test]
    fn rejects_oversized_image() {
        let image = vec![0u8; MAX_IMAGE_SIZE + 1];
        assert!(load(&mut &image[..]).is_err());
    }
}
