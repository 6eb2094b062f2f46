// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

pub mod crt;
pub mod ines;
pub mod tap;
pub mod zx;

use std::path::Path;

use sha2::{Digest, Sha256};
use trio8_core::{Error, Result};

/// Image kinds recognised by file extension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImageKind {
    Crt,
    Ines,
    Tap,
    ZxO,
    ZxP,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Result<ImageKind> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "crt" => Ok(ImageKind::Crt),
            "nes" => Ok(ImageKind::Ines),
            "tap" => Ok(ImageKind::Tap),
            "o" | "80" => Ok(ImageKind::ZxO),
            "p" | "81" => Ok(ImageKind::ZxP),
            other => Err(Error::InvalidArgument(format!(
                "unknown image type \"{}\"",
                other
            ))),
        }
    }
}

/// SHA-256 digest of a byte buffer as lowercase hex, used to derive stable
/// per-image file names for persistent state.
pub fn digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut text = String::with_capacity(64);
    for byte in digest {
        text.push_str(&format!("{:02x}", byte));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_kind_by_extension() {
        assert_eq!(
            ImageKind::Crt,
            ImageKind::from_path(Path::new("games/last_ninja.CRT")).unwrap()
        );
        assert_eq!(
            ImageKind::Ines,
            ImageKind::from_path(Path::new("smb.nes")).unwrap()
        );
        assert!(ImageKind::from_path(Path::new("readme.txt")).is_err());
    }
}
