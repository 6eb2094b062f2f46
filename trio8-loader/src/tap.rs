// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use trio8_core::{Error, Result};
use trio8_emu::zx::TapReader;

// SPEC: https://sinclair.wiki.zxnet.co.uk/wiki/TAP_format
//
// A TAP container is a plain sequence of (u16 little-endian length, block)
// records. Each block carries its flag byte first and its XOR parity last.

/// Read every block of a TAP container.
pub fn load(reader: &mut dyn Read) -> Result<TapReader> {
    let mut blocks = Vec::new();
    loop {
        let length = match reader.read_u16::<LittleEndian>() {
            Ok(length) => length,
            Err(ref err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(Error::Io(err.to_string())),
        };
        let mut block = vec![0u8; length as usize];
        reader
            .read_exact(&mut block)
            .map_err(|_| Error::Io(format!("truncated TAP block, expected {} bytes", length)))?;
        blocks.push(block);
    }
    info!(target: "loader", "Found TAP with {} blocks", blocks.len());
    Ok(TapReader::from_blocks(blocks))
}

/// Append one block to a TAP container.
pub fn append_block(writer: &mut dyn Write, block: &[u8]) -> Result<()> {
    if block.len() > u16::MAX as usize {
        return Err(Error::InvalidArgument(format!(
            "TAP block too large: {} bytes",
            block.len()
        )));
    }
    writer
        .write_u16::<LittleEndian>(block.len() as u16)
        .and_then(|_| writer.write_all(block))
        .map_err(|err| Error::Io(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trio8_emu::zx::{parity, FLAG_DATA};

    fn block(payload: &[u8]) -> Vec<u8> {
        let mut block = vec![FLAG_DATA];
        block.extend_from_slice(payload);
        let parity = parity(&block);
        block.push(parity);
        block
    }

    #[test]
    fn container_roundtrip() {
        let blocks = vec![block(&[1, 2, 3]), block(&[4, 5])];
        let mut image = Vec::new();
        for b in &blocks {
            append_block(&mut image, b).unwrap();
        }
        let mut reader = load(&mut &image[..]).unwrap();
        assert_eq!(Some(&blocks[0][..]), reader.next_block());
        assert_eq!(Some(&blocks[1][..]), reader.next_block());
        assert_eq!(None, reader.next_block());
    }

    #[test]
    fn truncated_block_rejected() {
        let mut image = Vec::new();
        append_block(&mut image, &block(&[1, 2, 3])).unwrap();
        image.truncate(image.len() - 1);
        assert!(load(&mut &image[..]).is_err());
    }
}
