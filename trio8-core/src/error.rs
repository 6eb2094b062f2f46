// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;

use thiserror::Error;

/// Failure taxonomy shared by all trio8 crates. Constructors validate their
/// inputs and fail fast; no partially initialised object survives an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid cartridge: {0}")]
    InvalidCartridge(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("logger error: {0}")]
    Logger(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
