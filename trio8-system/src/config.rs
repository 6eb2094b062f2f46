// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use trio8_core::{Error, Result};

// Configuration layering: built-in defaults, overridden by the INI file,
// overridden by command line flags. Section names are case-insensitive,
// keys are case-sensitive.

/// ROM file reference with an optional SHA-256 digest to verify at load.
#[derive(Clone)]
pub struct RomSpec {
    pub path: PathBuf,
    pub digest: Option<String>,
}

impl RomSpec {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            digest: None,
        }
    }

    pub fn with_digest(path: &Path, digest: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            digest: Some(digest.to_string()),
        }
    }
}

pub struct Config {
    sections: HashMap<String, HashMap<String, String>>,
    storage_dir: PathBuf,
}

impl Config {
    pub fn new() -> Self {
        let storage_dir = ProjectDirs::from("", "", "trio8")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".trio8"));
        let mut config = Self {
            sections: HashMap::new(),
            storage_dir,
        };
        config.set("global", "loglevel", "info");
        config.set("global", "delay", "1.0");
        config.set("c64", "model", "pal");
        config.set("zx80", "rom", "8K");
        config
    }

    /// Directory for persistent state: cartridge SRAM dumps and the
    /// monitor history.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn set_storage_dir(&mut self, dir: &Path) {
        self.storage_dir = dir.to_path_buf();
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_lowercase())
            .or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_lowercase())
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(default)
    }

    pub fn get_f64(&self, section: &str, key: &str, default: f64) -> Result<f64> {
        match self.get(section, key) {
            None => Ok(default),
            Some(text) => text.parse().map_err(|_| {
                Error::Config(format!("[{}] {}: invalid number \"{}\"", section, key, text))
            }),
        }
    }

    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool> {
        match self.get(section, key) {
            None => Ok(default),
            Some("yes") | Some("true") | Some("1") => Ok(true),
            Some("no") | Some("false") | Some("0") => Ok(false),
            Some(text) => Err(Error::Config(format!(
                "[{}] {}: invalid boolean \"{}\"",
                section, key, text
            ))),
        }
    }

    /// Merge `[section] key = value` lines from an INI-style file. Blank
    /// lines and `#`/`;` comments are ignored.
    pub fn load(&mut self, reader: &mut dyn Read) -> Result<()> {
        let reader = BufReader::new(reader);
        let mut section = "global".to_string();
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| Error::Config(err.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') {
                if !line.ends_with(']') || line.len() < 3 {
                    return Err(Error::Config(format!(
                        "line {}: malformed section \"{}\"",
                        number + 1,
                        line
                    )));
                }
                section = line[1..line.len() - 1].trim().to_lowercase();
                continue;
            }
            match line.find('=') {
                Some(pos) => {
                    let key = line[..pos].trim();
                    let value = line[pos + 1..].trim();
                    if key.is_empty() {
                        return Err(Error::Config(format!(
                            "line {}: missing key in \"{}\"",
                            number + 1,
                            line
                        )));
                    }
                    self.set(&section, key, value);
                }
                None => {
                    return Err(Error::Config(format!(
                        "line {}: malformed entry \"{}\"",
                        number + 1,
                        line
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
