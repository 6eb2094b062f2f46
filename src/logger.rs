// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::str::FromStr;

use log::{Level, LevelFilter, Log, Metadata, Record};
use trio8_core::{Error, Result};

/// Stderr logger with a global level and per-target overrides, e.g.
/// `--log mem=trace` raises only the bank-switching traces.
pub struct Logger {
    level: LevelFilter,
    targets: HashMap<String, LevelFilter>,
}

impl Logger {
    pub fn build(level: &str, target_levels: &[(String, String)]) -> Result<Logger> {
        let level = LevelFilter::from_str(level)
            .map_err(|_| Error::Logger(format!("invalid log level {}", level)))?;
        let mut targets = HashMap::new();
        for (target, target_level) in target_levels {
            let filter = LevelFilter::from_str(target_level).map_err(|_| {
                Error::Logger(format!(
                    "invalid log level {} for target {}",
                    target_level, target
                ))
            })?;
            targets.insert(target.clone(), filter);
        }
        Ok(Logger { level, targets })
    }

    pub fn enable(logger: Logger) -> Result<()> {
        let max = logger
            .targets
            .values()
            .copied()
            .chain(std::iter::once(logger.level))
            .max()
            .unwrap_or(LevelFilter::Info);
        log::set_boxed_logger(Box::new(logger))
            .map_err(|_| Error::Logger("cannot initialize logging".to_string()))?;
        log::set_max_level(max);
        Ok(())
    }

    fn target_level(&self, target: &str) -> LevelFilter {
        self.targets
            .iter()
            .find(|(prefix, _)| target.starts_with(prefix.as_str()))
            .map(|(_, level)| *level)
            .unwrap_or(self.level)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.target_level(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "T",
        };
        eprintln!("{} [{}] {}", prefix, record.target(), record.args());
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_overrides_global_level() {
        let logger = Logger::build(
            "info",
            &[("mem".to_string(), "trace".to_string())],
        )
        .unwrap();
        assert_eq!(LevelFilter::Trace, logger.target_level("mem::banks"));
        assert_eq!(LevelFilter::Info, logger.target_level("cart"));
    }

    #[test]
    fn invalid_level_rejected() {
        assert!(Logger::build("noisy", &[]).is_err());
    }
}
