// This file is part of trio8.
// Copyright (c) 2019-2026 The trio8 developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Line editor for the monitor: prompt, input history and history
/// persistence. History lives in memory and is appended to the history
/// file as commands are entered.
pub struct Readline {
    history: Vec<String>,
    histfile: Option<PathBuf>,
}

impl Readline {
    pub fn new(histfile: Option<PathBuf>) -> Self {
        let history = histfile
            .as_ref()
            .and_then(|path| fs::read_to_string(path).ok())
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default();
        Self { history, histfile }
    }

    /// Print the prompt and read one line from standard input. Returns None
    /// at end of input.
    pub fn getline(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let stdin = io::stdin();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(&['\n', '\r'][..]).to_string();
        self.push(&line);
        Ok(Some(line))
    }

    pub fn write(&self, text: &str) {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn push(&mut self, line: &str) {
        if line.is_empty() || self.history.last().map(String::as_str) == Some(line) {
            return;
        }
        self.history.push(line.to_string());
        if let Some(ref path) = self.histfile {
            let entry = OpenOptions::new().create(true).append(true).open(path);
            match entry {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", line);
                }
                Err(err) => {
                    warn!(target: "monitor", "Can't write history {}: {}", path.display(), err);
                }
            }
        }
    }
}
