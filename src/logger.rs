// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

// ── Logging (Ring-Buffer im RAM, Flush auf Disk) ────

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

pub const LOG_MAX: usize = 200;

/// The log pane: last `LOG_MAX` lines in memory, mirrored to a file.
pub struct LogPane {
    buf: Mutex<VecDeque<String>>,
    file: Option<PathBuf>,
    echo: bool,
    level: LevelFilter,
}

impl LogPane {
    pub fn new(file: Option<PathBuf>, echo: bool, level: LevelFilter) -> Self {
        Self { buf: Mutex::new(VecDeque::with_capacity(LOG_MAX + 1)), file, echo, level }
    }

    pub fn lines(&self) -> Vec<String> {
        match self.buf.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn push(&self, line: String) {
        let mut guard = match self.buf.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push_back(line);
        while guard.len() > LOG_MAX {
            guard.pop_front();
        }
        let Some(path) = &self.file else { return };
        let content: String = guard.iter().map(|l| l.as_str()).collect::<Vec<_>>().join("\n") + "\n";
        drop(guard); // Release lock before IO
        let _ = fs::write(path, content);
    }
}

pub fn format_line(level: Level, args: &std::fmt::Arguments<'_>) -> String {
    format!("[{}] {:<5} {}", Local::now().format("%H:%M:%S%.3f"), level, args)
}

impl Log for LogPane {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("autosend")
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.args());
        if self.echo {
            let _ = writeln!(std::io::stderr(), "{line}");
        }
        self.push(line);
    }

    fn flush(&self) {}
}

static PANE: OnceLock<LogPane> = OnceLock::new();

/// Install the global logger. Later calls return the pane installed first.
pub fn init(file: Option<PathBuf>, level: LevelFilter) -> &'static LogPane {
    if let Some(dir) = file.as_ref().and_then(|f| f.parent()) {
        let _ = fs::create_dir_all(dir);
    }
    let mut fresh = false;
    let pane = PANE.get_or_init(|| {
        fresh = true;
        LogPane::new(file, true, level)
    });
    if fresh && log::set_logger(pane).is_ok() {
        log::set_max_level(level);
    }
    pane
}
