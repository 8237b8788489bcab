// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Settings file: colors, hotkeys, duplicate policy and send loop parameters.
//!
//! One flat JSON object with PascalCase keys. The loop parameters live in a
//! nested `Sender` object. A missing or broken file falls back to defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::hotkey::{Hotkey, HotkeyAction};

pub const APP_DIR: &str = "autosend";
pub const SETTINGS_FILE: &str = "settings.json";
pub const MESSAGES_FILE: &str = "messages.json";
pub const LOG_FILE: &str = "autosend.log";

/// Config directory, e.g. `%APPDATA%\autosend`. Falls back to the working dir.
pub fn default_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ── Farben ──────────────────────────────────────────

/// 0xAARRGGBB. Stored as a signed 32-bit integer like .NET `Color.ToArgb()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argb(pub u32);

impl Argb {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Argb(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl FromStr for Argb {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let value = u32::from_str_radix(hex, 16).map_err(|_| Error::Color(s.to_string()))?;
        match hex.len() {
            6 => Ok(Argb(0xFF00_0000 | value)),
            8 => Ok(Argb(value)),
            _ => Err(Error::Color(s.to_string())),
        }
    }
}

impl Serialize for Argb {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_i32(self.0 as i32)
    }
}

impl<'de> Deserialize<'de> for Argb {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = i64::deserialize(d)?;
        if raw < i32::MIN as i64 || raw > u32::MAX as i64 {
            return Err(serde::de::Error::custom(format!("ARGB value {raw} out of range")));
        }
        Ok(Argb(raw as u32))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Palette {
    pub background_color: Argb,
    pub text_color: Argb,
    pub accent_color: Argb,
    pub button_color: Argb,
    pub log_color: Argb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background_color: Argb::rgb(0x32, 0x37, 0x41),
            text_color: Argb::rgb(0xD0, 0xD0, 0xD0),
            accent_color: Argb::rgb(0x73, 0x78, 0x82),
            button_color: Argb::rgb(0x50, 0x55, 0x5F),
            log_color: Argb::rgb(0xC8, 0xCD, 0xD7),
        }
    }
}

impl Palette {
    pub fn set(&mut self, name: &str, color: Argb) -> Result<()> {
        let slot = match name.to_lowercase().as_str() {
            "background" => &mut self.background_color,
            "text" => &mut self.text_color,
            "accent" => &mut self.accent_color,
            "button" => &mut self.button_color,
            "log" => &mut self.log_color,
            _ => {
                return Err(Error::Config(format!(
                    "unknown color '{name}' (background|text|accent|button|log)"
                )))
            }
        };
        *slot = color;
        Ok(())
    }

    pub fn entries(&self) -> [(&'static str, Argb); 5] {
        [
            ("background", self.background_color),
            ("text", self.text_color),
            ("accent", self.accent_color),
            ("button", self.button_color),
            ("log", self.log_color),
        ]
    }
}

// ── Hotkeys ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HotkeyBindings {
    pub start_hotkey: Hotkey,
    pub stop_hotkey: Hotkey,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self { start_hotkey: Hotkey::plain("f6"), stop_hotkey: Hotkey::plain("f7") }
    }
}

impl HotkeyBindings {
    pub fn bind(&mut self, action: HotkeyAction, hotkey: Hotkey) {
        match action {
            HotkeyAction::Start => self.start_hotkey = hotkey,
            HotkeyAction::Stop => self.stop_hotkey = hotkey,
        }
    }
}

// ── Send loop parameters ────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SenderConfig {
    /// Executable of the chat application, e.g. `KakaoTalk.exe`.
    pub target_process: String,
    /// Messages to send before stopping. `None` runs until stopped.
    pub loop_count: Option<u32>,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub target_retry_ms: u64,
    /// Consecutive failed lookups before giving up. `None` retries forever.
    pub max_target_checks: Option<u32>,
    pub image_attempts: u32,
    pub image_retry_ms: u64,
    pub focus_settle_ms: u64,
    pub paste_settle_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target_process: "KakaoTalk.exe".into(),
            loop_count: None,
            min_delay_ms: 3_000,
            max_delay_ms: 8_000,
            target_retry_ms: 5_000,
            max_target_checks: Some(120),
            image_attempts: 3,
            image_retry_ms: 300,
            focus_settle_ms: 200,
            paste_settle_ms: 400,
        }
    }
}

impl SenderConfig {
    pub fn target_retry(&self) -> Duration {
        Duration::from_millis(self.target_retry_ms)
    }

    pub fn image_retry(&self) -> Duration {
        Duration::from_millis(self.image_retry_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_process.trim().is_empty() {
            return Err(Error::Config("target process is empty".into()));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(Error::Config(format!(
                "delay range is inverted ({} > {} ms)",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if self.image_attempts == 0 {
            return Err(Error::Config("image attempts must be at least 1".into()));
        }
        if self.max_target_checks == Some(0) {
            return Err(Error::Config("max target checks must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Settings ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    #[serde(flatten)]
    pub colors: Palette,
    #[serde(flatten)]
    pub hotkeys: HotkeyBindings,
    pub allow_duplicates: bool,
    pub sender: SenderConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            colors: Palette::default(),
            hotkeys: HotkeyBindings::default(),
            allow_duplicates: false,
            sender: SenderConfig::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.sender.validate()?;
        if self.hotkeys.start_hotkey == self.hotkeys.stop_hotkey {
            return Err(Error::Config(format!(
                "start and stop share the hotkey '{}'",
                self.hotkeys.start_hotkey
            )));
        }
        Ok(())
    }

    /// Never fails: unreadable or invalid files give defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Settings>(&json) {
                Ok(settings) => {
                    info!("settings loaded from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("settings in {} are invalid ({e}), using defaults", path.display());
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!("settings file {} unreadable ({e}), using defaults", path.display());
                Settings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("settings saved to {}", path.display());
        Ok(())
    }
}
