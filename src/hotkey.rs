// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Key names a hotkey may end in. The Win32 backend maps each one to a VK code.
pub const KEY_NAMES: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
    "enter", "tab", "escape", "space", "backspace", "delete", "insert",
    "home", "end", "pageup", "pagedown", "up", "down", "left", "right",
    "pause", "scrolllock", "printscreen",
];

fn canonical_key(name: &str) -> Option<&'static str> {
    let alias = match name {
        "return" => "enter",
        "esc" => "escape",
        "bs" => "backspace",
        "del" => "delete",
        "ins" => "insert",
        "pgup" => "pageup",
        "pgdn" => "pagedown",
        "break" => "pause",
        "prtsc" => "printscreen",
        other => other,
    };
    KEY_NAMES.iter().copied().find(|k| *k == alias)
}

/// A global key combination such as `ctrl+shift+f9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    pub key: &'static str,
}

impl Hotkey {
    pub const fn plain(key: &'static str) -> Self {
        Self { ctrl: false, alt: false, shift: false, win: false, key }
    }
}

impl FromStr for Hotkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hk = Hotkey::plain("");
        let mut key = None;
        for part in s.split('+').map(|p| p.trim().to_lowercase()) {
            match part.as_str() {
                "ctrl" | "control" => hk.ctrl = true,
                "alt" | "menu" => hk.alt = true,
                "shift" => hk.shift = true,
                "win" | "lwin" | "super" => hk.win = true,
                name => {
                    let k = canonical_key(name).ok_or_else(|| Error::Hotkey(s.to_string()))?;
                    if key.replace(k).is_some() {
                        return Err(Error::Hotkey(s.to_string()));
                    }
                }
            }
        }
        hk.key = key.ok_or_else(|| Error::Hotkey(s.to_string()))?;
        Ok(hk)
    }
}

// `key` points into KEY_NAMES, so the input string need not outlive the value.
impl<'de> Deserialize<'de> for Hotkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Hotkey> for String {
    fn from(hk: Hotkey) -> Self {
        hk.to_string()
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl { f.write_str("ctrl+")?; }
        if self.alt { f.write_str("alt+")?; }
        if self.shift { f.write_str("shift+")?; }
        if self.win { f.write_str("win+")?; }
        f.write_str(self.key)
    }
}

/// Actions a hotkey can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Start,
    Stop,
}

impl FromStr for HotkeyAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            _ => Err(Error::Config(format!("unknown hotkey action '{s}' (start|stop)"))),
        }
    }
}
