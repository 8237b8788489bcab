// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Message file import/export (JSON array of `{Text, Weight, ImageUrl}`).

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::message::{Message, MessageList};

/// Field-by-field view of one entry. Anything may be missing or mistyped.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "Text", default)]
    text: Option<Value>,
    #[serde(rename = "Weight", default)]
    weight: Option<Value>,
    #[serde(rename = "ImageUrl", default)]
    image_url: Option<Value>,
}

pub fn parse_messages(json: &str) -> Result<MessageList> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let mut list = MessageList::default();
    let mut skipped = 0usize;

    for (i, entry) in entries.into_iter().enumerate() {
        let raw: RawMessage = match serde_json::from_value(entry) {
            Ok(r) => r,
            Err(e) => {
                warn!("import: entry {i} is not an object ({e}), skipped");
                skipped += 1;
                continue;
            }
        };
        let text = match raw.text {
            Some(Value::String(s)) => s,
            _ => {
                warn!("import: entry {i} has no Text, skipped");
                skipped += 1;
                continue;
            }
        };
        let weight = match raw.weight {
            None | Some(Value::Null) => 1,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(w) if w < 0 => {
                    warn!("import: entry {i} has negative weight {w}, using 0");
                    0
                }
                Some(w) => u32::try_from(w).unwrap_or(u32::MAX),
                None => {
                    warn!("import: entry {i} has non-integer weight {n}, using 1");
                    1
                }
            },
            Some(other) => {
                warn!("import: entry {i} has weight {other}, using 1");
                1
            }
        };
        let image_ref = match raw.image_url {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        };
        let message = Message { text, weight, image_ref };
        if !message.has_text() && message.image_ref.is_none() {
            warn!("import: entry {i} has neither text nor image, skipped");
            skipped += 1;
            continue;
        }
        list.add(message);
    }

    if skipped > 0 {
        warn!("import: {skipped} entries skipped");
    }
    Ok(list)
}

pub fn to_json(list: &MessageList) -> Result<String> {
    Ok(serde_json::to_string_pretty(list.as_slice())?)
}

pub fn import(path: &Path) -> Result<MessageList> {
    let json = fs::read_to_string(path)?;
    let list = parse_messages(&json)?;
    info!("imported {} messages from {}", list.len(), path.display());
    Ok(list)
}

pub fn export(list: &MessageList, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, to_json(list)?)?;
    info!("exported {} messages to {}", list.len(), path.display());
    Ok(())
}

/// Working list: a missing file is an empty list.
pub fn load_or_empty(path: &Path) -> Result<MessageList> {
    match fs::read_to_string(path) {
        Ok(json) => parse_messages(&json),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MessageList::default()),
        Err(e) => Err(Error::Io(e)),
    }
}
