// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One entry of the message list.
///
/// Serialized with the field names of the message file format:
/// `{"Text": "...", "Weight": 3, "ImageUrl": null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Weight")]
    pub weight: u32,
    #[serde(rename = "ImageUrl")]
    pub image_ref: Option<String>,
}

impl Message {
    /// Checked constructor for user-entered messages: weight >= 1 and
    /// at least one of text or image.
    pub fn new(text: impl Into<String>, weight: u32, image_ref: Option<String>) -> Result<Self> {
        let text = text.into();
        let image_ref = image_ref.filter(|r| !r.trim().is_empty());
        if weight == 0 {
            return Err(Error::InvalidMessage("weight must be at least 1".into()));
        }
        if text.trim().is_empty() && image_ref.is_none() {
            return Err(Error::InvalidMessage("message needs text or an image".into()));
        }
        Ok(Self { text, weight, image_ref })
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Lines as they get typed. A line break keystroke goes between them.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
    }

    /// Short single-line form for logs.
    pub fn preview(&self) -> String {
        const MAX: usize = 40;
        let flat: String = self.text.replace(['\r', '\n'], " ");
        if flat.chars().count() > MAX {
            let cut: String = flat.chars().take(MAX).collect();
            format!("{cut}...")
        } else {
            flat
        }
    }
}

// ── Message list (ordered, user-editable) ───────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageList {
    items: Vec<Message>,
}

impl MessageList {
    pub fn new(items: Vec<Message>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Result<&Message> {
        self.items.get(index).ok_or(Error::IndexOutOfRange { index, len: self.items.len() })
    }

    pub fn add(&mut self, message: Message) -> usize {
        self.items.push(message);
        self.items.len() - 1
    }

    pub fn update(&mut self, index: usize, message: Message) -> Result<Message> {
        self.check(index)?;
        Ok(std::mem::replace(&mut self.items[index], message))
    }

    pub fn remove(&mut self, index: usize) -> Result<Message> {
        self.check(index)?;
        Ok(self.items.remove(index))
    }

    /// Drag-and-drop reorder: the item at `from` ends up at position `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_weight(&self) -> u64 {
        self.items.iter().map(|m| m.weight as u64).sum()
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.items
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange { index, len: self.items.len() })
        }
    }
}

impl From<Vec<Message>> for MessageList {
    fn from(items: Vec<Message>) -> Self {
        Self::new(items)
    }
}
