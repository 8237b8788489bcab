// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Weighted sampling over the message pool.

use rand::Rng;

use crate::error::{Error, Result};
use crate::message::Message;

/// Pick an index with probability `weight / total` (cumulative sum scan).
/// Returns `None` when the total weight is zero.
pub fn pick_index<R: Rng + ?Sized>(messages: &[Message], rng: &mut R) -> Option<usize> {
    let total: u64 = messages.iter().map(|m| m.weight as u64).sum();
    if total == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for (i, m) in messages.iter().enumerate() {
        cumulative += m.weight as u64;
        if roll < cumulative {
            return Some(i);
        }
    }
    None
}

/// Master list plus the not-yet-drawn remainder of the current cycle.
#[derive(Debug, Clone)]
pub struct Pool {
    all: Vec<Message>,
    available: Vec<Message>,
    allow_duplicates: bool,
}

impl Pool {
    pub fn new(all: Vec<Message>, allow_duplicates: bool) -> Self {
        let available = all.clone();
        Self { all, available, allow_duplicates }
    }

    /// Swap the master list. Starts a fresh cycle.
    pub fn replace(&mut self, all: Vec<Message>) {
        self.available = all.clone();
        self.all = all;
    }

    pub fn set_allow_duplicates(&mut self, allow: bool) {
        self.allow_duplicates = allow;
        self.refill();
    }

    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Messages left in the current cycle.
    pub fn remaining(&self) -> usize {
        if self.allow_duplicates {
            self.all.len()
        } else {
            self.available.len()
        }
    }

    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Message> {
        if self.is_empty() {
            return Err(Error::NoSelection);
        }
        if self.allow_duplicates {
            let i = pick_index(&self.all, rng).ok_or(Error::NoSelection)?;
            return Ok(self.all[i].clone());
        }

        if self.available.is_empty() {
            self.refill();
        }
        if let Some(i) = pick_index(&self.available, rng) {
            return Ok(self.available.remove(i));
        }

        // Only zero-weight leftovers: the cycle is spent.
        if self.available.len() != self.all.len() {
            self.refill();
            if let Some(i) = pick_index(&self.available, rng) {
                return Ok(self.available.remove(i));
            }
        }
        Err(Error::NoSelection)
    }

    fn refill(&mut self) {
        self.available = self.all.clone();
    }
}
