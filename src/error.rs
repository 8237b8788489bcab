// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No visible window belongs to the target process (or it refused focus).
    #[error("target window for '{0}' not found")]
    TargetNotFound(String),

    #[error("input injection via {mechanism} failed: {reason}")]
    Injection {
        mechanism: &'static str,
        reason: String,
    },

    #[error("image '{reference}' unavailable: {reason}")]
    Image { reference: String, reason: String },

    #[error("clipboard: {0}")]
    Clipboard(String),

    #[error("no message can be selected (pool empty or all weights are zero)")]
    NoSelection,

    #[error("a send loop is already running")]
    AlreadyRunning,

    #[error("message pool is gone")]
    PoolClosed,

    #[error("no message at index {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid hotkey '{0}'")]
    Hotkey(String),

    #[error("invalid color '{0}'")]
    Color(String),

    #[error("invalid settings: {0}")]
    Config(String),

    #[error("desktop automation is not supported on this platform")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[cfg(windows)]
    pub(crate) fn injection(mechanism: &'static str, reason: impl ToString) -> Self {
        Error::Injection { mechanism, reason: reason.to_string() }
    }

    pub(crate) fn image(reference: &str, reason: impl ToString) -> Self {
        Error::Image { reference: reference.to_string(), reason: reason.to_string() }
    }
}
