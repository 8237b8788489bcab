// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Resolves a message's image reference (URL or local path) into RGBA pixels
//! ready for the clipboard.

use std::fs;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Decoded image, 4 bytes per pixel (RGBA), row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

pub fn is_url(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn decode(reference: &str, bytes: &[u8]) -> Result<ClipImage> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::image(reference, e))?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(ClipImage { width: w as usize, height: h as usize, rgba: rgba.into_raw() })
}

#[derive(Debug, Clone)]
pub struct ImageLoader {
    http: reqwest::Client,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    pub async fn load(&self, reference: &str) -> Result<ClipImage> {
        let reference = reference.trim();
        let bytes = if is_url(reference) {
            self.fetch(reference).await?
        } else {
            fs::read(reference).map_err(|e| Error::image(reference, e))?
        };
        debug!("image: {} bytes from '{}'", bytes.len(), reference);
        decode(reference, &bytes)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::image(url, e))?;
        let body = resp.bytes().await.map_err(|e| Error::image(url, e))?;
        Ok(body.to_vec())
    }
}
