// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OS backend selection. Only Win32 is implemented; elsewhere every entry
//! point reports `Error::Unsupported`.

use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::desktop::{Backend, TargetWindow};
use crate::error::Result;
use crate::hotkey::Hotkey;

#[cfg(windows)]
mod win32;

/// Background poller for one hotkey. Stops when dropped.
pub struct HotkeyWatch {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for HotkeyWatch {
    fn drop(&mut self) {
        self.stop.store(true, SeqCst);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Run a stretch of synchronous input work (keystroke pacing, focus waits)
/// without stalling the other tasks on a multi-threaded runtime.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};
    match Handle::try_current() {
        Ok(h) if h.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
        _ => f(),
    }
}

#[cfg(windows)]
pub fn open() -> Result<Backend> {
    Ok(Backend {
        desktop: Box::new(win32::Win32Desktop),
        primary: Box::new(win32::SendInputKeyboard::default()),
        fallback: Box::new(win32::EnigoKeyboard),
    })
}

#[cfg(windows)]
pub fn list_windows() -> Result<Vec<TargetWindow>> {
    Ok(unsafe { win32::visible_windows() })
}

/// Call `on_press` every time `hotkey` goes down.
#[cfg(windows)]
pub fn watch_hotkey(hotkey: &Hotkey, on_press: impl Fn() + Send + 'static) -> Result<HotkeyWatch> {
    let stop = Arc::new(AtomicBool::new(false));
    let thread = win32::poll_hotkey(hotkey, stop.clone(), on_press)?;
    Ok(HotkeyWatch { stop, thread: Some(thread) })
}

#[cfg(not(windows))]
pub fn open() -> Result<Backend> {
    Err(crate::error::Error::Unsupported)
}

#[cfg(not(windows))]
pub fn list_windows() -> Result<Vec<TargetWindow>> {
    Err(crate::error::Error::Unsupported)
}

#[cfg(not(windows))]
pub fn watch_hotkey(_hotkey: &Hotkey, _on_press: impl Fn() + Send + 'static) -> Result<HotkeyWatch> {
    Err(crate::error::Error::Unsupported)
}
