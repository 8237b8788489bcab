// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OS seams used by the send loop. The Win32 implementation lives in
//! `platform`; tests plug in recording fakes.

use crate::error::Result;
use crate::image_source::ClipImage;

/// A visible top-level window belonging to the target process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWindow {
    /// Raw window handle (HWND on Windows).
    pub handle: isize,
    pub pid: u32,
    pub title: String,
    pub exe: String,
}

/// `KakaoTalk`, `kakaotalk.exe` and `KakaoTalk.EXE` all name the same process.
pub fn process_matches(exe: &str, wanted: &str) -> bool {
    fn stem(s: &str) -> &str {
        let s = s.trim();
        let s = s.rsplit(['\\', '/']).next().unwrap_or(s);
        match s.len().checked_sub(4) {
            Some(cut) if s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(".exe") => &s[..cut],
            _ => s,
        }
    }
    let (a, b) = (stem(exe), stem(wanted));
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

pub trait Desktop: Send {
    fn find_window(&mut self, process: &str) -> Option<TargetWindow>;

    /// Force the window to the foreground.
    fn focus(&mut self, window: &TargetWindow) -> Result<()>;

    fn set_clipboard_image(&mut self, image: &ClipImage) -> Result<()>;

    fn clear_clipboard(&mut self) -> Result<()>;
}

/// One input-simulation mechanism.
pub trait Keyboard: Send {
    fn name(&self) -> &'static str;

    /// Type one line of text (no newlines).
    fn type_line(&mut self, line: &str) -> Result<()>;

    /// Line break inside the input box without sending (Shift+Enter).
    fn line_break(&mut self) -> Result<()>;

    /// Ctrl+V.
    fn paste(&mut self) -> Result<()>;

    /// Enter.
    fn submit(&mut self) -> Result<()>;
}

/// Everything the send loop needs from the OS.
pub struct Backend {
    pub desktop: Box<dyn Desktop>,
    pub primary: Box<dyn Keyboard>,
    pub fallback: Box<dyn Keyboard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_names_match_loosely() {
        assert!(process_matches("KakaoTalk.exe", "kakaotalk"));
        assert!(process_matches("kakaotalk", "KakaoTalk.EXE"));
        assert!(process_matches(r"C:\Program Files\Kakao\KakaoTalk.exe", "KakaoTalk.exe"));
        assert!(!process_matches("KakaoTalkAgent.exe", "KakaoTalk.exe"));
        assert!(!process_matches("", ""));
        assert!(!process_matches(".exe", "x"));
    }
}
