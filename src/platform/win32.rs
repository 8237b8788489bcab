// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::borrow::Cow;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arboard::{Clipboard, ImageData};
use enigo::{Direction, Enigo, Key, Keyboard as _, Settings as EnigoSettings};
use log::{debug, warn};
use windows::core::PWSTR;
use windows::Win32::Foundation::*;
use windows::Win32::System::Threading::{
    AttachThreadInput, GetCurrentThreadId, OpenProcess, QueryFullProcessImageNameW,
    PROCESS_NAME_FORMAT, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::blocking;
use crate::desktop::{process_matches, Desktop, Keyboard, TargetWindow};
use crate::error::{Error, Result};
use crate::hotkey::Hotkey;
use crate::image_source::ClipImage;

const CHAR_DELAY_MS: u64 = 5;      // zwischen Zeichen, wie ein schneller Mensch
const FOCUS_WAIT_MS: u64 = 50;
const HOTKEY_POLL_MS: u64 = 30;

// ── Fenster finden ──────────────────────────────────

unsafe extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let vec = &mut *(lparam.0 as *mut Vec<isize>);
    vec.push(hwnd.0 as isize);
    TRUE
}

unsafe fn collect_windows() -> Vec<isize> {
    let mut hwnds: Vec<isize> = Vec::new();
    let _ = EnumWindows(Some(enum_windows_cb), LPARAM(&mut hwnds as *mut Vec<isize> as isize));
    hwnds
}

unsafe fn get_exe_name(pid: u32) -> String {
    if pid == 0 { return String::new(); }
    let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) {
        Ok(h) => h,
        Err(_) => return String::new(),
    };
    let mut buf = [0u16; 260];
    let mut len = buf.len() as u32;
    let ok = QueryFullProcessImageNameW(
        handle, PROCESS_NAME_FORMAT(0), PWSTR(buf.as_mut_ptr()), &mut len,
    );
    let _ = CloseHandle(handle);
    if ok.is_ok() {
        let path = String::from_utf16_lossy(&buf[..len as usize]);
        path.rsplit('\\').next().unwrap_or("").to_string()
    } else {
        String::new()
    }
}

/// Visible, titled top-level windows with their owning executable.
pub(super) unsafe fn visible_windows() -> Vec<TargetWindow> {
    let mut result = Vec::new();
    for raw in collect_windows() {
        let hwnd = HWND(raw as *mut _);
        if !IsWindowVisible(hwnd).as_bool() { continue; }
        let mut buf = [0u16; 256];
        let len = GetWindowTextW(hwnd, &mut buf);
        if len == 0 { continue; }
        let title = String::from_utf16_lossy(&buf[..len as usize]);
        if title.trim().is_empty() { continue; }
        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
        let exe = get_exe_name(pid);
        result.push(TargetWindow { handle: raw, pid, title, exe });
    }
    result
}

/// Windows only lets the foreground owner hand out focus. Attaching to the
/// current foreground thread and tapping ALT lifts that lock.
unsafe fn force_foreground(hwnd: HWND) -> bool {
    if IsIconic(hwnd).as_bool() {
        let _ = ShowWindow(hwnd, SW_RESTORE);
    }
    let fg = GetForegroundWindow();
    if fg == hwnd { return true; }

    let me = GetCurrentThreadId();
    let fg_thread = GetWindowThreadProcessId(fg, None);
    let attached = fg_thread != 0 && fg_thread != me
        && AttachThreadInput(me, fg_thread, TRUE).as_bool();

    send_vk(VK_MENU);
    let _ = BringWindowToTop(hwnd);
    let _ = SetForegroundWindow(hwnd);

    if attached {
        let _ = AttachThreadInput(me, fg_thread, FALSE);
    }
    thread::sleep(Duration::from_millis(FOCUS_WAIT_MS));
    GetForegroundWindow() == hwnd
}

pub struct Win32Desktop;

impl Desktop for Win32Desktop {
    fn find_window(&mut self, process: &str) -> Option<TargetWindow> {
        let found = unsafe { visible_windows() }
            .into_iter()
            .find(|w| process_matches(&w.exe, process));
        if let Some(w) = &found {
            debug!("target: '{}' pid={} hwnd=0x{:X}", w.title, w.pid, w.handle);
        }
        found
    }

    fn focus(&mut self, window: &TargetWindow) -> Result<()> {
        let hwnd = HWND(window.handle as *mut _);
        if blocking(|| unsafe { force_foreground(hwnd) }) {
            Ok(())
        } else {
            Err(Error::TargetNotFound(format!("{} (refused foreground)", window.exe)))
        }
    }

    fn set_clipboard_image(&mut self, image: &ClipImage) -> Result<()> {
        let mut cb = Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        cb.set_image(ImageData {
            width: image.width,
            height: image.height,
            bytes: Cow::Borrowed(&image.rgba),
        })
        .map_err(|e| Error::Clipboard(e.to_string()))
    }

    fn clear_clipboard(&mut self) -> Result<()> {
        let mut cb = Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        cb.clear().map_err(|e| Error::Clipboard(e.to_string()))
    }
}

// ── Injection via SendInput ─────────────────────────

/// Map a key name to its VK code.
pub(super) fn key_to_vk(name: &str) -> Option<VIRTUAL_KEY> {
    let name = name.to_lowercase();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() {
            return Some(VIRTUAL_KEY(c.to_ascii_uppercase() as u16));
        }
        if c.is_ascii_digit() {
            return Some(VIRTUAL_KEY(c as u16));
        }
    }
    match name.as_str() {
        "f1"  => Some(VK_F1),  "f2"  => Some(VK_F2),  "f3"  => Some(VK_F3),
        "f4"  => Some(VK_F4),  "f5"  => Some(VK_F5),  "f6"  => Some(VK_F6),
        "f7"  => Some(VK_F7),  "f8"  => Some(VK_F8),  "f9"  => Some(VK_F9),
        "f10" => Some(VK_F10), "f11" => Some(VK_F11), "f12" => Some(VK_F12),
        "enter"     => Some(VK_RETURN),
        "tab"       => Some(VK_TAB),
        "escape"    => Some(VK_ESCAPE),
        "space"     => Some(VK_SPACE),
        "backspace" => Some(VK_BACK),
        "delete"    => Some(VK_DELETE),
        "insert"    => Some(VK_INSERT),
        "home"      => Some(VK_HOME),
        "end"       => Some(VK_END),
        "pageup"    => Some(VK_PRIOR),
        "pagedown"  => Some(VK_NEXT),
        "up"    => Some(VK_UP),
        "down"  => Some(VK_DOWN),
        "left"  => Some(VK_LEFT),
        "right" => Some(VK_RIGHT),
        "pause"       => Some(VK_PAUSE),
        "scrolllock"  => Some(VK_SCROLL),
        "printscreen" => Some(VK_SNAPSHOT),
        _ => None,
    }
}

/// Extended flag needed for certain keys (arrows, ins/del/home/end/pgup/pgdn)
fn is_extended_key(vk: VIRTUAL_KEY) -> bool {
    matches!(vk, VK_UP | VK_DOWN | VK_LEFT | VK_RIGHT
        | VK_INSERT | VK_DELETE | VK_HOME | VK_END | VK_PRIOR | VK_NEXT
        | VK_SNAPSHOT)
}

fn key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk, wScan: scan,
                dwFlags: flags,
                time: 0, dwExtraInfo: 0,
            },
        },
    }
}

/// Returns false when the system dropped the events (UIPI, secure desktop).
unsafe fn send(inputs: &[INPUT]) -> bool {
    SendInput(inputs, mem::size_of::<INPUT>() as i32) as usize == inputs.len()
}

unsafe fn send_vk(vk: VIRTUAL_KEY) -> bool {
    let ext = if is_extended_key(vk) { KEYEVENTF_EXTENDEDKEY } else { KEYBD_EVENT_FLAGS(0) };
    send(&[key_input(vk, 0, ext), key_input(vk, 0, ext | KEYEVENTF_KEYUP)])
}

/// Modifiers down, key, modifiers up in reverse, as one batch.
unsafe fn send_combo(modifiers: &[VIRTUAL_KEY], vk: VIRTUAL_KEY) -> bool {
    let ext = if is_extended_key(vk) { KEYEVENTF_EXTENDEDKEY } else { KEYBD_EVENT_FLAGS(0) };
    let mut inputs = Vec::with_capacity(modifiers.len() * 2 + 2);
    for &m in modifiers {
        inputs.push(key_input(m, 0, KEYBD_EVENT_FLAGS(0)));
    }
    inputs.push(key_input(vk, 0, ext));
    inputs.push(key_input(vk, 0, ext | KEYEVENTF_KEYUP));
    for &m in modifiers.iter().rev() {
        inputs.push(key_input(m, 0, KEYEVENTF_KEYUP));
    }
    send(&inputs)
}

/// One character as KEYEVENTF_UNICODE; astral chars go as a surrogate pair.
unsafe fn inject_char(ch: char) -> bool {
    let mut units = [0u16; 2];
    let mut inputs = Vec::with_capacity(4);
    for &code in ch.encode_utf16(&mut units).iter() {
        inputs.push(key_input(VIRTUAL_KEY(0), code, KEYEVENTF_UNICODE));
        inputs.push(key_input(VIRTUAL_KEY(0), code, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
    }
    send(&inputs)
}

/// Primary mechanism: raw SendInput, char by char.
#[derive(Default)]
pub struct SendInputKeyboard;

impl SendInputKeyboard {
    fn check(ok: bool, what: &str) -> Result<()> {
        if ok { Ok(()) } else { Err(Error::injection("SendInput", format!("{what} was blocked"))) }
    }
}

impl Keyboard for SendInputKeyboard {
    fn name(&self) -> &'static str { "SendInput" }

    fn type_line(&mut self, line: &str) -> Result<()> {
        blocking(|| {
            for (i, ch) in line.chars().enumerate() {
                let ok = unsafe {
                    match ch {
                        '\t' => send_vk(VK_TAB),
                        _ => inject_char(ch),
                    }
                };
                Self::check(ok, &format!("char[{i}]"))?;
                thread::sleep(Duration::from_millis(CHAR_DELAY_MS));
            }
            Ok(())
        })
    }

    fn line_break(&mut self) -> Result<()> {
        Self::check(unsafe { send_combo(&[VK_SHIFT], VK_RETURN) }, "shift+enter")
    }

    fn paste(&mut self) -> Result<()> {
        Self::check(unsafe { send_combo(&[VK_CONTROL], VIRTUAL_KEY(b'V' as u16)) }, "ctrl+v")
    }

    fn submit(&mut self) -> Result<()> {
        Self::check(unsafe { send_vk(VK_RETURN) }, "enter")
    }
}

// ── Fallback via enigo ──────────────────────────────

pub struct EnigoKeyboard;

impl EnigoKeyboard {
    fn session() -> Result<Enigo> {
        Enigo::new(&EnigoSettings::default()).map_err(|e| Error::injection("enigo", e))
    }

    fn chord(modifier: Key, key: Key) -> Result<()> {
        let mut enigo = Self::session()?;
        enigo.key(modifier, Direction::Press).map_err(|e| Error::injection("enigo", e))?;
        let clicked = enigo.key(key, Direction::Click);
        enigo.key(modifier, Direction::Release).map_err(|e| Error::injection("enigo", e))?;
        clicked.map_err(|e| Error::injection("enigo", e))
    }
}

impl Keyboard for EnigoKeyboard {
    fn name(&self) -> &'static str { "enigo" }

    fn type_line(&mut self, line: &str) -> Result<()> {
        blocking(|| Self::session()?.text(line).map_err(|e| Error::injection("enigo", e)))
    }

    fn line_break(&mut self) -> Result<()> {
        Self::chord(Key::Shift, Key::Return)
    }

    fn paste(&mut self) -> Result<()> {
        Self::chord(Key::Control, Key::Unicode('v'))
    }

    fn submit(&mut self) -> Result<()> {
        Self::session()?
            .key(Key::Return, Direction::Click)
            .map_err(|e| Error::injection("enigo", e))
    }
}

// ── Hotkey polling ──────────────────────────────────

fn is_down(vk: VIRTUAL_KEY) -> bool {
    unsafe { GetAsyncKeyState(vk.0 as i32) < 0 }
}

pub(super) fn poll_hotkey(
    hotkey: &Hotkey,
    stop: Arc<AtomicBool>,
    on_press: impl Fn() + Send + 'static,
) -> Result<thread::JoinHandle<()>> {
    let vk = key_to_vk(hotkey.key).ok_or_else(|| Error::Hotkey(hotkey.to_string()))?;
    let mut modifiers = Vec::new();
    if hotkey.ctrl { modifiers.push(VK_CONTROL); }
    if hotkey.alt { modifiers.push(VK_MENU); }
    if hotkey.shift { modifiers.push(VK_SHIFT); }
    if hotkey.win { modifiers.push(VK_LWIN); }
    let label = hotkey.to_string();

    let handle = thread::Builder::new()
        .name(format!("hotkey {label}"))
        .spawn(move || {
            let mut was_down = false;
            while !stop.load(SeqCst) {
                let down = is_down(vk) && modifiers.iter().all(|&m| is_down(m));
                if down && !was_down {
                    debug!("hotkey: {label} pressed");
                    on_press();
                }
                was_down = down;
                thread::sleep(Duration::from_millis(HOTKEY_POLL_MS));
            }
        })
        .map_err(|e| {
            warn!("hotkey thread failed to start: {e}");
            Error::Io(e)
        })?;
    Ok(handle)
}
