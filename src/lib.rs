// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sends randomly chosen chat messages into a desktop chat application by
//! focusing its window and simulating keyboard input.
//!
//! Messages carry a weight; the pool hands them out by weighted sampling
//! without replacement per cycle. The send loop paces itself with random
//! delays and stops cooperatively.

pub mod controller;
pub mod desktop;
pub mod error;
pub mod hotkey;
pub mod image_source;
pub mod logger;
pub mod message;
pub mod platform;
pub mod pool;
pub mod selector;
pub mod sender;
pub mod settings;
pub mod store;

pub use controller::Controller;
pub use desktop::{Backend, Desktop, Keyboard, TargetWindow};
pub use error::{Error, Result};
pub use message::{Message, MessageList};
pub use sender::{RunOutcome, SendState, SenderEvent};
pub use settings::Settings;
