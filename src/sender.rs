// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The send loop.
//!
//! Per iteration: locate the target window, force it to the foreground,
//! draw a message, paste its image (optional), type its lines, submit,
//! then sleep a random delay. Cancellation is honored at iteration start,
//! right before a message begins, and during every delay. A message that
//! has started typing always finishes.

use std::time::Duration;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::desktop::{Backend, Desktop, Keyboard, TargetWindow};
use crate::error::{Error, Result};
use crate::image_source::{ClipImage, ImageLoader};
use crate::message::Message;
use crate::pool::PoolHandle;
use crate::settings::SenderConfig;

/// Consecutive draws that produced nothing to send before the loop gives up.
const MAX_EMPTY_DRAWS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Running,
    LocatingTarget,
    Focusing,
    Selecting,
    SendingImage,
    SendingText,
    Submitting,
    Delaying,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { sent: u32 },
    Cancelled { sent: u32 },
    TargetMissing { sent: u32, checks: u32 },
    NoMessages { sent: u32 },
    Failed { sent: u32, error: String },
}

impl RunOutcome {
    pub fn sent(&self) -> u32 {
        match self {
            RunOutcome::Completed { sent }
            | RunOutcome::Cancelled { sent }
            | RunOutcome::TargetMissing { sent, .. }
            | RunOutcome::NoMessages { sent }
            | RunOutcome::Failed { sent, .. } => *sent,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::TargetMissing { .. } | RunOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    State(SendState),
    Sent { count: u32, preview: String, image: bool, fallback: bool },
    ImageSkipped { reference: String },
    Finished(RunOutcome),
}

enum Acquire {
    Ready(TargetWindow),
    Cancelled,
    Missing(u32),
}

#[derive(Debug, Default)]
struct Delivery {
    image: bool,
    text: bool,
    fallback: bool,
}

pub struct Sender {
    config: SenderConfig,
    pool: PoolHandle,
    desktop: Box<dyn Desktop>,
    primary: Box<dyn Keyboard>,
    fallback: Box<dyn Keyboard>,
    images: ImageLoader,
    events: mpsc::UnboundedSender<SenderEvent>,
    rng: StdRng,
    state: SendState,
}

impl Sender {
    pub fn new(
        config: SenderConfig,
        pool: PoolHandle,
        backend: Backend,
        events: mpsc::UnboundedSender<SenderEvent>,
    ) -> Self {
        Self {
            config,
            pool,
            desktop: backend.desktop,
            primary: backend.primary,
            fallback: backend.fallback,
            images: ImageLoader::new(),
            events,
            rng: StdRng::from_entropy(),
            state: SendState::Idle,
        }
    }

    /// Fixed seed for the delay generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub async fn run(mut self, cancel: CancellationToken) -> RunOutcome {
        info!(
            "send loop started: target '{}', {}",
            self.config.target_process,
            match self.config.loop_count {
                Some(n) => format!("{n} messages"),
                None => "until stopped".to_string(),
            }
        );
        self.enter(SendState::Running);

        let mut sent = 0u32;
        let mut empty_draws = 0u32;
        let outcome = loop {
            if cancel.is_cancelled() {
                break RunOutcome::Cancelled { sent };
            }
            if self.limit_reached(sent) {
                break RunOutcome::Completed { sent };
            }

            let window = match self.acquire_target(&cancel).await {
                Acquire::Ready(w) => w,
                Acquire::Cancelled => break RunOutcome::Cancelled { sent },
                Acquire::Missing(checks) => break RunOutcome::TargetMissing { sent, checks },
            };
            // Last checkpoint before any keystroke of this iteration.
            if !pause(self.config.focus_settle(), &cancel).await {
                break RunOutcome::Cancelled { sent };
            }

            self.enter(SendState::Selecting);
            let message = match self.pool.draw().await {
                Ok(m) => m,
                Err(Error::NoSelection) => {
                    empty_draws += 1;
                    warn!("nothing to send ({empty_draws}/{MAX_EMPTY_DRAWS}): list empty or all weights zero");
                    if empty_draws >= MAX_EMPTY_DRAWS {
                        break RunOutcome::NoMessages { sent };
                    }
                    self.enter(SendState::Delaying);
                    if !pause(self.config.target_retry(), &cancel).await {
                        break RunOutcome::Cancelled { sent };
                    }
                    continue;
                }
                Err(e) => {
                    error!("send loop aborted: {e}");
                    break RunOutcome::Failed { sent, error: e.to_string() };
                }
            };

            match self.deliver(&message).await {
                Ok(d) if d.image || d.text => {
                    empty_draws = 0;
                    sent += 1;
                    info!(
                        "sent #{sent} to '{}': {}{}",
                        window.title,
                        message.preview(),
                        if d.image { " [image]" } else { "" }
                    );
                    self.emit(SenderEvent::Sent {
                        count: sent,
                        preview: message.preview(),
                        image: d.image,
                        fallback: d.fallback,
                    });
                }
                Ok(_) => {
                    empty_draws += 1;
                    warn!(
                        "'{}' had nothing deliverable, skipped ({empty_draws}/{MAX_EMPTY_DRAWS})",
                        message.preview()
                    );
                    if empty_draws >= MAX_EMPTY_DRAWS {
                        break RunOutcome::NoMessages { sent };
                    }
                }
                Err(e) => {
                    error!("send loop aborted: {e}");
                    break RunOutcome::Failed { sent, error: e.to_string() };
                }
            }

            if self.limit_reached(sent) {
                break RunOutcome::Completed { sent };
            }
            self.enter(SendState::Delaying);
            let delay = self.next_delay();
            debug!("next message in {:.1}s", delay.as_secs_f64());
            if !pause(delay, &cancel).await {
                break RunOutcome::Cancelled { sent };
            }
            self.enter(SendState::Running);
        };

        self.enter(SendState::Stopped);
        info!("send loop stopped: {outcome:?}");
        self.emit(SenderEvent::Finished(outcome.clone()));
        outcome
    }

    fn limit_reached(&self, sent: u32) -> bool {
        self.config.loop_count.is_some_and(|n| sent >= n)
    }

    fn next_delay(&mut self) -> Duration {
        let (lo, hi) = (self.config.min_delay_ms, self.config.max_delay_ms.max(self.config.min_delay_ms));
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }

    async fn acquire_target(&mut self, cancel: &CancellationToken) -> Acquire {
        let process = self.config.target_process.clone();
        let mut checks = 0u32;
        loop {
            self.enter(SendState::LocatingTarget);
            checks += 1;
            match self.desktop.find_window(&process) {
                Some(window) => {
                    self.enter(SendState::Focusing);
                    match self.desktop.focus(&window) {
                        Ok(()) => return Acquire::Ready(window),
                        Err(e) => warn!("focus on '{}' failed: {e}", window.title),
                    }
                }
                None => warn!(
                    "'{process}' has no window (check {checks}), retrying in {}s",
                    self.config.target_retry().as_secs()
                ),
            }
            if self.config.max_target_checks.is_some_and(|max| checks >= max) {
                warn!("{}", Error::TargetNotFound(process.clone()));
                return Acquire::Missing(checks);
            }
            if !pause(self.config.target_retry(), cancel).await {
                return Acquire::Cancelled;
            }
        }
    }

    async fn deliver(&mut self, message: &Message) -> Result<Delivery> {
        let mut d = Delivery::default();

        if let Some(reference) = message.image_ref.as_deref() {
            self.enter(SendState::SendingImage);
            d.image = self.send_image(reference, &mut d.fallback).await?;
        }

        if message.has_text() {
            self.enter(SendState::SendingText);
            for (i, line) in message.lines().enumerate() {
                if i > 0 {
                    self.press(&mut d.fallback, |k| k.line_break())?;
                }
                if !line.is_empty() {
                    self.press(&mut d.fallback, |k| k.type_line(line))?;
                }
            }
            d.text = true;
        }

        if d.image || d.text {
            self.enter(SendState::Submitting);
            self.press(&mut d.fallback, |k| k.submit())?;
        }
        Ok(d)
    }

    /// Image to clipboard, then paste. `Ok(false)` means the image was given up.
    async fn send_image(&mut self, reference: &str, on_fallback: &mut bool) -> Result<bool> {
        let attempts = self.config.image_attempts.max(1);
        let mut loaded: Option<ClipImage> = None;

        for attempt in 1..=attempts {
            let staged = self.stage_image(reference, &mut loaded).await;
            match staged {
                Ok(()) => {
                    self.press(on_fallback, |k| k.paste())?;
                    tokio::time::sleep(self.config.paste_settle()).await;
                    if let Err(e) = self.desktop.clear_clipboard() {
                        debug!("clipboard clear failed: {e}");
                    }
                    return Ok(true);
                }
                Err(e) => {
                    warn!("image attempt {attempt}/{attempts} failed: {e}");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.image_retry()).await;
                    }
                }
            }
        }

        warn!("giving up on image '{reference}', sending text only");
        self.emit(SenderEvent::ImageSkipped { reference: reference.to_string() });
        Ok(false)
    }

    async fn stage_image(&mut self, reference: &str, cache: &mut Option<ClipImage>) -> Result<()> {
        if cache.is_none() {
            *cache = Some(self.images.load(reference).await?);
        }
        match cache.as_ref() {
            Some(img) => self.desktop.set_clipboard_image(img),
            None => Err(Error::image(reference, "not loaded")),
        }
    }

    /// Run one input step. A primary failure switches to the fallback for
    /// the rest of the message and retries the step there.
    fn press<F>(&mut self, on_fallback: &mut bool, op: F) -> Result<()>
    where
        F: Fn(&mut dyn Keyboard) -> Result<()>,
    {
        if !*on_fallback {
            match op(self.primary.as_mut()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "{} failed ({e}), using {} for the rest of this message",
                        self.primary.name(),
                        self.fallback.name()
                    );
                    *on_fallback = true;
                }
            }
        }
        op(self.fallback.as_mut())
    }

    fn enter(&mut self, state: SendState) {
        if self.state != state {
            debug!("state: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.emit(SenderEvent::State(state));
    }

    fn emit(&self, event: SenderEvent) {
        let _ = self.events.send(event);
    }
}

/// Sleep unless cancelled first. `false` means stop.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    if d.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}
