// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::desktop::Backend;
use crate::error::{Error, Result};
use crate::message::MessageList;
use crate::pool::{self, PoolHandle, PoolStats};
use crate::selector::Pool;
use crate::sender::{RunOutcome, Sender, SenderEvent};
use crate::settings::Settings;

struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

/// Owns settings, the message list and the pool handle. Runs at most one
/// send loop at a time.
pub struct Controller {
    settings: Settings,
    messages: MessageList,
    pool: PoolHandle,
    active: Option<ActiveRun>,
    seed: Option<u64>,
}

impl Controller {
    /// Must be called inside a tokio runtime (spawns the pool owner).
    pub fn new(settings: Settings, messages: MessageList) -> Self {
        Self::build(settings, messages, None)
    }

    /// Reproducible selection and delays.
    pub fn with_seed(settings: Settings, messages: MessageList, seed: u64) -> Self {
        Self::build(settings, messages, Some(seed))
    }

    fn build(settings: Settings, messages: MessageList, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let pool = Pool::new(messages.as_slice().to_vec(), settings.allow_duplicates);
        let (pool, _task) = pool::spawn(pool, rng);
        Self { settings, messages, pool, active: None, seed }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    /// Apply an edit to the message list and hand the result to the pool.
    pub async fn edit_messages<T>(
        &mut self,
        edit: impl FnOnce(&mut MessageList) -> Result<T>,
    ) -> Result<T> {
        let out = edit(&mut self.messages)?;
        self.pool.replace(self.messages.as_slice().to_vec()).await?;
        Ok(out)
    }

    pub async fn set_messages(&mut self, list: MessageList) -> Result<()> {
        self.edit_messages(|m| {
            *m = list;
            Ok(())
        })
        .await
    }

    pub async fn set_allow_duplicates(&mut self, allow: bool) -> Result<()> {
        self.settings.allow_duplicates = allow;
        self.pool.set_allow_duplicates(allow).await
    }

    pub async fn pool_stats(&self) -> Result<PoolStats> {
        self.pool.stats().await
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    /// Spawn the send loop. Returns its stop token and event stream.
    pub fn start(
        &mut self,
        backend: Backend,
    ) -> Result<(CancellationToken, mpsc::UnboundedReceiver<SenderEvent>)> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.settings.sender.validate()?;
        if self.active.take().is_some() {
            warn!("previous run finished without being collected");
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut sender =
            Sender::new(self.settings.sender.clone(), self.pool.clone(), backend, events_tx);
        if let Some(seed) = self.seed {
            sender = sender.with_seed(seed.wrapping_add(1));
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sender.run(cancel.clone()));
        self.active = Some(ActiveRun { cancel: cancel.clone(), task });
        Ok((cancel, events_rx))
    }

    /// Request a stop and wait for the loop to reach `Stopped`.
    pub async fn stop(&mut self) -> Option<RunOutcome> {
        let run = self.active.take()?;
        info!("stop requested");
        run.cancel.cancel();
        Some(collect(run.task).await)
    }

    /// Wait for the loop to end on its own.
    pub async fn wait(&mut self) -> Option<RunOutcome> {
        let run = self.active.take()?;
        Some(collect(run.task).await)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}

async fn collect(task: JoinHandle<RunOutcome>) -> RunOutcome {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => RunOutcome::Failed { sent: 0, error: format!("send loop task: {e}") },
    }
}
