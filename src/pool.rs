// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pool owner task. The `Pool` lives inside one task and is only mutated
//! there; the send loop and the controller talk to it through commands.

use log::debug;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::selector::Pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub remaining: usize,
    pub allow_duplicates: bool,
}

enum PoolCommand {
    Draw(oneshot::Sender<Result<Message>>),
    Replace(Vec<Message>),
    AllowDuplicates(bool),
    Stats(oneshot::Sender<PoolStats>),
}

#[derive(Clone)]
pub struct PoolHandle {
    tx: mpsc::Sender<PoolCommand>,
}

impl PoolHandle {
    pub async fn draw(&self) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PoolCommand::Draw(reply)).await.map_err(|_| Error::PoolClosed)?;
        rx.await.map_err(|_| Error::PoolClosed)?
    }

    pub async fn replace(&self, messages: Vec<Message>) -> Result<()> {
        self.tx.send(PoolCommand::Replace(messages)).await.map_err(|_| Error::PoolClosed)
    }

    pub async fn set_allow_duplicates(&self, allow: bool) -> Result<()> {
        self.tx.send(PoolCommand::AllowDuplicates(allow)).await.map_err(|_| Error::PoolClosed)
    }

    pub async fn stats(&self) -> Result<PoolStats> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PoolCommand::Stats(reply)).await.map_err(|_| Error::PoolClosed)?;
        rx.await.map_err(|_| Error::PoolClosed)
    }
}

/// Spawn the owner task. It exits once every handle is dropped.
pub fn spawn(mut pool: Pool, mut rng: StdRng) -> (PoolHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PoolCommand>(32);
    let task = tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                PoolCommand::Draw(reply) => {
                    let _ = reply.send(pool.draw(&mut rng));
                }
                PoolCommand::Replace(messages) => {
                    debug!("pool: {} messages, new cycle", messages.len());
                    pool.replace(messages);
                }
                PoolCommand::AllowDuplicates(allow) => pool.set_allow_duplicates(allow),
                PoolCommand::Stats(reply) => {
                    let _ = reply.send(PoolStats {
                        size: pool.len(),
                        remaining: pool.remaining(),
                        allow_duplicates: pool.allow_duplicates(),
                    });
                }
            }
        }
        debug!("pool: owner task finished");
    });
    (PoolHandle { tx }, task)
}
