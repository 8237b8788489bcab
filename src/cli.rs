// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "autosend", version, about = "Send weighted random messages into a chat window")]
pub struct Cli {
    /// Settings file (default: <config dir>/autosend/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working message list (default: messages.json next to the settings)
    #[arg(long, global = true, value_name = "FILE")]
    pub messages: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the message list
    List,
    /// Append a message
    Add {
        text: String,
        #[arg(short, long, default_value_t = 1)]
        weight: u32,
        /// Image URL or file path pasted before the text
        #[arg(short, long)]
        image: Option<String>,
    },
    /// Change a message (1-based index)
    Edit {
        index: usize,
        #[arg(short, long)]
        text: Option<String>,
        #[arg(short, long)]
        weight: Option<u32>,
        #[arg(short, long, conflicts_with = "no_image")]
        image: Option<String>,
        #[arg(long)]
        no_image: bool,
    },
    /// Delete a message (1-based index)
    Remove { index: usize },
    /// Move a message to another position (1-based indices)
    Move { from: usize, to: usize },
    /// Delete all messages
    Clear,
    /// Load messages from a JSON file
    Import {
        file: PathBuf,
        /// Keep the current messages and add the imported ones
        #[arg(long)]
        append: bool,
    },
    /// Write the messages to a JSON file
    Export { file: PathBuf },
    /// List windows that can be targeted
    Targets,
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Start the send loop
    Run(RunArgs),
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    /// Set a color: background, text, accent, button or log
    Color { name: String, value: String },
    /// Bind a hotkey, e.g. `hotkey stop ctrl+shift+f7`
    Hotkey { action: String, combo: String },
    /// Allow the same message twice within a cycle
    Duplicates { mode: Toggle },
    /// Change send loop parameters
    Sender(SenderArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args, Debug, Default)]
pub struct SenderArgs {
    /// Target executable, e.g. KakaoTalk.exe
    #[arg(long)]
    pub target: Option<String>,
    /// Messages per run
    #[arg(long, conflicts_with = "forever")]
    pub count: Option<u32>,
    /// Run until stopped
    #[arg(long)]
    pub forever: bool,
    #[arg(long)]
    pub min_delay_ms: Option<u64>,
    #[arg(long)]
    pub max_delay_ms: Option<u64>,
    #[arg(long)]
    pub retry_ms: Option<u64>,
    /// Give up after this many failed target lookups
    #[arg(long, conflicts_with = "no_check_limit")]
    pub max_checks: Option<u32>,
    /// Look for the target forever
    #[arg(long)]
    pub no_check_limit: bool,
    #[arg(long)]
    pub image_attempts: Option<u32>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub sender: SenderArgs,
    /// Allow duplicates for this run
    #[arg(long)]
    pub duplicates: bool,
    /// Wait for the start hotkey before sending
    #[arg(long)]
    pub armed: bool,
    /// Seed for reproducible selection and delays
    #[arg(long)]
    pub seed: Option<u64>,
}
