// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use autosend::hotkey::{Hotkey, HotkeyAction};
use autosend::message::{Message, MessageList};
use autosend::sender::{RunOutcome, SenderEvent};
use autosend::settings::{self, Argb, SenderConfig, Settings};
use autosend::{logger, platform, store, Controller};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use tokio::sync::Notify;

use cli::{Cli, Command, RunArgs, SenderArgs, SettingsCommand, Toggle};

struct Paths {
    settings: PathBuf,
    messages: PathBuf,
    log: PathBuf,
}

impl Paths {
    fn resolve(cli: &Cli) -> Self {
        let settings = cli
            .config
            .clone()
            .unwrap_or_else(|| settings::default_dir().join(settings::SETTINGS_FILE));
        let dir = settings.parent().map(Path::to_path_buf).unwrap_or_default();
        let messages = cli.messages.clone().unwrap_or_else(|| dir.join(settings::MESSAGES_FILE));
        Self { settings, messages, log: dir.join(settings::LOG_FILE) }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let paths = Paths::resolve(&cli);
    logger::init(Some(paths.log.clone()), level);

    match dispatch(cli.command, &paths).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, paths: &Paths) -> Result<ExitCode> {
    match command {
        Command::List => {
            let list = load_messages(paths)?;
            print_messages(&list);
        }
        Command::Add { text, weight, image } => {
            let mut list = load_messages(paths)?;
            let at = list.add(Message::new(text, weight, image)?);
            save_messages(paths, &list)?;
            info!("added message #{}", at + 1);
        }
        Command::Edit { index, text, weight, image, no_image } => {
            let mut list = load_messages(paths)?;
            let i = to_index(index)?;
            let old = list.get(i)?.clone();
            let image = match (image, no_image) {
                (_, true) => None,
                (Some(img), false) => Some(img),
                (None, false) => old.image_ref,
            };
            let edited = Message::new(text.unwrap_or(old.text), weight.unwrap_or(old.weight), image)?;
            list.update(i, edited)?;
            save_messages(paths, &list)?;
            info!("updated message #{index}");
        }
        Command::Remove { index } => {
            let mut list = load_messages(paths)?;
            let removed = list.remove(to_index(index)?)?;
            save_messages(paths, &list)?;
            info!("removed #{index}: {}", removed.preview());
        }
        Command::Move { from, to } => {
            let mut list = load_messages(paths)?;
            list.move_item(to_index(from)?, to_index(to)?)?;
            save_messages(paths, &list)?;
            info!("moved #{from} to #{to}");
        }
        Command::Clear => {
            let mut list = load_messages(paths)?;
            let n = list.len();
            list.clear();
            save_messages(paths, &list)?;
            info!("message list cleared ({n} removed)");
        }
        Command::Import { file, append } => {
            let imported = store::import(&file)?;
            let list = if append {
                let mut list = load_messages(paths)?;
                for m in imported.into_vec() {
                    list.add(m);
                }
                list
            } else {
                imported
            };
            save_messages(paths, &list)?;
        }
        Command::Export { file } => {
            store::export(&load_messages(paths)?, &file)?;
        }
        Command::Targets => {
            for w in platform::list_windows()? {
                println!("{:>6}  {:<24}  {}", w.pid, w.exe, w.title);
            }
        }
        Command::Settings(cmd) => settings_command(cmd, paths)?,
        Command::Run(args) => return run(args, paths).await,
    }
    Ok(ExitCode::SUCCESS)
}

fn to_index(one_based: usize) -> Result<usize> {
    match one_based.checked_sub(1) {
        Some(i) => Ok(i),
        None => bail!("indices start at 1"),
    }
}

fn load_messages(paths: &Paths) -> Result<MessageList> {
    store::load_or_empty(&paths.messages)
        .with_context(|| format!("reading {}", paths.messages.display()))
}

fn save_messages(paths: &Paths, list: &MessageList) -> Result<()> {
    store::export(list, &paths.messages)
        .with_context(|| format!("writing {}", paths.messages.display()))
}

fn print_messages(list: &MessageList) {
    if list.is_empty() {
        println!("(no messages)");
        return;
    }
    let total = list.total_weight().max(1) as f64;
    for (i, m) in list.iter().enumerate() {
        let image = m.image_ref.as_deref().map(|r| format!("  [{r}]")).unwrap_or_default();
        println!(
            "{:>3}. w={:<3} {:>5.1}%  {}{}",
            i + 1,
            m.weight,
            m.weight as f64 * 100.0 / total,
            m.preview(),
            image
        );
    }
}

// ── Settings ────────────────────────────────────────

fn settings_command(cmd: SettingsCommand, paths: &Paths) -> Result<()> {
    let mut s = Settings::load(&paths.settings);
    match cmd {
        SettingsCommand::Show => {
            print_settings(&s, paths);
            return Ok(());
        }
        SettingsCommand::Color { name, value } => {
            let color: Argb = value.parse()?;
            s.colors.set(&name, color)?;
        }
        SettingsCommand::Hotkey { action, combo } => {
            let action: HotkeyAction = action.parse()?;
            let hotkey: Hotkey = combo.parse()?;
            s.hotkeys.bind(action, hotkey);
        }
        SettingsCommand::Duplicates { mode } => s.allow_duplicates = mode == Toggle::On,
        SettingsCommand::Sender(args) => apply_sender_args(&mut s.sender, &args),
    }
    s.save(&paths.settings)?;
    Ok(())
}

fn apply_sender_args(cfg: &mut SenderConfig, args: &SenderArgs) {
    if let Some(t) = &args.target { cfg.target_process = t.clone(); }
    if let Some(n) = args.count { cfg.loop_count = Some(n); }
    if args.forever { cfg.loop_count = None; }
    if let Some(ms) = args.min_delay_ms { cfg.min_delay_ms = ms; }
    if let Some(ms) = args.max_delay_ms { cfg.max_delay_ms = ms; }
    if let Some(ms) = args.retry_ms { cfg.target_retry_ms = ms; }
    if let Some(n) = args.max_checks { cfg.max_target_checks = Some(n); }
    if args.no_check_limit { cfg.max_target_checks = None; }
    if let Some(n) = args.image_attempts { cfg.image_attempts = n; }
}

fn print_settings(s: &Settings, paths: &Paths) {
    println!("settings file    {}", paths.settings.display());
    println!("messages file    {}", paths.messages.display());
    for (name, color) in s.colors.entries() {
        println!("color {:<10} {color}", name);
    }
    println!("start hotkey     {}", s.hotkeys.start_hotkey);
    println!("stop hotkey      {}", s.hotkeys.stop_hotkey);
    println!("duplicates       {}", if s.allow_duplicates { "on" } else { "off" });
    let c = &s.sender;
    println!("target           {}", c.target_process);
    println!(
        "count            {}",
        c.loop_count.map(|n| n.to_string()).unwrap_or_else(|| "until stopped".into())
    );
    println!("delay            {}..{} ms", c.min_delay_ms, c.max_delay_ms);
    println!(
        "target retry     every {} ms, {}",
        c.target_retry_ms,
        c.max_target_checks.map(|n| format!("max {n} checks")).unwrap_or_else(|| "no limit".into())
    );
    println!("image attempts   {} ({} ms apart)", c.image_attempts, c.image_retry_ms);
}

// ── Send loop ───────────────────────────────────────

#[derive(Default)]
struct RunTally {
    with_image: u32,
    via_fallback: u32,
    images_skipped: u32,
}

async fn run(args: RunArgs, paths: &Paths) -> Result<ExitCode> {
    let mut s = Settings::load(&paths.settings);
    apply_sender_args(&mut s.sender, &args.sender);
    if args.duplicates {
        s.allow_duplicates = true;
    }
    s.validate()?;

    let messages = load_messages(paths)?;
    if messages.total_weight() == 0 {
        bail!("nothing to send: add messages with `autosend add` or `autosend import`");
    }
    let backend = platform::open()?;

    let stop_key = s.hotkeys.stop_hotkey.clone();
    let start_key = s.hotkeys.start_hotkey.clone();
    let mut controller = match args.seed {
        Some(seed) => Controller::with_seed(s, messages, seed),
        None => Controller::new(s, messages),
    };

    if args.armed && !wait_for_start(&start_key).await? {
        return Ok(ExitCode::SUCCESS);
    }

    let (cancel, mut events) = controller.start(backend)?;
    let _stop_watch = {
        let token = cancel.clone();
        match platform::watch_hotkey(&stop_key, move || token.cancel()) {
            Ok(w) => {
                info!("press {stop_key} or Ctrl+C to stop");
                Some(w)
            }
            Err(e) => {
                warn!("stop hotkey unavailable ({e}), use Ctrl+C");
                None
            }
        }
    };
    let ctrl_c = {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C, stopping after the current message");
                token.cancel();
            }
        })
    };
    let tally = tokio::spawn(async move {
        let mut tally = RunTally::default();
        while let Some(event) = events.recv().await {
            match event {
                SenderEvent::Sent { image, fallback, .. } => {
                    tally.with_image += image as u32;
                    tally.via_fallback += fallback as u32;
                }
                SenderEvent::ImageSkipped { .. } => tally.images_skipped += 1,
                SenderEvent::State(_) | SenderEvent::Finished(_) => {}
            }
        }
        tally
    });

    let outcome = controller.wait().await;
    ctrl_c.abort();
    let tally = tally.await.unwrap_or_default();

    let Some(outcome) = outcome else { return Ok(ExitCode::SUCCESS) };
    let summary = match &outcome {
        RunOutcome::Completed { .. } => "completed".to_string(),
        RunOutcome::Cancelled { .. } => "stopped".to_string(),
        RunOutcome::TargetMissing { checks, .. } => format!("target not found after {checks} checks"),
        RunOutcome::NoMessages { .. } => "no selectable messages".to_string(),
        RunOutcome::Failed { error, .. } => format!("failed: {error}"),
    };
    info!(
        "{summary}: {} sent, {} with image, {} via fallback input, {} images skipped",
        outcome.sent(),
        tally.with_image,
        tally.via_fallback,
        tally.images_skipped
    );
    Ok(if outcome.is_failure() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// `false` when the user aborted with Ctrl+C instead.
async fn wait_for_start(start_key: &Hotkey) -> Result<bool> {
    let notify = Arc::new(Notify::new());
    let n = notify.clone();
    let _watch = platform::watch_hotkey(start_key, move || n.notify_one())
        .context("start hotkey needed for --armed")?;
    info!("armed: press {start_key} to start");
    tokio::select! {
        _ = notify.notified() => Ok(true),
        _ = tokio::signal::ctrl_c() => Ok(false),
    }
}
