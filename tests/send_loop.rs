// autosend - Weighted Chat Message Sender
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::{Arc, Mutex};
use std::time::Duration;

use autosend::desktop::{Backend, Desktop, Keyboard, TargetWindow};
use autosend::image_source::ClipImage;
use autosend::settings::SenderConfig;
use autosend::{Controller, Error, Message, MessageList, Result, RunOutcome, SendState, SenderEvent, Settings};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Act {
    Focus,
    Clip(usize, usize),
    ClearClip,
    Type(&'static str, String),
    Break(&'static str),
    Paste(&'static str),
    Submit(&'static str),
}

type Journal = Arc<Mutex<Vec<Act>>>;

fn acts(j: &Journal) -> Vec<Act> {
    j.lock().unwrap().clone()
}

struct FakeDesktop {
    journal: Journal,
    /// Lookups that come back empty before the window shows up.
    missing_for: u32,
    clipboard_failures: u32,
}

impl Desktop for FakeDesktop {
    fn find_window(&mut self, process: &str) -> Option<TargetWindow> {
        if self.missing_for > 0 {
            self.missing_for -= 1;
            return None;
        }
        Some(TargetWindow { handle: 0x1234, pid: 77, title: "Team chat".into(), exe: process.into() })
    }

    fn focus(&mut self, _window: &TargetWindow) -> Result<()> {
        self.journal.lock().unwrap().push(Act::Focus);
        Ok(())
    }

    fn set_clipboard_image(&mut self, image: &ClipImage) -> Result<()> {
        if self.clipboard_failures > 0 {
            self.clipboard_failures -= 1;
            return Err(Error::Clipboard("busy".into()));
        }
        self.journal.lock().unwrap().push(Act::Clip(image.width, image.height));
        Ok(())
    }

    fn clear_clipboard(&mut self) -> Result<()> {
        self.journal.lock().unwrap().push(Act::ClearClip);
        Ok(())
    }
}

struct FakeKeyboard {
    name: &'static str,
    journal: Journal,
    /// `type_line` calls that fail before typing works.
    failing_lines: u32,
    broken: bool,
}

impl FakeKeyboard {
    fn gate(&self) -> Result<()> {
        if self.broken {
            Err(Error::Injection { mechanism: self.name, reason: "broken".into() })
        } else {
            Ok(())
        }
    }
}

impl Keyboard for FakeKeyboard {
    fn name(&self) -> &'static str {
        self.name
    }

    fn type_line(&mut self, line: &str) -> Result<()> {
        self.gate()?;
        if self.failing_lines > 0 {
            self.failing_lines -= 1;
            return Err(Error::Injection { mechanism: self.name, reason: "blocked".into() });
        }
        self.journal.lock().unwrap().push(Act::Type(self.name, line.to_string()));
        Ok(())
    }

    fn line_break(&mut self) -> Result<()> {
        self.gate()?;
        self.journal.lock().unwrap().push(Act::Break(self.name));
        Ok(())
    }

    fn paste(&mut self) -> Result<()> {
        self.gate()?;
        self.journal.lock().unwrap().push(Act::Paste(self.name));
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.gate()?;
        self.journal.lock().unwrap().push(Act::Submit(self.name));
        Ok(())
    }
}

#[derive(Default)]
struct Faults {
    missing_for: u32,
    clipboard_failures: u32,
    failing_lines: u32,
    fallback_broken: bool,
}

fn backend(journal: &Journal, faults: Faults) -> Backend {
    Backend {
        desktop: Box::new(FakeDesktop {
            journal: journal.clone(),
            missing_for: faults.missing_for,
            clipboard_failures: faults.clipboard_failures,
        }),
        primary: Box::new(FakeKeyboard {
            name: "primary",
            journal: journal.clone(),
            failing_lines: faults.failing_lines,
            broken: false,
        }),
        fallback: Box::new(FakeKeyboard {
            name: "fallback",
            journal: journal.clone(),
            failing_lines: 0,
            broken: faults.fallback_broken,
        }),
    }
}

fn settings(loop_count: Option<u32>) -> Settings {
    let mut s = Settings::default();
    s.sender = SenderConfig {
        target_process: "chat.exe".into(),
        loop_count,
        min_delay_ms: 1_000,
        max_delay_ms: 2_000,
        target_retry_ms: 5_000,
        max_target_checks: Some(5),
        image_attempts: 3,
        image_retry_ms: 100,
        focus_settle_ms: 20,
        paste_settle_ms: 20,
    };
    s
}

fn text(t: &str, weight: u32) -> Message {
    Message { text: t.into(), weight, image_ref: None }
}

fn drain(events: &mut UnboundedReceiver<SenderEvent>) -> Vec<SenderEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

fn submits(j: &Journal) -> usize {
    acts(j).iter().filter(|a| matches!(a, Act::Submit(_))).count()
}

fn typed(j: &Journal) -> Vec<String> {
    acts(j)
        .into_iter()
        .filter_map(|a| match a {
            Act::Type(_, s) => Some(s),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn sends_loop_count_messages_then_completes() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("hi", 1), text("yo", 3)]);
    let mut ctl = Controller::with_seed(settings(Some(3)), list, 1);

    let (_cancel, mut events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    let outcome = ctl.wait().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { sent: 3 });
    assert_eq!(submits(&journal), 3);
    assert_eq!(acts(&journal).iter().filter(|a| **a == Act::Focus).count(), 3);

    let events = drain(&mut events);
    let states: Vec<SendState> = events
        .iter()
        .filter_map(|e| match e {
            SenderEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        &states[..6],
        &[
            SendState::Running,
            SendState::LocatingTarget,
            SendState::Focusing,
            SendState::Selecting,
            SendState::SendingText,
            SendState::Submitting,
        ]
    );
    assert_eq!(states.last(), Some(&SendState::Stopped));
    // no delay after the last message
    assert_eq!(states[states.len() - 2], SendState::Submitting);
    assert_eq!(events.last(), Some(&SenderEvent::Finished(RunOutcome::Completed { sent: 3 })));
}

#[tokio::test(start_paused = true)]
async fn without_duplicates_each_cycle_sends_every_message_once() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("a", 1), text("b", 5), text("c", 20)]);
    let mut ctl = Controller::with_seed(settings(Some(6)), list, 42);

    ctl.start(backend(&journal, Faults::default())).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 6 });

    let sent = typed(&journal);
    for cycle in sent.chunks(3) {
        let mut c = cycle.to_vec();
        c.sort();
        assert_eq!(c, vec!["a", "b", "c"]);
    }
}

#[tokio::test(start_paused = true)]
async fn multi_line_messages_use_line_breaks() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("one\r\ntwo\n\nfour", 1)]);
    let mut ctl = Controller::with_seed(settings(Some(1)), list, 3);

    ctl.start(backend(&journal, Faults::default())).unwrap();
    ctl.wait().await.unwrap();

    assert_eq!(
        acts(&journal),
        vec![
            Act::Focus,
            Act::Type("primary", "one".into()),
            Act::Break("primary"),
            Act::Type("primary", "two".into()),
            Act::Break("primary"),
            Act::Break("primary"),
            Act::Type("primary", "four".into()),
            Act::Submit("primary"),
        ]
    );
}

fn png_in(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("pic.png");
    let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
    img.save(&path).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test(start_paused = true)]
async fn image_is_pasted_before_the_text() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let msg = Message { text: "look".into(), weight: 1, image_ref: Some(png_in(&dir)) };
    let mut ctl = Controller::with_seed(settings(Some(1)), MessageList::new(vec![msg]), 3);

    let (_c, mut events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    ctl.wait().await.unwrap();

    assert_eq!(
        acts(&journal),
        vec![
            Act::Focus,
            Act::Clip(4, 3),
            Act::Paste("primary"),
            Act::ClearClip,
            Act::Type("primary", "look".into()),
            Act::Submit("primary"),
        ]
    );
    let sent = drain(&mut events).into_iter().find(|e| matches!(e, SenderEvent::Sent { .. }));
    assert!(matches!(sent, Some(SenderEvent::Sent { image: true, fallback: false, .. })));
}

#[tokio::test(start_paused = true)]
async fn clipboard_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let msg = Message { text: String::new(), weight: 1, image_ref: Some(png_in(&dir)) };
    let mut ctl = Controller::with_seed(settings(Some(1)), MessageList::new(vec![msg]), 3);

    let faults = Faults { clipboard_failures: 2, ..Faults::default() };
    ctl.start(backend(&journal, faults)).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 1 });

    assert_eq!(
        acts(&journal),
        vec![Act::Focus, Act::Clip(4, 3), Act::Paste("primary"), Act::ClearClip, Act::Submit("primary")]
    );
}

#[tokio::test(start_paused = true)]
async fn broken_image_falls_back_to_text_only() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.png").to_string_lossy().into_owned();
    let journal = Journal::default();
    let msg = Message { text: "still here".into(), weight: 1, image_ref: Some(missing.clone()) };
    let mut ctl = Controller::with_seed(settings(Some(1)), MessageList::new(vec![msg]), 3);

    let (_c, mut events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 1 });

    assert_eq!(
        acts(&journal),
        vec![Act::Focus, Act::Type("primary", "still here".into()), Act::Submit("primary")]
    );
    let events = drain(&mut events);
    assert!(events.contains(&SenderEvent::ImageSkipped { reference: missing }));
}

#[tokio::test(start_paused = true)]
async fn undeliverable_messages_end_a_counted_run() {
    let journal = Journal::default();
    let list = MessageList::new(vec![
        Message { text: String::new(), weight: 5, image_ref: None },
        Message { text: String::new(), weight: 1, image_ref: Some("/no/such/file.png".into()) },
    ]);
    let mut ctl = Controller::with_seed(settings(Some(1)), list, 3);

    let (_c, mut events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(3600), ctl.wait())
        .await
        .expect("run should end on its own")
        .unwrap();

    assert_eq!(outcome, RunOutcome::NoMessages { sent: 0 });
    assert_eq!(submits(&journal), 0);
    assert!(typed(&journal).is_empty());
    // one focus per attempt, then it gives up
    assert_eq!(acts(&journal).iter().filter(|a| **a == Act::Focus).count(), 3);
    let events = drain(&mut events);
    assert!(!events.iter().any(|e| matches!(e, SenderEvent::Sent { .. })));
    assert!(events.iter().any(|e| matches!(e, SenderEvent::ImageSkipped { .. })));
}

#[tokio::test(start_paused = true)]
async fn undeliverable_messages_between_good_ones_do_not_stop_the_run() {
    let journal = Journal::default();
    let list = MessageList::new(vec![
        text("good", 1),
        Message { text: String::new(), weight: 1, image_ref: None },
    ]);
    let mut ctl = Controller::with_seed(settings(Some(3)), list, 11);

    ctl.start(backend(&journal, Faults::default())).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 3 });
    assert_eq!(typed(&journal), vec!["good", "good", "good"]);
}

#[tokio::test(start_paused = true)]
async fn keystroke_failure_switches_to_fallback_for_that_message_only() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("x\ny", 1)]);
    let mut s = settings(Some(2));
    s.allow_duplicates = true;
    let mut ctl = Controller::with_seed(s, list, 5);

    let faults = Faults { failing_lines: 1, ..Faults::default() };
    let (_c, mut events) = ctl.start(backend(&journal, faults)).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 2 });

    assert_eq!(
        acts(&journal),
        vec![
            Act::Focus,
            Act::Type("fallback", "x".into()),
            Act::Break("fallback"),
            Act::Type("fallback", "y".into()),
            Act::Submit("fallback"),
            Act::Focus,
            Act::Type("primary", "x".into()),
            Act::Break("primary"),
            Act::Type("primary", "y".into()),
            Act::Submit("primary"),
        ]
    );
    let flags: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SenderEvent::Sent { fallback, .. } => Some(fallback),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn both_input_mechanisms_failing_ends_the_run() {
    let journal = Journal::default();
    let mut ctl = Controller::with_seed(settings(None), MessageList::new(vec![text("x", 1)]), 5);

    let faults = Faults { failing_lines: u32::MAX, fallback_broken: true, ..Faults::default() };
    ctl.start(backend(&journal, faults)).unwrap();
    let outcome = ctl.wait().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { sent: 0, .. }), "{outcome:?}");
    assert!(outcome.is_failure());
    assert_eq!(submits(&journal), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_target_gives_up_after_bounded_checks() {
    let journal = Journal::default();
    let mut s = settings(None);
    s.sender.max_target_checks = Some(3);
    let mut ctl = Controller::with_seed(s, MessageList::new(vec![text("x", 1)]), 5);

    let started = tokio::time::Instant::now();
    let faults = Faults { missing_for: u32::MAX, ..Faults::default() };
    ctl.start(backend(&journal, faults)).unwrap();
    let outcome = ctl.wait().await.unwrap();

    assert_eq!(outcome, RunOutcome::TargetMissing { sent: 0, checks: 3 });
    // two 5 s waits between three checks
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11), "{waited:?}");
    assert!(acts(&journal).is_empty());
}

#[tokio::test(start_paused = true)]
async fn target_that_appears_later_is_used() {
    let journal = Journal::default();
    let mut ctl = Controller::with_seed(settings(Some(1)), MessageList::new(vec![text("late", 1)]), 5);

    let faults = Faults { missing_for: 2, ..Faults::default() };
    ctl.start(backend(&journal, faults)).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Completed { sent: 1 });
    assert_eq!(typed(&journal), vec!["late"]);
}

#[tokio::test(start_paused = true)]
async fn stop_lands_on_an_iteration_boundary() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("a", 1), text("b", 1)]);
    let mut ctl = Controller::with_seed(settings(None), list, 8);

    let (_c, mut events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    loop {
        match events.recv().await {
            Some(SenderEvent::Sent { count: 1, .. }) => break,
            Some(_) => continue,
            None => panic!("loop ended early"),
        }
    }
    assert!(ctl.is_running());
    let outcome = ctl.stop().await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled { sent: 1 });
    assert!(!ctl.is_running());
    // the in-flight message completed, nothing more was typed
    assert_eq!(submits(&journal), 1);
    let rest = drain(&mut events);
    assert_eq!(rest.last(), Some(&SenderEvent::Finished(RunOutcome::Cancelled { sent: 1 })));
    assert!(rest.contains(&SenderEvent::State(SendState::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn stop_before_the_first_step_sends_nothing() {
    let journal = Journal::default();
    let mut ctl = Controller::with_seed(settings(None), MessageList::new(vec![text("a", 1)]), 8);

    let (cancel, _events) = ctl.start(backend(&journal, Faults::default())).unwrap();
    cancel.cancel();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::Cancelled { sent: 0 });
    assert!(acts(&journal).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_while_waiting_for_the_target() {
    let journal = Journal::default();
    let mut s = settings(None);
    s.sender.max_target_checks = None;
    let mut ctl = Controller::with_seed(s, MessageList::new(vec![text("a", 1)]), 8);

    let faults = Faults { missing_for: u32::MAX, ..Faults::default() };
    ctl.start(backend(&journal, faults)).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(ctl.is_running());
    assert_eq!(ctl.stop().await.unwrap(), RunOutcome::Cancelled { sent: 0 });
}

#[tokio::test(start_paused = true)]
async fn zero_weight_pool_stops_instead_of_spinning() {
    let journal = Journal::default();
    let list = MessageList::new(vec![text("never", 0), text("nope", 0)]);
    let mut ctl = Controller::with_seed(settings(None), list, 8);

    ctl.start(backend(&journal, Faults::default())).unwrap();
    assert_eq!(ctl.wait().await.unwrap(), RunOutcome::NoMessages { sent: 0 });
    assert!(typed(&journal).is_empty());
}

#[tokio::test(start_paused = true)]
async fn only_one_loop_at_a_time() {
    let journal = Journal::default();
    let mut ctl = Controller::with_seed(settings(None), MessageList::new(vec![text("a", 1)]), 8);

    ctl.start(backend(&journal, Faults::default())).unwrap();
    assert!(matches!(ctl.start(backend(&journal, Faults::default())), Err(Error::AlreadyRunning)));
    ctl.stop().await.unwrap();

    // a finished loop can be replaced by a new one
    ctl.start(backend(&journal, Faults::default())).unwrap();
    assert!(ctl.stop().await.is_some());
    assert!(ctl.stop().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn invalid_sender_settings_are_rejected_at_start() {
    let journal = Journal::default();
    let mut s = settings(None);
    s.sender.min_delay_ms = 9_000;
    s.sender.max_delay_ms = 1_000;
    let mut ctl = Controller::with_seed(s, MessageList::new(vec![text("a", 1)]), 8);
    assert!(matches!(ctl.start(backend(&journal, Faults::default())), Err(Error::Config(_))));
}

#[tokio::test]
async fn list_edits_reach_the_pool() {
    let mut ctl = Controller::with_seed(settings(None), MessageList::new(vec![text("a", 1)]), 8);
    assert_eq!(ctl.pool_stats().await.unwrap().size, 1);

    let at = ctl.edit_messages(|l| Ok(l.add(text("b", 2)))).await.unwrap();
    assert_eq!(at, 1);
    let stats = ctl.pool_stats().await.unwrap();
    assert_eq!((stats.size, stats.remaining), (2, 2));

    assert!(ctl.edit_messages(|l| l.remove(9)).await.is_err());
    assert_eq!(ctl.messages().len(), 2);

    ctl.set_allow_duplicates(true).await.unwrap();
    assert!(ctl.settings().allow_duplicates);
    assert!(ctl.pool_stats().await.unwrap().allow_duplicates);

    ctl.set_messages(MessageList::default()).await.unwrap();
    assert_eq!(ctl.pool_stats().await.unwrap().size, 0);
}
