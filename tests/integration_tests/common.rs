// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use push_monitor_rs::{
    client::PushClient,
    pool::{PublishMessage, PushCallback},
};
use tokio::sync::mpsc;

/// A callback that records every delivered message on an unbounded
/// channel and acks (or not) according to a fixed verdict.
pub struct RecordingCallback {
    tx: mpsc::UnboundedSender<PublishMessage>,
    ack: bool,
    invocations: AtomicUsize,
}

impl RecordingCallback {
    pub fn new(ack: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<PublishMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                ack,
                invocations: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl PushCallback for RecordingCallback {
    fn on_message(&self, msg: &PublishMessage) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(msg.clone());
        self.ack
    }
}

/// A callback that blocks the calling worker for `delay` before
/// acknowledging, used to exercise `stop_all` against an in-flight
/// callback (scenario S6).
pub struct SlowCallback {
    delay: std::time::Duration,
    started: Arc<tokio::sync::Notify>,
}

impl SlowCallback {
    pub fn new(delay: std::time::Duration) -> (Arc<Self>, Arc<tokio::sync::Notify>) {
        let started = Arc::new(tokio::sync::Notify::new());
        (
            Arc::new(Self {
                delay,
                started: Arc::clone(&started),
            }),
            started,
        )
    }
}

impl PushCallback for SlowCallback {
    fn on_message(&self, _msg: &PublishMessage) -> bool {
        self.started.notify_one();
        std::thread::sleep(self.delay);
        true
    }
}

/// Builds a client pointed at the in-process mock server: insecure,
/// `127.0.0.1`, single callback worker.
pub fn test_client() -> Result<Arc<PushClient>> {
    PushClient::new_client("alice", "secret", Some("127.0.0.1".to_string()), false, None, 1)
        .context("failed to build test push client")
}
