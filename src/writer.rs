// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The writer: the single task allowed to write to session sockets.
//!
//! One task drains a command queue and performs one `write_all` per
//! queued frame. Because there is exactly one writer, writes to the same
//! socket are automatically issued — and land on the wire — in the order
//! they were enqueued.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::{
    io::{AsyncWriteExt, WriteHalf},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::{BoxedTransport, SessionId};

/// Commands accepted by the writer task. `Register`/`Unregister` come
/// from the reactor as sessions start/stop/restart; `Write` comes from
/// both the reactor (rare; steady state never writes from there) and the
/// callback pool (acks).
pub(crate) enum WriteCommand {
    Register(SessionId, WriteHalf<BoxedTransport>),
    Unregister(SessionId),
    Write(SessionId, Bytes),
}

pub(crate) type WriteQueueTx = mpsc::Sender<WriteCommand>;
pub(crate) type WriteQueueRx = mpsc::Receiver<WriteCommand>;

pub(crate) fn write_queue(capacity: usize) -> (WriteQueueTx, WriteQueueRx) {
    mpsc::channel(capacity)
}

/// Runs the writer loop until either `rx` closes (every sender dropped)
/// or `cancel` fires. The reactor drops its sender once `stop_all` has
/// unregistered every session; but `PushClient` itself also holds a
/// sender clone for as long as it lives, so the channel alone never
/// closes while the client is still in scope. `cancel` is what actually
/// ends the loop on `stop_all`: once fired, any commands already queued
/// are drained with a final non-blocking pass and the loop exits. Acks
/// enqueued after that point find the channel closed and are dropped by
/// the sender, not by the writer (see `pool::run_job`).
pub(crate) async fn run(mut rx: WriteQueueRx, cancel: CancellationToken) {
    let mut halves: HashMap<SessionId, WriteHalf<BoxedTransport>> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                while let Ok(cmd) = rx.try_recv() {
                    apply(cmd, &mut halves).await;
                }
                break;
            },
            cmd = rx.recv() => {
                match cmd {
                    Some(cmd) => apply(cmd, &mut halves).await,
                    None => break,
                }
            },
        }
    }

    debug!("writer exiting: queue closed and drained");
}

async fn apply(cmd: WriteCommand, halves: &mut HashMap<SessionId, WriteHalf<BoxedTransport>>) {
    match cmd {
        WriteCommand::Register(id, half) => {
            halves.insert(id, half);
        },
        WriteCommand::Unregister(id) => {
            halves.remove(&id);
        },
        WriteCommand::Write(id, bytes) => {
            let Some(half) = halves.get_mut(&id) else {
                debug!(session = id.0, "dropping write to unregistered session");
                return;
            };
            if let Err(e) = half.write_all(&bytes).await {
                // The socket was closed concurrently (e.g. the reactor
                // is mid-restart). Discard the frame; the reactor's
                // next read will independently detect the same failure
                // and restart the session.
                warn!(session = id.0, error = %e, "write failed; discarding frame");
                halves.remove(&id);
            }
        },
    }
}
