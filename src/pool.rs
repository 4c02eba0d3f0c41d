// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The bounded callback pool: a fixed number of worker tasks that invoke
//! user callbacks off the reactor's read path and enqueue acks for the
//! writer on success.
//!
//! Keeps user code off the I/O tasks entirely: callbacks run on
//! dedicated worker tasks and never touch a socket directly.

use std::{panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    proto,
    session::{BlockId, SessionId},
    writer::WriteCommand,
};

/// A decoded publish message handed to a user callback.
#[derive(Debug, Clone)]
pub struct PublishMessage {
    pub block_id: BlockId,
    pub payload: Bytes,
}

/// User hook invoked once per received publish.
///
/// Returns `true` to ack the message, `false` to leave it unacknowledged.
/// Panicking is treated the same as returning `false` — logged as a
/// [`crate::error::PushError`]-worthy event, never propagated.
pub trait PushCallback: Send + Sync + 'static {
    fn on_message(&self, msg: &PublishMessage) -> bool;
}

impl<F> PushCallback for F
where F: Fn(&PublishMessage) -> bool + Send + Sync + 'static
{
    fn on_message(&self, msg: &PublishMessage) -> bool {
        self(msg)
    }
}

/// One queued unit of callback work: which session's callback to invoke,
/// for which block id, carrying which payload.
pub(crate) struct CallbackJob {
    pub session_id: SessionId,
    pub callback: Arc<dyn PushCallback>,
    pub block_id: BlockId,
    pub payload: Bytes,
}

/// Sending half of the bounded callback queue. Cloned into the reactor;
/// `send` is the reactor's backpressure point — a full queue blocks
/// whichever task is enqueueing, which by construction is the reactor's
/// single read loop, so a slow callback slows reads on *every* session.
pub(crate) type CallbackQueueTx = mpsc::Sender<CallbackJob>;
pub(crate) type CallbackQueueRx = mpsc::Receiver<CallbackJob>;

pub(crate) fn callback_queue(capacity: usize) -> (CallbackQueueTx, CallbackQueueRx) {
    mpsc::channel(capacity)
}

/// Spawns `workers` tasks draining `rx`, each running callbacks
/// serially within itself but concurrently with the other workers.
/// `workers = 1` (the default) gives per-client-serial callback
/// execution; `workers > 1` permits genuine callback parallelism, which
/// callers must account for if their callback mutates shared state.
pub(crate) fn spawn_workers(
    workers: usize,
    rx: CallbackQueueRx,
    write_tx: mpsc::Sender<WriteCommand>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    (0..workers.max(1))
        .map(|worker_id| {
            let rx = Arc::clone(&rx);
            let write_tx = write_tx.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        debug!(worker_id, "callback worker exiting: queue closed");
                        return;
                    };
                    run_job(worker_id, job, &write_tx).await;
                }
            })
        })
        .collect()
}

async fn run_job(worker_id: usize, job: CallbackJob, write_tx: &mpsc::Sender<WriteCommand>) {
    let CallbackJob {
        session_id,
        callback,
        block_id,
        payload,
    } = job;

    let msg = PublishMessage { block_id, payload };
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| callback.on_message(&msg)));

    let acked = match outcome {
        Ok(true) => true,
        Ok(false) => {
            debug!(worker_id, block_id, "callback declined to ack message");
            false
        },
        Err(_) => {
            warn!(worker_id, block_id, "callback panicked; message left unacked");
            false
        },
    };

    if !acked {
        return;
    }

    let ack = proto::encode_ack(block_id, proto::frame::STATUS_OK);
    // If the writer has already exited (channel closed), there is no one
    // left to deliver this ack to; drop it silently.
    let _ = write_tx.send(WriteCommand::Write(session_id, ack)).await;
}
