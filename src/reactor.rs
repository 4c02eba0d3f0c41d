// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The reactor: the single task that ever reads from a session socket.
//!
//! Every session's steady-state read lives here as a one-shot task
//! ("read exactly one frame, then hand the half back") rather than a
//! long-running per-session loop. That is what makes the callback
//! queue's backpressure global instead of per-session: handing a
//! decoded publish to the bounded queue is a plain `.await` on this
//! same task, so a full queue stalls the reactor — and therefore the
//! respawning of every session's next read — until a worker frees a
//! slot.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, ReadHalf},
    sync::mpsc,
    task::JoinSet,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::RestartBackoffConfig,
    error::PushError,
    pool::{CallbackJob, CallbackQueueTx},
    proto,
    session::{BoxedTransport, Session, SessionId, SessionState},
    writer::{WriteCommand, WriteQueueTx},
};

/// A session the control thread has just dialed and handshaked,
/// handed to the reactor for steady-state reading.
pub(crate) struct NewSession {
    pub session: Arc<Session>,
    pub read_half: ReadHalf<BoxedTransport>,
}

pub(crate) type NewSessionTx = mpsc::UnboundedSender<NewSession>;
pub(crate) type NewSessionRx = mpsc::UnboundedReceiver<NewSession>;

type ReadOutcome = (
    Arc<Session>,
    ReadHalf<BoxedTransport>,
    std::result::Result<(u16, Bytes), PushError>,
);

/// Runs until `cancel` fires. Consumes newly-started sessions from
/// `new_rx`, multiplexes their reads, hands decoded publishes to
/// `callback_tx`, and restarts sessions whose socket breaks.
pub(crate) async fn run(
    mut new_rx: NewSessionRx,
    callback_tx: CallbackQueueTx,
    write_tx: WriteQueueTx,
    restart_backoff: Option<RestartBackoffConfig>,
    cancel: CancellationToken,
) {
    let mut reads: JoinSet<ReadOutcome> = JoinSet::new();
    // Tracks every session handed to this reactor, independent of whether
    // it currently has a read in flight, so shutdown can call `stop()` on
    // all of them even while one is mid-restart.
    let mut known: HashMap<SessionId, Arc<Session>> = HashMap::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("reactor shutting down");
                break;
            }

            Some(new_session) = new_rx.recv() => {
                known.insert(new_session.session.id, Arc::clone(&new_session.session));
                reads.spawn(read_one(new_session.session, new_session.read_half));
            }

            Some(joined) = reads.join_next(), if !reads.is_empty() => {
                match joined {
                    Ok((session, read_half, outcome)) => {
                        handle_outcome(
                            &mut reads,
                            &mut known,
                            session,
                            read_half,
                            outcome,
                            &callback_tx,
                            &write_tx,
                            restart_backoff.as_ref(),
                            &cancel,
                        )
                        .await;
                    },
                    Err(e) => {
                        // A read task panicked (none of our read code
                        // unwraps, so this should not occur in practice).
                        // The session it belonged to is unrecoverable
                        // here: its socket half is gone with the task.
                        warn!(error = %e, "reactor read task panicked; session abandoned");
                    },
                }
            }
        }
    }

    reads.shutdown().await;
    for session in known.values() {
        session.stop();
    }
    drop(write_tx);
}

async fn handle_outcome(
    reads: &mut JoinSet<ReadOutcome>,
    known: &mut HashMap<SessionId, Arc<Session>>,
    session: Arc<Session>,
    read_half: ReadHalf<BoxedTransport>,
    outcome: std::result::Result<(u16, Bytes), PushError>,
    callback_tx: &CallbackQueueTx,
    write_tx: &WriteQueueTx,
    restart_backoff: Option<&RestartBackoffConfig>,
    cancel: &CancellationToken,
) {
    let (opcode, payload) = match outcome {
        Ok(frame) => frame,
        Err(e) => {
            warn!(session = session.id.0, error = %e, "session read failed");
            restart(reads, known, session, write_tx, restart_backoff, cancel).await;
            return;
        },
    };

    if opcode != proto::Opcode::PublishMessage as u16 {
        // The control-plane opcodes are never seen in steady state; skip
        // the frame and keep reading on the same, otherwise-healthy
        // socket rather than tearing it down.
        warn!(session = session.id.0, opcode, "unexpected opcode on steady-state socket");
        reads.spawn(read_one(session, read_half));
        return;
    }

    let publish = match proto::decode_publish(&payload, payload.len()) {
        Ok(p) => p,
        Err(e) => {
            warn!(session = session.id.0, error = %e, "malformed publish frame");
            restart(reads, known, session, write_tx, restart_backoff, cancel).await;
            return;
        },
    };

    let job = CallbackJob {
        session_id: session.id,
        callback: Arc::clone(&session.callback),
        block_id: publish.block_id,
        payload: publish.payload,
    };

    // The backpressure point: while the callback queue is full this
    // `.await` parks the reactor itself, so no other session's read is
    // respawned either.
    if callback_tx.send(job).await.is_err() {
        debug!(session = session.id.0, "callback queue closed; dropping message");
        return;
    }

    reads.spawn(read_one(session, read_half));
}

/// Tears down and re-dials a broken session.
///
/// Baseline behavior (`backoff = None`, the default): a single attempt.
/// On failure the session is dropped from `known` and not retried
/// further, matching §4.5 — this is the only path that runs inline on
/// the single reader task, so retrying here without bound would starve
/// every other session's reads (and new-session intake) on one dead
/// server. `restart_backoff` opts into a bounded exponential retry loop
/// instead, for callers who want the reactor itself to keep trying.
async fn restart(
    reads: &mut JoinSet<ReadOutcome>,
    known: &mut HashMap<SessionId, Arc<Session>>,
    session: Arc<Session>,
    write_tx: &WriteQueueTx,
    backoff: Option<&RestartBackoffConfig>,
    cancel: &CancellationToken,
) {
    if session.state() == SessionState::Stopped || cancel.is_cancelled() {
        debug!(session = session.id.0, "not restarting a stopped session");
        return;
    }

    let _ = write_tx.send(WriteCommand::Unregister(session.id)).await;

    let mut delay_ms = backoff.map(|b| b.initial_ms);
    loop {
        if cancel.is_cancelled() || session.state() == SessionState::Stopped {
            return;
        }

        match session.start().await {
            Ok((read_half, write_half)) => {
                if write_tx
                    .send(WriteCommand::Register(session.id, write_half))
                    .await
                    .is_err()
                {
                    return;
                }
                info!(session = session.id.0, monitor = %session.monitor_id, "session restarted");
                reads.spawn(read_one(session, read_half));
                return;
            },
            Err(e) => {
                warn!(session = session.id.0, error = %e, "restart attempt failed");

                let Some(cfg) = backoff else {
                    warn!(
                        session = session.id.0,
                        "no backoff configured; dropping session rather than retrying forever"
                    );
                    known.remove(&session.id);
                    return;
                };

                let ms = delay_ms.unwrap_or(cfg.initial_ms);
                sleep(Duration::from_millis(ms)).await;
                delay_ms = Some((ms * 2).min(cfg.max_ms));
            },
        }
    }
}

async fn read_one(session: Arc<Session>, mut read_half: ReadHalf<BoxedTransport>) -> ReadOutcome {
    let outcome = read_frame(&mut read_half).await;
    (session, read_half, outcome)
}

async fn read_frame(
    read_half: &mut ReadHalf<BoxedTransport>,
) -> std::result::Result<(u16, Bytes), PushError> {
    let mut header = [0u8; proto::frame::HEADER_LEN];
    read_half.read_exact(&mut header).await?;
    let (opcode, length) = proto::decode_header(&header)?;

    let mut payload = vec![0u8; length as usize];
    read_half.read_exact(&mut payload).await?;

    Ok((opcode, Bytes::from(payload)))
}
