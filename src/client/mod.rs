// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The public client API: REST control-plane operations (`create_monitor`,
//! `find_monitor`, `delete_monitor`) plus `create_session`/`stop_all`, which
//! lazily spin up and tear down the reactor, writer, and callback-pool
//! tasks that back every session.
//!
//! A `DashMap`-keyed registry of live sessions (`MonitorId` → `Session`)
//! sitting in front of the long-lived reactor/writer/pool tasks that
//! actually move bytes.

use std::{sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::config::{Config, RuntimeConfig},
    control::{ControlPlaneClient, MonitorOptions},
    error::{PushError, Result},
    pool::{self, PushCallback},
    reactor::{self, NewSession, NewSessionTx},
    session::{Credentials, MonitorId, Session},
    writer::{self, WriteCommand, WriteQueueTx},
};

const DEFAULT_HOSTNAME: &str = "developer.idigi.com";

/// Tasks spawned once, on the first [`PushClient::create_session`] call,
/// and torn down together by [`PushClient::stop_all`].
struct IoTasks {
    new_session_tx: NewSessionTx,
    write_tx: WriteQueueTx,
    cancel: CancellationToken,
    /// Reactor and writer join handles, awaited in order by `stop_all`.
    /// Callback workers are daemon tasks and are intentionally not
    /// tracked here.
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

/// Orchestrates the REST control plane and the set of push sessions
/// derived from it. One `PushClient` owns exactly one reactor, one
/// writer, and one callback pool, shared by every session it creates.
pub struct PushClient {
    control: ControlPlaneClient,
    credentials: Arc<Credentials>,
    runtime: RuntimeConfig,
    sessions: DashMap<MonitorId, Arc<Session>>,
    io: OnceCell<IoTasks>,
}

impl PushClient {
    /// Builds a client from explicit credentials.
    pub fn new_client(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: Option<String>,
        secure: bool,
        ca_certs: Option<std::path::PathBuf>,
        workers: usize,
    ) -> anyhow::Result<Arc<Self>> {
        let credentials = Credentials {
            username: username.into(),
            password: password.into(),
            hostname: hostname.unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            secure,
            ca_certs,
            insecure_skip_verify: false,
        };
        let runtime = RuntimeConfig {
            workers: workers.max(1),
            callback_queue_capacity: 20,
            write_queue_capacity: 20,
            handshake_timeout_secs: 10,
            restart_backoff: None,
        };
        Self::build(credentials, runtime)
    }

    /// Builds a client from a parsed [`Config`], carrying its runtime and
    /// credential knobs over verbatim.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Arc<Self>> {
        let credentials = Credentials {
            username: cfg.credentials.username.clone(),
            password: cfg.credentials.password.clone(),
            hostname: cfg.credentials.hostname.clone(),
            secure: cfg.credentials.secure,
            ca_certs: cfg.credentials.ca_certs.clone(),
            insecure_skip_verify: cfg.credentials.insecure_skip_verify,
        };
        Self::build(credentials, cfg.runtime.clone())
    }

    fn build(credentials: Credentials, runtime: RuntimeConfig) -> anyhow::Result<Arc<Self>> {
        let control = ControlPlaneClient::new(&credentials)?;
        Ok(Arc::new(Self {
            control,
            credentials: Arc::new(credentials),
            runtime,
            sessions: DashMap::new(),
            io: OnceCell::new(),
        }))
    }

    /// Creates a monitor for `topics` with the given options and returns
    /// its assigned id.
    pub async fn create_monitor(
        &self,
        topics: &[String],
        opts: &MonitorOptions,
    ) -> Result<MonitorId> {
        Ok(self.control.create_monitor(topics, opts).await?)
    }

    /// Looks up an existing monitor by topic set; `None` means no match.
    pub async fn find_monitor(&self, topics: &[String]) -> Result<Option<MonitorId>> {
        Ok(self.control.find_monitor(topics).await?)
    }

    /// Deletes a monitor.
    pub async fn delete_monitor(&self, id: MonitorId) -> Result<()> {
        Ok(self.control.delete_monitor(id).await?)
    }

    /// Registers `callback` against `monitor_id`, dials and handshakes the
    /// session, and hands it to the reactor/writer. Idempotent: calling
    /// this a second time for a monitor id that is already registered
    /// returns the existing session without dialing again.
    pub async fn create_session(
        &self,
        callback: Arc<dyn PushCallback>,
        monitor_id: MonitorId,
    ) -> Result<Arc<Session>> {
        if let Some(existing) = self.sessions.get(&monitor_id) {
            return Ok(Arc::clone(existing.value()));
        }

        let io = self.io_tasks().await;

        let session = Session::new(
            monitor_id,
            callback,
            Arc::clone(&self.credentials),
            Duration::from_secs(self.runtime.handshake_timeout_secs),
        );

        let (read_half, write_half) = session.start().await?;

        io.write_tx
            .send(WriteCommand::Register(session.id, write_half))
            .await
            .map_err(|_| PushError::Other(anyhow::anyhow!("writer task has exited")))?;

        io.new_session_tx
            .send(NewSession {
                session: Arc::clone(&session),
                read_half,
            })
            .map_err(|_| PushError::Other(anyhow::anyhow!("reactor task has exited")))?;

        match self.sessions.entry(monitor_id) {
            Entry::Vacant(e) => {
                e.insert(Arc::clone(&session));
            },
            Entry::Occupied(e) => {
                // Lost a race with a concurrent `create_session` for the
                // same monitor id: keep the winner, tear down ours.
                session.stop();
                return Ok(Arc::clone(e.get()));
            },
        }

        Ok(session)
    }

    /// Blocks until the reader and writer tasks have exited. A no-op if
    /// no session was ever created. Any ack a callback worker enqueues
    /// after the writer has drained is silently discarded.
    pub async fn stop_all(&self) {
        let Some(io) = self.io.get() else { return };
        io.cancel.cancel();

        let mut tasks = io.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }

    async fn io_tasks(&self) -> &IoTasks {
        self.io
            .get_or_init(|| async {
                let (callback_tx, callback_rx) =
                    pool::callback_queue(self.runtime.callback_queue_capacity);
                let (write_tx, write_rx) = writer::write_queue(self.runtime.write_queue_capacity);
                let (new_session_tx, new_session_rx): (NewSessionTx, _) =
                    mpsc::unbounded_channel();
                let cancel = CancellationToken::new();

                // Daemon tasks: not tracked for join.
                let _workers =
                    pool::spawn_workers(self.runtime.workers, callback_rx, write_tx.clone());

                let writer_task = tokio::spawn(writer::run(write_rx, cancel.clone()));
                let reactor_task = tokio::spawn(reactor::run(
                    new_session_rx,
                    callback_tx,
                    write_tx.clone(),
                    self.runtime.restart_backoff.clone(),
                    cancel.clone(),
                ));

                IoTasks {
                    new_session_tx,
                    write_tx,
                    cancel,
                    tasks: Mutex::new(vec![reactor_task, writer_task]),
                }
            })
            .await
    }
}
