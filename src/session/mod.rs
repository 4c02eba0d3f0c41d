// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A `Session` owns the credentials and callback for one authenticated,
//! long-lived connection to the push server and knows how to dial,
//! handshake, and tear down the socket that backs it. It never reads or
//! writes steady-state traffic itself — the reactor reads, the writer
//! writes; `Session` only drives the handshake in [`Session::start`].

mod tls;
mod transport;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    io::{split, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    time::{sleep, timeout},
};
use tracing::debug;

pub use transport::BoxedTransport;

use crate::{
    error::{ProtocolError, PushError, Result},
    pool::PushCallback,
    proto::{self, frame::CONNECTION_RESPONSE_LEN},
};

/// Insecure (plaintext) push port.
pub const PORT_INSECURE: u16 = 3200;
/// TLS-wrapped push port.
pub const PORT_SECURE: u16 = 3201;

/// How long after a successful handshake the session waits before it is
/// handed to the reactor, absorbing the server's cluster-propagation
/// delay. Removing this without an alternative mechanism risks the
/// server dropping early publishes.
const POST_HANDSHAKE_SETTLE: Duration = Duration::from_millis(500);

/// Opaque numeric identifier for a monitor, produced by the control
/// plane and interpreted as a big-endian `u32` on the push wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub u32);

impl From<u32> for MonitorId {
    fn from(v: u32) -> Self {
        MonitorId(v)
    }
}

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate session handle used as the reactor's map key. Unlike the
/// source, which keys the session map by OS socket file descriptor, this
/// implementation assigns a monotonic id at `create_session` time: Tokio
/// does not expose a portable raw-fd-as-identity primitive, and a
/// surrogate id lets the reactor track a session across the fd churn of
/// `restart` without depending on OS internals. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    pub(crate) fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Credentials presented during both REST basic auth and the push
/// handshake. Immutable after client creation.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub secure: bool,
    pub ca_certs: Option<std::path::PathBuf>,
    pub insecure_skip_verify: bool,
}

/// Lifecycle state of a [`Session`], tracked for observability and to
/// guard `start`'s precondition; the authoritative "is this session
/// connected" state is really "does the reactor hold a read half for
/// it", but this flag lets `restart` decide whether a session stopped by
/// the user should be left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Starting,
    Active,
    Broken,
    Stopped,
}

/// One authenticated session bound to exactly one monitor.
///
/// This struct is the long-lived identity (monitor id, credentials,
/// callback); the live socket halves it produces from [`Session::start`]
/// are handed off to the reactor (read half) and the writer (write
/// half) rather than stored here, since only those tasks are allowed to
/// touch them.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub monitor_id: MonitorId,
    pub callback: Arc<dyn PushCallback>,
    credentials: Arc<Credentials>,
    state: std::sync::Mutex<SessionState>,
    handshake_timeout: Duration,
    /// Bumped on every `start`/`restart`; lets in-flight futures from a
    /// superseded generation recognize they are stale.
    generation: AtomicU64,
}

impl Session {
    pub fn new(
        monitor_id: MonitorId,
        callback: Arc<dyn PushCallback>,
        credentials: Arc<Credentials>,
        handshake_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::next(),
            monitor_id,
            callback,
            credentials,
            state: std::sync::Mutex::new(SessionState::New),
            handshake_timeout,
            generation: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state mutex poisoned")
    }

    fn set_state(&self, s: SessionState) {
        *self.state.lock().expect("session state mutex poisoned") = s;
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Opens a TCP (optionally TLS) socket to the credential's hostname,
    /// performs the synchronous `CONNECTION_REQUEST`/`CONNECTION_RESPONSE`
    /// handshake, waits out the post-handshake settle delay, and returns
    /// the split halves for the caller to register with the reactor and
    /// writer. Any failure along the way tears the socket back down and
    /// surfaces the error; the session is left `Broken` rather than
    /// `Active`.
    pub async fn start(
        &self,
    ) -> Result<(ReadHalf<BoxedTransport>, WriteHalf<BoxedTransport>)> {
        self.set_state(SessionState::Starting);
        self.generation.fetch_add(1, Ordering::AcqRel);

        match self.start_inner().await {
            Ok(halves) => {
                self.set_state(SessionState::Active);
                Ok(halves)
            },
            Err(e) => {
                self.set_state(SessionState::Broken);
                Err(e)
            },
        }
    }

    async fn start_inner(
        &self,
    ) -> Result<(ReadHalf<BoxedTransport>, WriteHalf<BoxedTransport>)> {
        let creds = &self.credentials;
        let port = if creds.secure { PORT_SECURE } else { PORT_INSECURE };

        let tcp = TcpStream::connect((creds.hostname.as_str(), port)).await?;
        tcp.set_nodelay(true)?;

        let transport: BoxedTransport = if creds.secure {
            tls::connect_tls(tcp, creds).await?
        } else {
            Box::new(tcp)
        };

        let (mut read_half, mut write_half) = split(transport);

        self.send_connection_request(&mut write_half, &mut read_half).await?;

        sleep(POST_HANDSHAKE_SETTLE).await;

        debug!(monitor_id = %self.monitor_id, "session handshake complete");
        Ok((read_half, write_half))
    }

    /// Synchronous handshake: send one `CONNECTION_REQUEST`, then read
    /// exactly 10 bytes of `CONNECTION_RESPONSE` within a bounded
    /// timeout. Non-`200` statuses (`403` unauthorized, `400` bad
    /// request, or anything else) are fatal, not retried.
    async fn send_connection_request(
        &self,
        write_half: &mut WriteHalf<BoxedTransport>,
        read_half: &mut ReadHalf<BoxedTransport>,
    ) -> Result<()> {
        let frame = proto::encode_connection_request(
            &self.credentials.username,
            &self.credentials.password,
            self.monitor_id.0,
        );
        write_half.write_all(&frame).await?;

        let mut response = [0u8; CONNECTION_RESPONSE_LEN];
        timeout(self.handshake_timeout, read_half.read_exact(&mut response))
            .await
            .map_err(|_| PushError::Protocol(ProtocolError::HandshakeTimeout))??;

        let (opcode, status) = proto::decode_connection_response(&response)?;
        if opcode != proto::Opcode::ConnectionResponse as u16 {
            return Err(ProtocolError::UnexpectedOpcode {
                got: opcode,
                expected: proto::Opcode::ConnectionResponse as u16,
            }
            .into());
        }
        if status != proto::frame::STATUS_OK {
            return Err(ProtocolError::HandshakeStatus { status }.into());
        }
        Ok(())
    }

    /// Idempotent: flips the bookkeeping state to `Stopped`. The actual
    /// socket halves are owned and dropped by the reactor/writer, which
    /// call this once they have released their copies.
    pub fn stop(&self) {
        self.set_state(SessionState::Stopped);
    }
}

/// ACK status code sent back for a successfully-handled publish.
pub const ACK_STATUS_OK: u16 = proto::frame::STATUS_OK;

/// Per-publish sequence token chosen by the server, echoed in an ack.
pub type BlockId = u16;
