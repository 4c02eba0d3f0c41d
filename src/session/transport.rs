// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A boxed, split-able transport so the reactor/writer can treat plain
//! TCP and TLS-wrapped sockets identically after the handshake.

use tokio::io::{AsyncRead, AsyncWrite};

/// Anything `Session::start` can hand off: a duplex, async byte stream.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Type-erased transport, so `tokio::io::split` produces a single
/// `ReadHalf`/`WriteHalf` pair regardless of whether the session is
/// plaintext or TLS.
pub type BoxedTransport = Box<dyn Transport>;
