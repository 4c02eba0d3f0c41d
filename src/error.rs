// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed error surfaces for the push-client core.
//!
//! Protocol errors are narrow and module-local (mirroring
//! [`crate::proto::opcode::UnknownOpcode`]); [`PushError`] is the umbrella
//! type returned from the public client API.

use thiserror::Error;

/// Errors raised while decoding or validating the wire protocol.
///
/// Fatal for the session that produced them: the caller (`Session::start`
/// or the reactor's read loop) treats every variant as "this socket is
/// broken", never as something to retry in place.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("short header: got {got} bytes, need {HEADER_LEN}", HEADER_LEN = crate::proto::frame::HEADER_LEN)]
    ShortHeader { got: usize },

    #[error("short payload: got {got} bytes, need {need}")]
    ShortPayload { got: usize, need: usize },

    #[error("unexpected opcode: got {got:#04x}, expected {expected:#04x}")]
    UnexpectedOpcode { got: u16, expected: u16 },

    #[error("handshake rejected with status {status}")]
    HandshakeStatus { status: u16 },

    #[error("handshake timed out waiting for connection response")]
    HandshakeTimeout,

    #[error("connection response frame must be 10 bytes, got {got}")]
    BadResponseLength { got: usize },

    #[error("malformed publish payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised by the REST control plane (monitor create/find/delete).
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("control-plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control-plane returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("control-plane XML encoding failed: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("control-plane response missing expected field: {0}")]
    MissingField(&'static str),

    #[error("control-plane response had no Location header")]
    MissingLocation,
}

/// Top-level error type returned by the public [`crate::client::PushClient`] API.
#[derive(Debug, Error)]
pub enum PushError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("unknown monitor id {0}")]
    UnknownMonitor(u32),

    #[error("unknown session {0:?}")]
    UnknownSession(crate::session::SessionId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PushError>;
