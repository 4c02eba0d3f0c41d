// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A minimal in-process stand-in for the push server, built on a bare
//! `tokio::net::TcpListener`. No mocking crate: the wire protocol is
//! small enough that hand-writing the handshake/publish/ack frames is
//! less code than wiring up a mock framework, and it keeps the test
//! driving real bytes through the real codec on the client side.
//!
//! Bound to the fixed insecure push port, since `Session::start` always
//! dials `(hostname, 3200)` for a non-secure credential and there is no
//! way to override that from a test. Every test that uses this must be
//! `#[serial]` so only one test at a time owns the port.

use anyhow::{bail, Result};
use push_monitor_rs::proto::{self, Opcode};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

pub const INSECURE_PORT: u16 = 3200;

pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", INSECURE_PORT)).await?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> Result<TcpStream> {
        let (stream, _) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Reads one `CONNECTION_REQUEST` frame and returns the monitor id it
/// carries. Ignores username/password; those are exercised by the
/// control-plane unit tests, not the push wire tests.
pub async fn read_connection_request(stream: &mut TcpStream) -> Result<u32> {
    let mut header = [0u8; 6];
    stream.read_exact(&mut header).await?;
    let (opcode, length) = proto::decode_header(&header)?;
    if opcode != Opcode::ConnectionRequest as u16 {
        bail!("expected CONNECTION_REQUEST, got opcode {opcode:#06x}");
    }

    let mut body = vec![0u8; length as usize];
    stream.read_exact(&mut body).await?;

    let ulen = u16::from_be_bytes([body[2], body[3]]) as usize;
    let plen_off = 4 + ulen;
    let plen = u16::from_be_bytes([body[plen_off], body[plen_off + 1]]) as usize;
    let mon_off = plen_off + 2 + plen;
    let monitor_id = u32::from_be_bytes([
        body[mon_off],
        body[mon_off + 1],
        body[mon_off + 2],
        body[mon_off + 3],
    ]);
    Ok(monitor_id)
}

/// Writes the fixed 10-byte `CONNECTION_RESPONSE` frame.
pub async fn send_connection_response(stream: &mut TcpStream, status: u16) -> Result<()> {
    let mut frame = [0u8; 10];
    frame[0..2].copy_from_slice(&(Opcode::ConnectionResponse as u16).to_be_bytes());
    frame[6..8].copy_from_slice(&status.to_be_bytes());
    stream.write_all(&frame).await?;
    Ok(())
}

/// Writes a `PUBLISH_MESSAGE` frame for `block_id` carrying `payload`
/// (already compressed, if `compression` says so).
pub async fn send_publish(
    stream: &mut TcpStream,
    block_id: u16,
    compression: u8,
    payload: &[u8],
) -> Result<()> {
    let frame = proto::encode_publish(block_id, compression, payload);
    stream.write_all(&frame).await?;
    Ok(())
}

/// Reads one `PUBLISH_MESSAGE_RECEIVED` ack and returns `(block_id, status)`.
pub async fn read_ack(stream: &mut TcpStream) -> Result<(u16, u16)> {
    let mut header = [0u8; 6];
    stream.read_exact(&mut header).await?;
    let (opcode, length) = proto::decode_header(&header)?;
    if opcode != Opcode::PublishMessageReceived as u16 {
        bail!("expected PUBLISH_MESSAGE_RECEIVED, got opcode {opcode:#06x}");
    }
    let mut body = vec![0u8; length as usize];
    stream.read_exact(&mut body).await?;
    let block_id = u16::from_be_bytes([body[0], body[1]]);
    let status = u16::from_be_bytes([body[2], body[3]]);
    Ok((block_id, status))
}
