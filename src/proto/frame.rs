// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Encode/decode functions for the push protocol's binary frames.
//!
//! All integers are network byte order (big-endian). The generic frame
//! header is `opcode:u16, length:u32` (6 bytes); `length` counts the bytes
//! that follow the header. The one exception is `CONNECTION_RESPONSE`,
//! whose second header field is four reserved bytes rather than a length —
//! it is always exactly 10 bytes on the wire and is decoded by a dedicated
//! function used only during the handshake.

use std::io::Write;

use bytes::{Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::{error::ProtocolError, proto::opcode::Opcode};

/// Size of the generic `opcode:u16, length:u32` header.
pub const HEADER_LEN: usize = 6;
/// Fixed size of a `CONNECTION_RESPONSE` frame.
pub const CONNECTION_RESPONSE_LEN: usize = 10;
/// Size of the reserved prefix inside a `PUBLISH_MESSAGE` payload.
const PUBLISH_PREFIX_LEN: usize = 10;

/// `0x00` on the wire: the payload is carried as-is.
pub const COMPRESSION_NONE: u8 = 0x00;
/// `0x01` on the wire: the payload is zlib-deflated.
pub const COMPRESSION_ZLIB: u8 = 0x01;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 403;

/// The reserved bytes a `PUBLISH_MESSAGE` frame carries but assigns no
/// semantics to. Kept round-trippable for diagnostics per the design
/// note on reserved frame bytes; never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReserved {
    pub after_block_id: [u8; 2],
    pub after_compression: [u8; 5],
}

/// A decoded `PUBLISH_MESSAGE` frame.
#[derive(Debug, Clone)]
pub struct Publish {
    pub block_id: u16,
    pub compression: u8,
    pub reserved: PublishReserved,
    /// Payload after decompression (if `compression == COMPRESSION_ZLIB`);
    /// otherwise identical to the bytes on the wire.
    pub payload: Bytes,
}

/// Encodes a `CONNECTION_REQUEST (0x01)` frame.
pub fn encode_connection_request(user: &str, pass: &str, monitor_id: u32) -> Bytes {
    let user = user.as_bytes();
    let pass = pass.as_bytes();

    let payload_len = 2 + 2 + user.len() + 2 + pass.len() + 4;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_len);

    buf.extend_from_slice(&(Opcode::ConnectionRequest as u16).to_be_bytes());
    buf.extend_from_slice(&(payload_len as u32).to_be_bytes());

    buf.extend_from_slice(&1u16.to_be_bytes()); // protocol version
    buf.extend_from_slice(&(user.len() as u16).to_be_bytes());
    buf.extend_from_slice(user);
    buf.extend_from_slice(&(pass.len() as u16).to_be_bytes());
    buf.extend_from_slice(pass);
    buf.extend_from_slice(&monitor_id.to_be_bytes());

    buf.freeze()
}

/// Encodes a `PUBLISH_MESSAGE_RECEIVED (0x04)` ack for `block_id`.
pub fn encode_ack(block_id: u16, status: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4);
    buf.extend_from_slice(&(Opcode::PublishMessageReceived as u16).to_be_bytes());
    buf.extend_from_slice(&4u32.to_be_bytes());
    buf.extend_from_slice(&block_id.to_be_bytes());
    buf.extend_from_slice(&status.to_be_bytes());
    buf.freeze()
}

/// Decodes the generic 6-byte frame header into `(opcode, length)`.
///
/// `length` is the number of payload bytes that follow the header.
pub fn decode_header(bytes: &[u8]) -> Result<(u16, u32), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::ShortHeader { got: bytes.len() });
    }
    let opcode = u16::from_be_bytes([bytes[0], bytes[1]]);
    let length = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    Ok((opcode, length))
}

/// Writes the generic 6-byte frame header.
pub fn encode_header(opcode: u16, length: u32) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    let mut w = &mut out[..];
    let _ = w.write_all(&opcode.to_be_bytes());
    let _ = w.write_all(&length.to_be_bytes());
    out
}

/// Decodes a `CONNECTION_RESPONSE (0x02)` frame, exactly 10 bytes on the
/// wire: `opcode:u16, 4 reserved, status:u16, 2 reserved`.
pub fn decode_connection_response(bytes: &[u8]) -> Result<(u16, u16), ProtocolError> {
    if bytes.len() != CONNECTION_RESPONSE_LEN {
        return Err(ProtocolError::BadResponseLength { got: bytes.len() });
    }
    let opcode = u16::from_be_bytes([bytes[0], bytes[1]]);
    let status = u16::from_be_bytes([bytes[6], bytes[7]]);
    Ok((opcode, status))
}

/// Decodes a `PUBLISH_MESSAGE (0x03)` payload (the `length` bytes that
/// follow the generic header). Decompresses the payload when the
/// compression flag is `0x01`; any other flag value is treated as
/// "uncompressed" for forward compatibility.
pub fn decode_publish(bytes: &[u8], length: usize) -> Result<Publish, ProtocolError> {
    if bytes.len() < length {
        return Err(ProtocolError::ShortPayload {
            got: bytes.len(),
            need: length,
        });
    }
    if length < PUBLISH_PREFIX_LEN {
        return Err(ProtocolError::ShortPayload {
            got: length,
            need: PUBLISH_PREFIX_LEN,
        });
    }

    let block_id = u16::from_be_bytes([bytes[0], bytes[1]]);
    let after_block_id = [bytes[2], bytes[3]];
    let compression = bytes[4];
    let after_compression = [bytes[5], bytes[6], bytes[7], bytes[8], bytes[9]];
    let raw_payload = &bytes[PUBLISH_PREFIX_LEN..length];

    let payload = match compression {
        COMPRESSION_ZLIB => {
            let mut decoder = ZlibDecoder::new(raw_payload);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| {
                ProtocolError::MalformedPayload(format!("zlib inflate failed: {e}"))
            })?;
            Bytes::from(out)
        },
        _ => Bytes::copy_from_slice(raw_payload),
    };

    Ok(Publish {
        block_id,
        compression,
        reserved: PublishReserved {
            after_block_id,
            after_compression,
        },
        payload,
    })
}

/// Encodes a `PUBLISH_MESSAGE (0x03)` frame. Used only by tests to
/// synthesize server traffic; the real server is the only sender of this
/// opcode in production.
pub fn encode_publish(block_id: u16, compression: u8, payload: &[u8]) -> Bytes {
    let body_len = PUBLISH_PREFIX_LEN + payload.len();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.extend_from_slice(&(Opcode::PublishMessage as u16).to_be_bytes());
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.extend_from_slice(&block_id.to_be_bytes());
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&[compression]);
    buf.extend_from_slice(&[0u8; 5]);
    buf.extend_from_slice(payload);
    buf.freeze()
}
