// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Opcodes carried in the first two bytes of every frame header.
//!
//! ```text
//!  byte 0-1   byte 2-5
//! +--------+------------+
//! | opcode | length(u32)|   ← 6-byte header, network byte order
//! +--------+------------+
//! ```

use std::convert::TryFrom;

use thiserror::Error;

/// All opcodes defined by the push protocol.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    ConnectionRequest = 0x01,
    ConnectionResponse = 0x02,
    PublishMessage = 0x03,
    PublishMessageReceived = 0x04,
}

impl Opcode {
    #[inline]
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0x01 => Self::ConnectionRequest,
            0x02 => Self::ConnectionResponse,
            0x03 => Self::PublishMessage,
            0x04 => Self::PublishMessageReceived,
            _ => return None,
        })
    }
}

/// Returned when a frame header carries an opcode outside `0x01..=0x04`.
#[derive(Debug, Error)]
#[error("invalid opcode: {0:#06x}")]
pub struct UnknownOpcode(pub u16);

impl TryFrom<u16> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Opcode::from_u16(v).ok_or(UnknownOpcode(v))
    }
}
