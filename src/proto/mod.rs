// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire protocol: the 6-byte frame header and the four opcode payloads
//! exchanged between the client and the push server.

pub mod frame;
pub mod opcode;

pub use frame::{
    decode_connection_response, decode_header, decode_publish, encode_ack,
    encode_connection_request, encode_header, encode_publish, Publish, PublishReserved,
};
pub use opcode::Opcode;
