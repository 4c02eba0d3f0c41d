// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S3 — handshake rejection: a `403` `CONNECTION_RESPONSE` must surface
//! as a protocol error from `create_session`, with no session left
//! behind.

use anyhow::Result;
use push_monitor_rs::{
    error::{ProtocolError, PushError},
    session::MonitorId,
};
use serial_test::serial;

use crate::integration_tests::{
    common::{test_client, RecordingCallback},
    mock_server::{read_connection_request, send_connection_response, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn unauthorized_handshake_is_fatal() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, _rx) = RecordingCallback::new(true);

    let accept_client = client.clone();
    let create = tokio::spawn(async move { accept_client.create_session(callback, MonitorId(9003)).await });

    let mut stream = server.accept().await?;
    read_connection_request(&mut stream).await?;
    send_connection_response(&mut stream, 403).await?;

    let err = create.await?.expect_err("handshake rejection must surface as an error");
    assert!(matches!(
        err,
        PushError::Protocol(ProtocolError::HandshakeStatus { status: 403 })
    ));

    client.stop_all().await;
    Ok(())
}
