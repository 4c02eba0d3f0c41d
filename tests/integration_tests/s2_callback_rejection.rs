// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S2 — callback rejection: the callback returns `false`, so no ack is
//! written and the socket stays open for the next publish.

use std::time::Duration;

use anyhow::Result;
use push_monitor_rs::{proto::frame::COMPRESSION_NONE, session::MonitorId};
use serial_test::serial;
use tokio::time::timeout;

use crate::integration_tests::{
    common::{test_client, RecordingCallback},
    mock_server::{read_ack, read_connection_request, send_connection_response, send_publish, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn rejected_callback_sends_no_ack() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, mut rx) = RecordingCallback::new(false);

    let accept_client = client.clone();
    let create = tokio::spawn(async move { accept_client.create_session(callback, MonitorId(9002)).await });

    let mut stream = server.accept().await?;
    read_connection_request(&mut stream).await?;
    send_connection_response(&mut stream, 200).await?;
    create.await??;

    send_publish(&mut stream, 11, COMPRESSION_NONE, b"{}").await?;
    let msg = rx.recv().await.expect("callback invoked");
    assert_eq!(msg.block_id, 11);

    // No ack should arrive within a short window.
    let result = timeout(Duration::from_millis(300), read_ack(&mut stream)).await;
    assert!(result.is_err(), "expected no ack to be written after a declined callback");

    // The socket is still usable: a second publish is still dispatched.
    send_publish(&mut stream, 12, COMPRESSION_NONE, b"{}").await?;
    let msg = rx.recv().await.expect("second callback invoked");
    assert_eq!(msg.block_id, 12);

    client.stop_all().await;
    Ok(())
}
