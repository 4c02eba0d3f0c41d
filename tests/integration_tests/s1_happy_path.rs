// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S1 — happy path, insecure, JSON: the server accepts the handshake,
//! sends one publish, the callback acks, and the client writes exactly
//! one `PUBLISH_MESSAGE_RECEIVED` for that block id.

use anyhow::Result;
use push_monitor_rs::{proto::frame::COMPRESSION_NONE, session::MonitorId};
use serial_test::serial;

use crate::integration_tests::{
    common::{test_client, RecordingCallback},
    mock_server::{read_ack, read_connection_request, send_connection_response, send_publish, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn happy_path_acks_once() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, mut rx) = RecordingCallback::new(true);

    let accept_client = client.clone();
    let create = tokio::spawn(async move {
        accept_client.create_session(callback.clone(), MonitorId(9001)).await.map(|_| callback)
    });

    let mut stream = server.accept().await?;
    let monitor_id = read_connection_request(&mut stream).await?;
    assert_eq!(monitor_id, 9001);
    send_connection_response(&mut stream, 200).await?;

    let callback = create.await??;

    send_publish(&mut stream, 7, COMPRESSION_NONE, b"{\"v\":1}").await?;

    let msg = rx.recv().await.expect("callback invoked");
    assert_eq!(msg.block_id, 7);
    assert_eq!(&msg.payload[..], b"{\"v\":1}");

    let (block_id, status) = read_ack(&mut stream).await?;
    assert_eq!(block_id, 7);
    assert_eq!(status, 200);
    assert_eq!(callback.invocations(), 1);

    client.stop_all().await;
    Ok(())
}
