// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S4 — mid-stream disconnect: after two successful publishes the
//! server closes the connection; the reactor detects the short read,
//! restarts the session against a fresh socket, and publishes resume
//! normally on it.

use anyhow::Result;
use push_monitor_rs::{proto::frame::COMPRESSION_NONE, session::MonitorId};
use serial_test::serial;

use crate::integration_tests::{
    common::{test_client, RecordingCallback},
    mock_server::{read_ack, read_connection_request, send_connection_response, send_publish, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn disconnect_triggers_restart_on_fresh_socket() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, mut rx) = RecordingCallback::new(true);

    let accept_client = client.clone();
    let create =
        tokio::spawn(async move { accept_client.create_session(callback, MonitorId(9004)).await });

    let mut first = server.accept().await?;
    read_connection_request(&mut first).await?;
    send_connection_response(&mut first, 200).await?;
    create.await??;

    send_publish(&mut first, 1, COMPRESSION_NONE, b"{}").await?;
    rx.recv().await.expect("first publish delivered");
    read_ack(&mut first).await?;

    send_publish(&mut first, 2, COMPRESSION_NONE, b"{}").await?;
    rx.recv().await.expect("second publish delivered");
    read_ack(&mut first).await?;

    drop(first);

    let mut second = server.accept().await?;
    let monitor_id = read_connection_request(&mut second).await?;
    assert_eq!(monitor_id, 9004, "restart must re-dial for the same monitor id");
    send_connection_response(&mut second, 200).await?;

    send_publish(&mut second, 3, COMPRESSION_NONE, b"{}").await?;
    let msg = rx.recv().await.expect("publish resumes on the new socket");
    assert_eq!(msg.block_id, 3);
    read_ack(&mut second).await?;

    client.stop_all().await;
    Ok(())
}
