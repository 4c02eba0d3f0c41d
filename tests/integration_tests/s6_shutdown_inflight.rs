// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S6 — shutdown with an in-flight callback: `stop_all` must still
//! return once the callback finishes, and the ack it produces after
//! the writer has drained is discarded rather than erroring.

use std::time::Duration;

use anyhow::Result;
use push_monitor_rs::{proto::frame::COMPRESSION_NONE, session::MonitorId};
use serial_test::serial;
use tokio::time::timeout;

use crate::integration_tests::{
    common::{test_client, SlowCallback},
    mock_server::{read_connection_request, send_connection_response, send_publish, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn stop_all_waits_out_a_sleeping_callback() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, started) = SlowCallback::new(Duration::from_millis(400));

    let accept_client = client.clone();
    let create =
        tokio::spawn(async move { accept_client.create_session(callback, MonitorId(9006)).await });

    let mut stream = server.accept().await?;
    read_connection_request(&mut stream).await?;
    send_connection_response(&mut stream, 200).await?;
    create.await??;

    send_publish(&mut stream, 5, COMPRESSION_NONE, b"{}").await?;
    // Wait for the worker to actually pick the job up before shutting
    // down, so the race being exercised is "stop_all during callback",
    // not "stop_all before the callback queue ever drains".
    started.notified().await;

    // stop_all must complete even though the callback worker is still
    // sleeping; it is not joined, only the reader/writer are.
    timeout(Duration::from_secs(2), client.stop_all())
        .await
        .expect("stop_all must not hang on an in-flight callback");

    Ok(())
}
