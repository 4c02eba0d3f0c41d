// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! S5 — compressed payload: a zlib-deflated publish is inflated before
//! it reaches the callback.

use std::io::Write as _;

use anyhow::Result;
use flate2::{write::ZlibEncoder, Compression};
use push_monitor_rs::{proto::frame::COMPRESSION_ZLIB, session::MonitorId};
use serial_test::serial;

use crate::integration_tests::{
    common::{test_client, RecordingCallback},
    mock_server::{read_connection_request, send_connection_response, send_publish, MockServer},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn zlib_payload_is_decompressed_before_delivery() -> Result<()> {
    let server = MockServer::bind().await?;
    let client = test_client()?;
    let (callback, mut rx) = RecordingCallback::new(true);

    let accept_client = client.clone();
    let create =
        tokio::spawn(async move { accept_client.create_session(callback, MonitorId(9005)).await });

    let mut stream = server.accept().await?;
    read_connection_request(&mut stream).await?;
    send_connection_response(&mut stream, 200).await?;
    create.await??;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello").expect("compress");
    let compressed = encoder.finish().expect("finish deflate");

    send_publish(&mut stream, 42, COMPRESSION_ZLIB, &compressed).await?;

    let msg = rx.recv().await.expect("callback invoked");
    assert_eq!(msg.block_id, 42);
    assert_eq!(&msg.payload[..], b"hello");

    client.stop_all().await;
    Ok(())
}
