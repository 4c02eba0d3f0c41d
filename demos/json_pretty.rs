// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal end-to-end example: subscribe to a topic and pretty-print
//! every received JSON payload.
//!
//! Usage: `cargo run --example json_pretty -- <username> <password> <topic>`

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use push_monitor_rs::{
    control::MonitorOptions,
    pool::{PublishMessage, PushCallback},
    client::PushClient,
};

struct JsonPretty;

impl PushCallback for JsonPretty {
    fn on_message(&self, msg: &PublishMessage) -> bool {
        match serde_json::from_slice::<serde_json::Value>(&msg.payload) {
            Ok(value) => {
                println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
                true
            },
            Err(e) => {
                eprintln!("payload is not valid JSON: {e}");
                true
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password), Some(topic)) = (args.next(), args.next(), args.next())
    else {
        bail!("usage: json_pretty <username> <password> <topic>");
    };

    let client = PushClient::new_client(username, password, None, true, None, 1)
        .context("failed to build push client")?;

    let topics = vec![topic];
    let monitor_id = match client.find_monitor(&topics).await? {
        Some(id) => id,
        None => {
            client
                .create_monitor(
                    &topics,
                    &MonitorOptions {
                        batch_size: 1,
                        batch_duration: 0,
                        compression: "gzip".to_string(),
                        format: "json".to_string(),
                    },
                )
                .await?
        },
    };

    client.create_session(Arc::new(JsonPretty), monitor_id).await?;

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    client.stop_all().await;
    client.delete_monitor(monitor_id).await?;

    Ok(())
}
