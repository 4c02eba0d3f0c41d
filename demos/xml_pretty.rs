// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal end-to-end example: subscribe to a topic and print every
//! received XML payload.
//!
//! Usage: `cargo run --example xml_pretty -- <username> <password> <topic>`

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use push_monitor_rs::{
    control::MonitorOptions,
    pool::{PublishMessage, PushCallback},
    client::PushClient,
};
use quick_xml::{events::Event, Reader};

struct XmlPretty;

impl PushCallback for XmlPretty {
    fn on_message(&self, msg: &PublishMessage) -> bool {
        let mut reader = Reader::from_reader(&msg.payload[..]);
        let mut depth = 0usize;
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => {
                    println!(
                        "{}<{}>",
                        "  ".repeat(depth),
                        String::from_utf8_lossy(e.name().as_ref())
                    );
                    depth += 1;
                },
                Ok(Event::End(e)) => {
                    depth = depth.saturating_sub(1);
                    println!(
                        "{}</{}>",
                        "  ".repeat(depth),
                        String::from_utf8_lossy(e.name().as_ref())
                    );
                },
                Ok(Event::Text(t)) => {
                    let text = String::from_utf8_lossy(t.as_ref());
                    let text = text.trim();
                    if !text.is_empty() {
                        println!("{}{}", "  ".repeat(depth), text);
                    }
                },
                Ok(_) => {},
                Err(e) => {
                    eprintln!("payload is not valid XML: {e}");
                    return true;
                },
            }
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password), Some(topic)) = (args.next(), args.next(), args.next())
    else {
        bail!("usage: xml_pretty <username> <password> <topic>");
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
                        format: "xml".to_string(),
                    },
                )
                .await?
        },
    };

    client.create_session(Arc::new(XmlPretty), monitor_id).await?;

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    client.stop_all().await;
    client.delete_monitor(monitor_id).await?;

    Ok(())
}
