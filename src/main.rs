// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use push_monitor_rs::{
    cfg::{cli::Cli, cli::resolve_config_path, config::Config, logger::init_logger},
    client::PushClient,
    control::MonitorOptions,
    pool::{PublishMessage, PushCallback},
};
use tracing::{info, warn};

/// Pretty-prints a publish payload as JSON. Always acks: a payload
/// that fails to parse as JSON is logged and still acknowledged, since
/// the wire frame itself was delivered intact.
struct JsonPrettyCallback;

impl PushCallback for JsonPrettyCallback {
    fn on_message(&self, msg: &PublishMessage) -> bool {
        match serde_json::from_slice::<serde_json::Value>(&msg.payload) {
            Ok(value) => {
                let pretty = serde_json::to_string_pretty(&value).unwrap_or_default();
                info!(block_id = msg.block_id, "{pretty}");
                true
            },
            Err(e) => {
                warn!(block_id = msg.block_id, error = %e, "payload is not valid JSON");
                true
            },
        }
    }
}

/// Pretty-prints a publish payload as XML.
struct XmlPrettyCallback;

impl PushCallback for XmlPrettyCallback {
    fn on_message(&self, msg: &PublishMessage) -> bool {
        match std::str::from_utf8(&msg.payload) {
            Ok(text) => {
                info!(block_id = msg.block_id, "{text}");
                true
            },
            Err(e) => {
                warn!(block_id = msg.block_id, error = %e, "payload is not valid UTF-8");
                true
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger_guard = init_logger(&cli.logger_config)?;

    let config_path = resolve_config_path(&cli.config)
        .with_context(|| format!("failed to resolve config path {}", cli.config))?;
    let cfg = Config::load_from_file(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let client = PushClient::from_config(&cfg).context("failed to build push client")?;

    info!(topics = ?cli.topics, "checking for an existing monitor");
    let monitor_id = match client.find_monitor(&cli.topics).await? {
        Some(id) => {
            info!(monitor = %id, "reusing existing monitor");
            id
        },
        None => {
            let opts = MonitorOptions {
                batch_size: cfg.monitor_defaults.batch_size,
                batch_duration: cfg.monitor_defaults.batch_duration,
                compression: cfg.monitor_defaults.compression.clone(),
                format: cli.format.clone(),
            };
            let id = client
                .create_monitor(&cli.topics, &opts)
                .await
                .context("failed to create monitor")?;
            info!(monitor = %id, "created monitor");
            id
        },
    };

    let callback: Arc<dyn PushCallback> = if cli.format == "xml" {
        Arc::new(XmlPrettyCallback)
    } else {
        Arc::new(JsonPrettyCallback)
    };

    for i in 0..cli.sessions.max(1) {
        client
            .create_session(Arc::clone(&callback), monitor_id)
            .await
            .with_context(|| format!("failed to create session #{i}"))?;
    }
    info!(sessions = cli.sessions, "sessions registered");

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    warn!("shutdown signal received; closing sessions");

    client.stop_all().await;
    client
        .delete_monitor(monitor_id)
        .await
        .context("failed to delete monitor")?;
    info!(monitor = %monitor_id, "monitor deleted");

    Ok(())
}
