// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

/// Push monitoring client command-line entry point.
#[derive(Debug, Parser)]
#[command(name = "push-monitor", about = "Subscribe to a push-monitored event stream")]
pub struct Cli {
    /// Path to the YAML config file (relative paths resolve against cwd).
    #[arg(long, default_value = "config.yaml")]
    pub config: String,

    /// Topics to monitor, e.g. `DeviceCore`, `FileDataCore`.
    #[arg(long = "topic", required = true)]
    pub topics: Vec<String>,

    /// Number of sessions to open against the resolved monitor.
    #[arg(long, default_value_t = 1)]
    pub sessions: u32,

    /// Payload format to request from the monitor; selects the pretty
    /// printing callback used for received messages.
    #[arg(long, default_value = "json", value_parser = ["json", "xml"])]
    pub format: String,

    /// Path to the YAML logger config file.
    #[arg(long, default_value = "config/logger.yaml")]
    pub logger_config: String,
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
