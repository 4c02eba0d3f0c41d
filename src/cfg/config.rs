// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, path::PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a push monitoring client.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Credentials and transport parameters used to authenticate and dial
    /// the server.
    pub credentials: CredentialsConfig,
    /// Behavior of the reactor/pool/writer core.
    pub runtime: RuntimeConfig,
    /// Default options applied to monitors created via the control plane.
    pub monitor_defaults: MonitorDefaults,
}

/// Immutable-after-creation session credentials.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CredentialsConfig {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(default = "default_hostname", rename = "Hostname")]
    pub hostname: String,
    #[serde(default = "default_true", rename = "Secure")]
    pub secure: bool,
    #[serde(default, rename = "CaCerts")]
    pub ca_certs: Option<PathBuf>,
    /// Explicit opt-out of certificate verification when `ca_certs` is
    /// unset. Defaults to `false`: the system trust store is used instead
    /// of skipping verification (see DESIGN.md).
    #[serde(default, rename = "InsecureSkipVerify")]
    pub insecure_skip_verify: bool,
}

/// Runtime knobs for the reactor, callback pool, and writer.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_workers", rename = "Workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity", rename = "CallbackQueueCapacity")]
    pub callback_queue_capacity: usize,
    #[serde(default = "default_queue_capacity", rename = "WriteQueueCapacity")]
    pub write_queue_capacity: usize,
    #[serde(default = "default_handshake_timeout_secs", rename = "HandshakeTimeoutSecs")]
    pub handshake_timeout_secs: u64,
    /// Opt-in bounded exponential backoff for session restarts (off by
    /// default, matching the unconditional-restart source behavior).
    #[serde(default, rename = "RestartBackoff")]
    pub restart_backoff: Option<RestartBackoffConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RestartBackoffConfig {
    #[serde(rename = "InitialMs")]
    pub initial_ms: u64,
    #[serde(rename = "MaxMs")]
    pub max_ms: u64,
}

/// Default monitor-creation options, applied when a caller does not
/// override them explicitly.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MonitorDefaults {
    #[serde(default = "default_batch_size", rename = "BatchSize")]
    pub batch_size: u32,
    #[serde(default, rename = "BatchDuration")]
    pub batch_duration: u32,
    #[serde(default = "default_compression", rename = "Compression")]
    pub compression: String,
    #[serde(default = "default_format", rename = "Format")]
    pub format: String,
}

fn default_hostname() -> String {
    "developer.idigi.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    1
}
fn default_queue_capacity() -> usize {
    20
}
fn default_handshake_timeout_secs() -> u64 {
    10
}
fn default_batch_size() -> u32 {
    1
}
fn default_compression() -> String {
    "gzip".to_string()
}
fn default_format() -> String {
    "json".to_string()
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that cannot be expressed through serde alone.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.credentials.username.is_empty(),
            "Username must not be empty"
        );
        ensure!(
            !self.credentials.hostname.is_empty(),
            "Hostname must not be empty"
        );
        ensure!(self.runtime.workers >= 1, "Workers must be >= 1");
        ensure!(
            self.runtime.callback_queue_capacity >= 1,
            "CallbackQueueCapacity must be >= 1"
        );
        ensure!(
            self.runtime.write_queue_capacity >= 1,
            "WriteQueueCapacity must be >= 1"
        );
        if let Some(backoff) = &self.runtime.restart_backoff {
            ensure!(
                backoff.initial_ms >= 1 && backoff.initial_ms <= backoff.max_ms,
                "RestartBackoff.InitialMs must be in [1, MaxMs]"
            );
        }
        Ok(())
    }
}
