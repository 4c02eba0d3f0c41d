// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REST control plane: monitor lifecycle (create/find/delete) over HTTPS.
//!
//! The push protocol itself is a closed binary frame exchange; monitors
//! are provisioned and torn down through this ordinary REST API first.
//! Kept separate from [`crate::session`] and [`crate::reactor`] so the
//! binary-protocol core has no knowledge of HTTP at all.

use anyhow::Context;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{error::ControlPlaneError, session::Credentials, session::MonitorId};

/// Monitor-creation options passed to [`ControlPlaneClient::create_monitor`].
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub batch_size: u32,
    pub batch_duration: u32,
    pub compression: String,
    pub format: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "Monitor")]
struct MonitorRequest {
    #[serde(rename = "monTopic")]
    mon_topic: String,
    #[serde(rename = "monBatchSize")]
    mon_batch_size: u32,
    #[serde(rename = "monBatchDuration")]
    mon_batch_duration: u32,
    #[serde(rename = "monFormatType")]
    mon_format_type: String,
    #[serde(rename = "monTransportType")]
    mon_transport_type: String,
    #[serde(rename = "monCompression")]
    mon_compression: String,
}

#[derive(Debug, Deserialize)]
struct MonitorListResponse {
    #[serde(rename = "resultSize", default)]
    result_size: u32,
    #[serde(default)]
    items: Vec<MonitorListItem>,
}

#[derive(Debug, Deserialize)]
struct MonitorListItem {
    #[serde(rename = "monId")]
    mon_id: u32,
}

/// Thin `reqwest`-based client for the three monitor operations the core
/// needs: create, find-by-topic, delete. Every non-success HTTP response
/// becomes a [`ControlPlaneError::UnexpectedStatus`] carrying the status
/// and body; none of these calls retry.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl ControlPlaneClient {
    /// Builds the underlying HTTP client from the same credentials used
    /// for the push handshake, including TLS trust configuration.
    pub fn new(creds: &Credentials) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();

        if creds.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &creds.ca_certs {
            let pem = std::fs::read(path)
                .with_context(|| format!("failed to read CA bundle {path:?}"))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("invalid CA bundle {path:?}"))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().context("failed to build control-plane HTTP client")?;
        let scheme = if creds.secure { "https" } else { "http" };

        Ok(Self {
            http,
            base_url: format!("{scheme}://{}/ws", creds.hostname),
            username: creds.username.clone(),
            password: creds.password.clone(),
        })
    }

    /// Creates a monitor for `topics` and returns its assigned id, read
    /// from the `Location` header of a `201` response.
    pub async fn create_monitor(
        &self,
        topics: &[String],
        opts: &MonitorOptions,
    ) -> Result<MonitorId, ControlPlaneError> {
        let body = MonitorRequest {
            mon_topic: topics.join(","),
            mon_batch_size: opts.batch_size,
            mon_batch_duration: opts.batch_duration,
            mon_format_type: opts.format.clone(),
            mon_transport_type: "tcp".to_string(),
            mon_compression: opts.compression.clone(),
        };
        let xml = quick_xml::se::to_string(&body)?;

        let resp = self
            .http
            .post(format!("{}/Monitor", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xml)
            .send()
            .await?;

        if resp.status() != StatusCode::CREATED {
            return Err(unexpected_status(resp).await);
        }

        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ControlPlaneError::MissingLocation)?
            .to_string();

        let id = location
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or(ControlPlaneError::MissingLocation)?;

        Ok(MonitorId(id))
    }

    /// Looks up an existing monitor by topic set. `None` means no monitor
    /// currently matches, not an error.
    pub async fn find_monitor(
        &self,
        topics: &[String],
    ) -> Result<Option<MonitorId>, ControlPlaneError> {
        let condition = format!("monTopic='{}'", topics.join(","));

        let resp = self
            .http
            .get(format!("{}/Monitor", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("condition", condition)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(unexpected_status(resp).await);
        }

        let parsed: MonitorListResponse = resp.json().await?;
        if parsed.result_size == 0 || parsed.items.is_empty() {
            return Ok(None);
        }

        Ok(Some(MonitorId(parsed.items[0].mon_id)))
    }

    /// Deletes a monitor. The server is expected to answer `200`.
    pub async fn delete_monitor(&self, id: MonitorId) -> Result<(), ControlPlaneError> {
        let resp = self
            .http
            .delete(format!("{}/Monitor/{}", self.base_url, id.0))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(unexpected_status(resp).await);
        }
        Ok(())
    }
}

async fn unexpected_status(resp: reqwest::Response) -> ControlPlaneError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ControlPlaneError::UnexpectedStatus { status, body }
}
