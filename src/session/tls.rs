// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! TLS setup for secure sessions.
//!
//! Verification mode follows the credential configuration:
//! - `ca_certs` set: build a private trust store from that PEM file and
//!   verify strictly against it.
//! - `ca_certs` unset and `insecure_skip_verify` **not** set: verify
//!   against the platform's native trust roots. This is the one place
//!   this implementation deliberately diverges from a permissive
//!   "trust whatever the server presents" default: see DESIGN.md.
//! - `insecure_skip_verify` set: reproduce that permissive mode via an
//!   explicit opt-in, never the default.

use std::sync::Arc;

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore,
};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::{error::Result, session::Credentials};

pub async fn connect_tls(
    tcp: TcpStream,
    creds: &Credentials,
) -> Result<super::transport::BoxedTransport> {
    let config = build_client_config(creds)?;
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(creds.hostname.clone())
        .map_err(|e| anyhow::anyhow!("invalid TLS server name {:?}: {e}", creds.hostname))?;

    let stream = connector.connect(server_name, tcp).await?;
    Ok(Box::new(stream))
}

fn build_client_config(creds: &Credentials) -> Result<ClientConfig> {
    if let Some(path) = &creds.ca_certs {
        let mut store = RootCertStore::empty();
        let pem = std::fs::read(path)?;
        let certs = rustls_pemfile::certs(&mut pem.as_slice())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for cert in certs {
            store
                .add(cert)
                .map_err(|e| anyhow::anyhow!("invalid CA certificate in {path:?}: {e}"))?;
        }
        return Ok(ClientConfig::builder()
            .with_root_certificates(store)
            .with_no_client_auth());
    }

    if creds.insecure_skip_verify {
        let mut config = ClientConfig::builder()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth();
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyCert));
        return Ok(config);
    }

    let mut store = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().certs {
        // Native bundles can include certificates rustls can't parse;
        // skip those rather than fail the whole trust store.
        let _ = store.add(cert);
    }
    Ok(ClientConfig::builder()
        .with_root_certificates(store)
        .with_no_client_auth())
}

/// Accepts every server certificate without verification. Only reachable
/// through the explicit `insecure_skip_verify` opt-in.
#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
