// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Enrollment client capability and its EST-backed implementation.
//!
//! The orchestrator drives enrollment through the [`EnrollmentClient`] and
//! [`EnrollmentConnector`] traits. Per-attempt results are the explicit
//! [`EnrollmentOutcome`] variants rather than errors: a deferred enrollment
//! is a legitimate protocol outcome that carries the server-stated wait, and
//! a rejection is terminal but still a protocol answer. Only failures of the
//! capability itself (building the client, fetching the trust anchor)
//! surface as [`ProvisionError`].
//!
//! [`EstEnrollmentClient`] speaks the EST (RFC 7030) surface the server
//! exposes: `GET /.well-known/est/cacerts` for the trust anchor and
//! `POST /.well-known/est/simpleenroll` for enrollment, with HTTP Basic
//! authentication. When a trust anchor is pinned, it is the only root the
//! TLS layer accepts; without one, verification is disabled for the single
//! trust-on-first-use fetch.

use std::path::Path;
use std::time::Duration;

use base64::prelude::*;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::error::{ProvisionError, Result};
use crate::USER_AGENT;

/// EST operation path segments under `/.well-known/est/`.
const OP_CACERTS: &str = "cacerts";
const OP_SIMPLE_ENROLL: &str = "simpleenroll";

/// MIME type for PKCS#10 submissions.
const CONTENT_TYPE_PKCS10: &str = "application/pkcs10";

/// Wait applied when a deferral carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a single enrollment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    /// The server issued a certificate; the bytes are stored verbatim.
    Issued(Vec<u8>),
    /// The request is pending approval; resubmit after `wait_secs`.
    Deferred {
        /// Server-stated wait before the next attempt, in seconds.
        wait_secs: u64,
    },
    /// The server rejected the request. Not retryable.
    Rejected {
        /// Status and body returned by the server.
        message: String,
    },
    /// The server could not be reached. Not retried by the loop.
    TransportFailed {
        /// Description of the network failure.
        message: String,
    },
}

/// Capability for talking to one enrollment server.
#[allow(async_fn_in_trait)]
pub trait EnrollmentClient {
    /// Set the HTTP Basic credentials used for enrollment calls.
    fn set_credentials(&mut self, username: &str, password: &str);

    /// Fetch the server's CA certificate over the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Transport`] when the server cannot be
    /// reached or answers with a non-success status.
    async fn fetch_trust_anchor(&self) -> Result<Vec<u8>>;

    /// Submit a CSR and report the attempt's outcome.
    async fn enroll(&self, csr: &[u8]) -> EnrollmentOutcome;
}

/// Capability for constructing enrollment client handles.
///
/// The orchestrator reconstructs the handle after trust bootstrap so that
/// every call past that point verifies against the pinned anchor.
pub trait EnrollmentConnector {
    /// The client type this connector produces.
    type Client: EnrollmentClient;

    /// Build a client for `host:port`, verifying TLS against `trust_anchor`
    /// when one is given.
    fn connect(&self, host: &str, port: u16, trust_anchor: Option<&Path>) -> Result<Self::Client>;
}

/// EST client backed by `reqwest` over rustls.
#[derive(Debug)]
pub struct EstEnrollmentClient {
    base_url: Url,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl EstEnrollmentClient {
    /// Build a client for `https://host:port`.
    pub fn connect(host: &str, port: u16, trust_anchor: Option<&Path>) -> Result<Self> {
        let base_url = Url::parse(&format!("https://{host}:{port}")).map_err(|e| {
            ProvisionError::transport(format!("invalid server endpoint {host}:{port}: {e}"))
        })?;
        Self::with_base_url(base_url, trust_anchor)
    }

    /// Build a client against an explicit base URL.
    pub fn with_base_url(base_url: Url, trust_anchor: Option<&Path>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .tls_built_in_root_certs(false);

        match trust_anchor {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    ProvisionError::corrupt_state(format!(
                        "trust anchor {} unreadable: {e}",
                        path.display()
                    ))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    ProvisionError::corrupt_state(format!(
                        "trust anchor {} is not a valid PEM certificate: {e}",
                        path.display()
                    ))
                })?;
                builder = builder.add_root_certificate(cert);
            }
            None => {
                // Trust-on-first-use: no anchor exists yet, so there is
                // nothing to verify this one fetch against.
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ProvisionError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            credentials: None,
        })
    }

    fn build_url(&self, operation: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/.well-known/est/{operation}"));
        url
    }
}

impl EnrollmentClient for EstEnrollmentClient {
    fn set_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Some((username.to_string(), password.to_string()));
    }

    async fn fetch_trust_anchor(&self) -> Result<Vec<u8>> {
        let url = self.build_url(OP_CACERTS);
        debug!("GET {url}");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ProvisionError::transport(format!(
                "trust anchor fetch failed with {status}: {message}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProvisionError::transport(e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn enroll(&self, csr: &[u8]) -> EnrollmentOutcome {
        let url = self.build_url(OP_SIMPLE_ENROLL);
        debug!("POST {url}");

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_PKCS10)
            .body(csr.to_vec());

        if let Some((username, password)) = &self.credentials {
            let token = BASE64_STANDARD.encode(format!("{username}:{password}"));
            request = request.header(AUTHORIZATION, format!("Basic {token}"));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return EnrollmentOutcome::TransportFailed {
                    message: e.to_string(),
                };
            }
        };

        match response.status() {
            StatusCode::ACCEPTED => {
                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                EnrollmentOutcome::Deferred { wait_secs }
            }
            status if status.is_success() => match response.bytes().await {
                Ok(body) => EnrollmentOutcome::Issued(body.to_vec()),
                Err(e) => EnrollmentOutcome::TransportFailed {
                    message: e.to_string(),
                },
            },
            status => {
                let message = response.text().await.unwrap_or_default();
                EnrollmentOutcome::Rejected {
                    message: format!("{status}: {message}"),
                }
            }
        }
    }
}

/// Production connector producing [`EstEnrollmentClient`] handles.
#[derive(Debug, Default, Clone, Copy)]
pub struct EstConnector;

impl EnrollmentConnector for EstConnector {
    type Client = EstEnrollmentClient;

    fn connect(&self, host: &str, port: u16, trust_anchor: Option<&Path>) -> Result<Self::Client> {
        EstEnrollmentClient::connect(host, port, trust_anchor)
    }
}
