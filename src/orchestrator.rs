// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! The provisioning state machine.
//!
//! One run moves linearly through:
//!
//! ```text
//! CHECK_EXISTING -> (done) | RESOLVE_SERVER -> BOOTSTRAP_TRUST?
//!     -> LOAD_OR_CREATE_CSR -> ENROLL_RETRY_LOOP -> done | failed
//! ```
//!
//! An already-issued certificate short-circuits the run as a success with no
//! network activity. The server is taken from configuration unless
//! re-discovery was requested or none is configured; a newly discovered
//! server is merged back into the configuration document for future runs.
//! Trust bootstrap happens only when no anchor file exists.
//!
//! The retry loop's pacing is entirely server-driven: a deferred outcome
//! carries the wait the server asked for, and that exact duration is slept
//! before resubmitting the same CSR. There is no client-side backoff and no
//! jitter. Without the wait-for-certificate flag a deferral ends the run in
//! a neutral, re-invokable state. Rejections and transport failures
//! terminate the loop and are never retried.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info};

use crate::bootstrap::bootstrap_trust_anchor;
use crate::codec::CertificateCodec;
use crate::config::Config;
use crate::discovery::{select_server, ServiceLocator, DISCOVERY_WINDOW, EST_SERVICE_TYPE};
use crate::enrollment::{EnrollmentClient, EnrollmentConnector, EnrollmentOutcome};
use crate::error::{ProvisionError, Result};
use crate::material::MaterialStore;

/// Per-run invocation parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path of the persisted configuration document.
    pub config_path: PathBuf,
    /// Host identity used as the certificate common name. Stable for the
    /// lifetime of the run.
    pub host_identity: String,
    /// Force service discovery even when a server is already configured.
    pub rediscover: bool,
    /// Keep resubmitting while the server defers the request.
    pub wait_for_certificate: bool,
}

/// Terminal state of a successful (non-error) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A certificate and key were already on disk; nothing was done.
    AlreadyProvisioned,
    /// A certificate was issued and committed during this run.
    Issued,
    /// The server deferred the request and waiting was not requested.
    DeferredPending,
    /// The wait for a deferred enrollment was interrupted by a termination
    /// signal.
    Interrupted,
}

impl RunOutcome {
    /// The process exit code for this outcome: `0` for both success states,
    /// `10` for a pending deferral, `130` for an interrupted wait.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::AlreadyProvisioned | Self::Issued => 0,
            Self::DeferredPending => 10,
            Self::Interrupted => 130,
        }
    }
}

/// Drives one provisioning run over the injected capabilities.
pub struct ProvisioningOrchestrator<L, F, C> {
    locator: L,
    connector: F,
    codec: C,
    options: RunOptions,
}

impl<L, F, C> ProvisioningOrchestrator<L, F, C>
where
    L: ServiceLocator,
    F: EnrollmentConnector,
    C: CertificateCodec,
{
    /// Create an orchestrator over the given capabilities and options.
    pub fn new(locator: L, connector: F, codec: C, options: RunOptions) -> Self {
        Self {
            locator,
            connector,
            codec,
            options,
        }
    }

    /// Execute one provisioning run to its terminal state.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut config = Config::load_or_init(&self.options.config_path)?;
        let host = self.options.host_identity.as_str();
        let store = MaterialStore::new(config.client.certs_dir.clone());

        if store.has_issued_certificate(host) {
            info!(
                "certificate for {host} already present at {}; nothing to do",
                store.certificate_path(host).display()
            );
            return Ok(RunOutcome::AlreadyProvisioned);
        }

        store.ensure_directory()?;

        let (server_host, server_port) = self.resolve_server(&mut config).await?;

        let anchor_path = config.trust_anchor_path();
        if !anchor_path.is_file() {
            let first_contact = self.connector.connect(&server_host, server_port, None)?;
            bootstrap_trust_anchor(&first_contact, &self.codec, &anchor_path).await?;
        }

        // From here on every call verifies against the pinned anchor.
        let mut client = self
            .connector
            .connect(&server_host, server_port, Some(&anchor_path))?;
        client.set_credentials(&config.client.username, &config.client.password);

        let material = store.load_or_create_request(host, &self.codec)?;

        self.enroll_until_issued(&client, &store, host, &material.csr_pem)
            .await
    }

    /// Resolve the enrollment server for this run, discovering when needed
    /// and merging a discovered server back into the configuration.
    async fn resolve_server(&self, config: &mut Config) -> Result<(String, u16)> {
        if !self.options.rediscover
            && let Some((host, port)) = config.resolved_server()
        {
            return Ok((host.to_string(), port));
        }

        info!("browsing for enrollment services on {EST_SERVICE_TYPE}");
        let candidates = self
            .locator
            .discover(EST_SERVICE_TYPE, DISCOVERY_WINDOW)
            .await?;
        for candidate in &candidates {
            info!(
                "found enrollment service {} on {}:{}",
                candidate.server_name, candidate.address, candidate.port
            );
        }

        let selected = select_server(candidates).ok_or_else(|| {
            ProvisionError::discovery(format!(
                "no enrollment service found on {EST_SERVICE_TYPE} within {}s",
                DISCOVERY_WINDOW.as_secs()
            ))
        })?;
        info!(
            "using enrollment server {}:{}",
            selected.server_name, selected.port
        );

        config.server.host = Some(selected.server_name.clone());
        config.server.port = Some(selected.port);
        config.save(&self.options.config_path)?;

        Ok((selected.server_name, selected.port))
    }

    /// Submit the CSR until issued, deferred past our patience, or failed.
    async fn enroll_until_issued(
        &self,
        client: &F::Client,
        store: &MaterialStore,
        host: &str,
        csr_pem: &[u8],
    ) -> Result<RunOutcome> {
        loop {
            match client.enroll(csr_pem).await {
                EnrollmentOutcome::Issued(certificate) => {
                    let path = store.commit_certificate(host, &certificate)?;
                    match self.codec.subject_common_name(&certificate) {
                        Some(subject) => info!(
                            "certificate issued for {subject}, written to {}",
                            path.display()
                        ),
                        None => info!("certificate issued, written to {}", path.display()),
                    }
                    return Ok(RunOutcome::Issued);
                }
                EnrollmentOutcome::Deferred { wait_secs } => {
                    if !self.options.wait_for_certificate {
                        info!(
                            "enrollment deferred by server ({wait_secs}s); \
                             re-run later or pass --wait-for-cert"
                        );
                        return Ok(RunOutcome::DeferredPending);
                    }

                    info!("enrollment deferred; waiting {wait_secs}s as directed by the server");
                    // Pacing is server-driven; no backoff, no jitter.
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(wait_secs)) => {}
                        _ = tokio::signal::ctrl_c() => {
                            info!("interrupted while waiting for deferred enrollment");
                            return Ok(RunOutcome::Interrupted);
                        }
                    }
                }
                EnrollmentOutcome::Rejected { message } => {
                    error!("enrollment request rejected: {message}");
                    return Err(ProvisionError::request(message));
                }
                EnrollmentOutcome::TransportFailed { message } => {
                    error!("enrollment attempt failed to reach the server: {message}");
                    return Err(ProvisionError::transport(message));
                }
            }
        }
    }
}
