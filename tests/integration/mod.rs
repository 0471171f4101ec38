//! Integration test utilities and helpers
//!
//! This module provides mock implementations of the provisioning
//! capabilities (service locator, enrollment connector/client) plus fixture
//! helpers shared across the test files.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auto_pki_client::discovery::{DiscoveredServer, ServiceLocator};
use auto_pki_client::enrollment::{EnrollmentClient, EnrollmentConnector, EnrollmentOutcome};
use auto_pki_client::error::Result;
use auto_pki_client::{Config, RunOptions};

mod client_test;

/// Host identity used by every orchestrator test.
pub const TEST_HOST: &str = "device01.test";

/// A service locator that returns a fixed candidate set and counts calls.
#[derive(Clone, Default)]
pub struct MockLocator {
    pub candidates: Vec<DiscoveredServer>,
    pub calls: Arc<Mutex<u32>>,
}

impl MockLocator {
    pub fn with_candidates(candidates: Vec<DiscoveredServer>) -> Self {
        Self {
            candidates,
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl ServiceLocator for MockLocator {
    async fn discover(
        &self,
        _service_type: &str,
        _window: Duration,
    ) -> Result<Vec<DiscoveredServer>> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.candidates.clone())
    }
}

/// Shared state recording everything the mock enrollment stack observed.
#[derive(Default)]
pub struct MockEnrollmentState {
    /// Total `connect` calls on the connector.
    pub connects: Mutex<u32>,
    /// `connect` calls made without a trust anchor (first-contact fetches).
    pub unanchored_connects: Mutex<u32>,
    /// Bytes served as the trust anchor.
    pub trust_anchor: Mutex<Vec<u8>>,
    /// Number of trust-anchor fetches.
    pub fetches: Mutex<u32>,
    /// Scripted per-attempt outcomes, consumed front to back.
    pub outcomes: Mutex<VecDeque<EnrollmentOutcome>>,
    /// Every CSR body submitted for enrollment.
    pub submissions: Mutex<Vec<Vec<u8>>>,
    /// Credentials set on the client, if any.
    pub credentials: Mutex<Option<(String, String)>>,
}

/// Connector producing [`MockEnrollmentClient`] handles over shared state.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockEnrollmentState>,
}

impl MockConnector {
    /// A connector whose clients answer enrollment attempts with the given
    /// outcomes, in order.
    pub fn scripted(outcomes: Vec<EnrollmentOutcome>) -> Self {
        let connector = Self::default();
        *connector.state.outcomes.lock().unwrap() = outcomes.into();
        connector
    }

    /// Set the bytes served by `fetch_trust_anchor`.
    pub fn with_trust_anchor(self, anchor: Vec<u8>) -> Self {
        *self.state.trust_anchor.lock().unwrap() = anchor;
        self
    }

    pub fn connect_count(&self) -> u32 {
        *self.state.connects.lock().unwrap()
    }

    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.state.submissions.lock().unwrap().clone()
    }
}

pub struct MockEnrollmentClient {
    state: Arc<MockEnrollmentState>,
}

impl EnrollmentConnector for MockConnector {
    type Client = MockEnrollmentClient;

    fn connect(
        &self,
        _host: &str,
        _port: u16,
        trust_anchor: Option<&Path>,
    ) -> Result<Self::Client> {
        *self.state.connects.lock().unwrap() += 1;
        if trust_anchor.is_none() {
            *self.state.unanchored_connects.lock().unwrap() += 1;
        }
        Ok(MockEnrollmentClient {
            state: self.state.clone(),
        })
    }
}

impl EnrollmentClient for MockEnrollmentClient {
    fn set_credentials(&mut self, username: &str, password: &str) {
        *self.state.credentials.lock().unwrap() =
            Some((username.to_string(), password.to_string()));
    }

    async fn fetch_trust_anchor(&self) -> Result<Vec<u8>> {
        *self.state.fetches.lock().unwrap() += 1;
        Ok(self.state.trust_anchor.lock().unwrap().clone())
    }

    async fn enroll(&self, csr: &[u8]) -> EnrollmentOutcome {
        self.state.submissions.lock().unwrap().push(csr.to_vec());
        self.state
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(EnrollmentOutcome::Rejected {
                message: "mock outcome script exhausted".to_string(),
            })
    }
}

/// Write a config document into `dir` with its material directory under
/// `dir/certs`, optionally pre-resolving the enrollment server.
pub fn write_config(dir: &Path, server: Option<(&str, u16)>) -> PathBuf {
    let config_path = dir.join("config.toml");
    let mut config = Config::default();
    config.client.certs_dir = dir.join("certs");
    if let Some((host, port)) = server {
        config.server.host = Some(host.to_string());
        config.server.port = Some(port);
    }
    config.save(&config_path).unwrap();
    config_path
}

/// Run options pointing at a test config, with discovery off by default.
pub fn run_options(config_path: PathBuf, wait_for_certificate: bool) -> RunOptions {
    RunOptions {
        config_path,
        host_identity: TEST_HOST.to_string(),
        rediscover: false,
        wait_for_certificate,
    }
}

/// A self-signed CA certificate in PEM form, usable as a trust anchor.
pub fn ca_pem() -> Vec<u8> {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::default();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "test-ca.example.com");
    params.self_signed(&key_pair).unwrap().pem().into_bytes()
}
