// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # auto-pki-client
//!
//! A client-side agent that provisions an X.509 client certificate for a
//! host: it discovers an EST enrollment server on the local network via
//! mDNS/DNS-SD, pins the server's CA certificate on first use, generates a
//! key pair and CSR once per host identity, and drives a deferred-retry
//! enrollment loop until a certificate is issued.
//!
//! ## Design
//!
//! The core is the [`orchestrator::ProvisioningOrchestrator`] state machine.
//! It depends on three capabilities, each a trait with a thin production
//! implementation:
//!
//! - [`discovery::ServiceLocator`]: bounded-window mDNS collection
//!   ([`discovery::MdnsServiceLocator`])
//! - [`enrollment::EnrollmentClient`] / [`enrollment::EnrollmentConnector`]:
//!   the EST protocol exchange ([`enrollment::EstEnrollmentClient`])
//! - [`codec::CertificateCodec`]: key/CSR generation and certificate
//!   digests ([`codec::X509Codec`])
//!
//! Key material persistence is idempotent: an existing CSR/key pair is
//! reused byte-for-byte across runs, an already-issued certificate makes a
//! run a no-op, and a broken pair is reported rather than regenerated.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use auto_pki_client::codec::X509Codec;
//! use auto_pki_client::discovery::MdnsServiceLocator;
//! use auto_pki_client::enrollment::EstConnector;
//! use auto_pki_client::{ProvisioningOrchestrator, RunOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = RunOptions {
//!     config_path: PathBuf::from("config/config.toml"),
//!     host_identity: "device01.example.com".to_string(),
//!     rediscover: false,
//!     wait_for_certificate: true,
//! };
//!
//! let orchestrator =
//!     ProvisioningOrchestrator::new(MdnsServiceLocator, EstConnector, X509Codec, options);
//! let outcome = orchestrator.run().await?;
//! println!("run finished: {outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Trust model
//!
//! The trust anchor is obtained trust-on-first-use: exactly one fetch over
//! an unverified connection, after which the anchor is pinned on disk and
//! every subsequent exchange verifies against it. The anchor's SHA-256
//! fingerprint is logged at WARN level for out-of-band verification.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod enrollment;
pub mod error;
pub mod material;
pub mod orchestrator;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use discovery::DiscoveredServer;
pub use enrollment::EnrollmentOutcome;
pub use error::{ProvisionError, Result};
pub use material::{KeyMaterial, MaterialStore};
pub use orchestrator::{ProvisioningOrchestrator, RunOptions, RunOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("auto-pki-client/", env!("CARGO_PKG_VERSION"));
