// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Error types for the provisioning client.
//!
//! The taxonomy separates failures by what an operator has to do about them:
//! discovery and transport failures are environmental, request rejections
//! need fixed credentials or a fixed CSR, corrupt state needs manual cleanup
//! of the material directory, and persistence failures need a writable disk.
//!
//! Every variant maps to a distinct process exit code (see
//! [`ProvisionError::exit_code`]) so that calling automation can branch on
//! the outcome of a run.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias using [`ProvisionError`].
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur during a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No enrollment service was found within the discovery window.
    ///
    /// Terminal for the run; discovery is never retried internally.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Network-level failure reaching the enrollment server, including
    /// during the trust-anchor fetch.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server rejected the enrollment request outright (bad CSR, bad
    /// credentials, policy denial). Never retried automatically.
    #[error("enrollment request rejected: {0}")]
    Request(String),

    /// On-disk key material is inconsistent, e.g. a CSR without its paired
    /// private key. Requires operator remediation; never auto-repaired.
    #[error("corrupt key material: {0}")]
    CorruptState(String),

    /// Local filesystem write failure. Always fatal for the current run.
    #[error("failed to persist {what}: {source}")]
    Persistence {
        /// Which artifact failed to persist.
        what: PersistKind,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration document could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cryptographic material could not be generated or decoded.
    #[error("certificate codec failure: {0}")]
    Codec(String),
}

/// Artifacts the client persists; used to distinguish write failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistKind {
    /// The certificate signing request file.
    Csr,
    /// The private key file paired with the CSR.
    PrivateKey,
    /// The issued client certificate.
    Certificate,
    /// The pinned trust-anchor certificate.
    TrustAnchor,
    /// The persisted configuration document.
    Config,
    /// The key material directory itself.
    MaterialDir,
}

impl fmt::Display for PersistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Csr => "CSR",
            Self::PrivateKey => "private key",
            Self::Certificate => "certificate",
            Self::TrustAnchor => "trust anchor",
            Self::Config => "configuration",
            Self::MaterialDir => "material directory",
        };
        f.write_str(name)
    }
}

impl ProvisionError {
    /// Create a discovery error with the given message.
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a request-rejected error with the given message.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Create a corrupt-state error with the given message.
    pub fn corrupt_state(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }

    /// Create a persistence error for the given artifact.
    pub fn persistence(what: PersistKind, source: io::Error) -> Self {
        Self::Persistence { what, source }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a codec error with the given message.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// The process exit code for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 1 | discovery found no enrollment service |
    /// | 2 | CSR write failed |
    /// | 3 | private-key write failed |
    /// | 4 | certificate commit failed |
    /// | 5 | trust-anchor write failed |
    /// | 6 | configuration write/parse failed |
    /// | 7 | on-disk material corrupt |
    /// | 8 | transport failure |
    /// | 9 | enrollment request rejected |
    /// | 11 | codec failure |
    /// | 12 | material directory creation failed |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Discovery(_) => 1,
            Self::Persistence {
                what: PersistKind::Csr,
                ..
            } => 2,
            Self::Persistence {
                what: PersistKind::PrivateKey,
                ..
            } => 3,
            Self::Persistence {
                what: PersistKind::Certificate,
                ..
            } => 4,
            Self::Persistence {
                what: PersistKind::TrustAnchor,
                ..
            } => 5,
            Self::Persistence {
                what: PersistKind::Config,
                ..
            }
            | Self::Config(_) => 6,
            Self::CorruptState(_) => 7,
            Self::Transport(_) => 8,
            Self::Request(_) => 9,
            Self::Codec(_) => 11,
            Self::Persistence {
                what: PersistKind::MaterialDir,
                ..
            } => 12,
        }
    }
}
