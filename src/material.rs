// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Idempotent on-disk key material management.
//!
//! The store owns one directory per host and three canonical files inside
//! it: `<host>.csr`, `<host>.key.pem` and `<host>.pem`. A CSR and its
//! private key are only ever created together; once on disk they are reused
//! byte-for-byte across runs. A broken pair is reported as corrupt state and
//! never silently regenerated, because regenerating would either orphan a
//! live private key or submit a CSR no key can answer for.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::CertificateCodec;
use crate::error::{PersistKind, ProvisionError, Result};

/// Key material held for one host identity.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// PEM-encoded private key paired with the CSR.
    pub private_key_pem: Vec<u8>,
    /// PEM-encoded certificate signing request, submitted verbatim.
    pub csr_pem: Vec<u8>,
    /// DNS name carried as the subject-alternative-name extension.
    pub subject_alt_name: String,
    /// Issued certificate, present only after successful enrollment.
    pub certificate_pem: Option<Vec<u8>>,
}

/// On-disk store for per-host key material.
#[derive(Debug, Clone)]
pub struct MaterialStore {
    certs_dir: PathBuf,
}

impl MaterialStore {
    /// Create a store rooted at `certs_dir`. Nothing is touched on disk
    /// until a write operation is invoked.
    pub fn new(certs_dir: impl Into<PathBuf>) -> Self {
        Self {
            certs_dir: certs_dir.into(),
        }
    }

    /// The directory this store writes into.
    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    /// Canonical path of the CSR file for `host`.
    pub fn csr_path(&self, host: &str) -> PathBuf {
        self.certs_dir.join(format!("{host}.csr"))
    }

    /// Canonical path of the private key file for `host`.
    pub fn key_path(&self, host: &str) -> PathBuf {
        self.certs_dir.join(format!("{host}.key.pem"))
    }

    /// Canonical path of the issued certificate for `host`.
    pub fn certificate_path(&self, host: &str) -> PathBuf {
        self.certs_dir.join(format!("{host}.pem"))
    }

    /// Whether both the issued certificate and its private key exist.
    pub fn has_issued_certificate(&self, host: &str) -> bool {
        self.certificate_path(host).is_file() && self.key_path(host).is_file()
    }

    /// Create the material directory. A pre-existing directory is not an
    /// error.
    pub fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.certs_dir)
            .map_err(|e| ProvisionError::persistence(PersistKind::MaterialDir, e))
    }

    /// Load the existing CSR/key pair for `host`, or generate and persist a
    /// new one.
    ///
    /// An existing CSR is reused byte-for-byte together with its paired key.
    /// A CSR without its key, or a key without its CSR, is
    /// [`ProvisionError::CorruptState`]; neither file is regenerated.
    pub fn load_or_create_request(
        &self,
        host: &str,
        codec: &impl CertificateCodec,
    ) -> Result<KeyMaterial> {
        let csr_path = self.csr_path(host);
        let key_path = self.key_path(host);

        if csr_path.is_file() {
            if !key_path.is_file() {
                return Err(ProvisionError::corrupt_state(format!(
                    "{} exists but its private key {} is missing; refusing to regenerate",
                    csr_path.display(),
                    key_path.display()
                )));
            }

            info!("reusing existing CSR {}", csr_path.display());
            let csr_pem = fs::read(&csr_path).map_err(|e| {
                ProvisionError::corrupt_state(format!("{} unreadable: {e}", csr_path.display()))
            })?;
            let private_key_pem = fs::read(&key_path).map_err(|e| {
                ProvisionError::corrupt_state(format!("{} unreadable: {e}", key_path.display()))
            })?;

            return Ok(KeyMaterial {
                private_key_pem,
                csr_pem,
                subject_alt_name: host.to_string(),
                certificate_pem: None,
            });
        }

        if key_path.is_file() {
            return Err(ProvisionError::corrupt_state(format!(
                "{} exists without its CSR {}; refusing to overwrite key material",
                key_path.display(),
                csr_path.display()
            )));
        }

        info!("generating new key pair and CSR for {host}");
        let generated = codec.generate_key_and_request(host, host)?;

        // CSR first, then key: a crash between the two leaves a CSR without
        // a key, which the next run reports as corrupt state.
        fs::write(&csr_path, &generated.csr_pem)
            .map_err(|e| ProvisionError::persistence(PersistKind::Csr, e))?;
        fs::write(&key_path, &generated.private_key_pem)
            .map_err(|e| ProvisionError::persistence(PersistKind::PrivateKey, e))?;
        debug!(
            "wrote {} and {}",
            csr_path.display(),
            key_path.display()
        );

        Ok(KeyMaterial {
            private_key_pem: generated.private_key_pem,
            csr_pem: generated.csr_pem,
            subject_alt_name: host.to_string(),
            certificate_pem: None,
        })
    }

    /// Write the issued certificate for `host` to its canonical path.
    pub fn commit_certificate(&self, host: &str, certificate_pem: &[u8]) -> Result<PathBuf> {
        let path = self.certificate_path(host);
        fs::write(&path, certificate_pem)
            .map_err(|e| ProvisionError::persistence(PersistKind::Certificate, e))?;
        Ok(path)
    }
}
