// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Persisted configuration document.
//!
//! The configuration is a small TOML file with a `[client]` section (key
//! material directory, enrollment credentials, generated export secret) and
//! a `[server]` section (trust-anchor file name plus the resolved host and
//! port once a server is known).
//!
//! Loading and saving are an explicit [`Config::load_or_init`] /
//! [`Config::save`] pair. A missing file on startup is not an error: a fresh
//! default document is created and written back immediately, so the file is
//! never left uninitialized. The orchestrator saves again after merging a
//! newly discovered server so future runs can skip discovery.
//!
//! # Example
//!
//! ```toml
//! [client]
//! certs_dir = "./certs"
//! username = "bootstrap"
//! password = "bootstrap"
//! export_secret = "zJ1x..."
//!
//! [server]
//! cacert = "cacert.pem"
//! host = "est-server.local"
//! port = 8443
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PersistKind, ProvisionError, Result};

/// Length of the generated export secret, in characters.
const EXPORT_SECRET_LEN: usize = 32;

/// The persisted configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Client-side settings: material directory and credentials.
    #[serde(default)]
    pub client: ClientSection,

    /// Enrollment server settings.
    #[serde(default)]
    pub server: ServerSection,
}

/// The `[client]` section of the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    /// Directory holding the CSR, private key, issued certificate and
    /// trust anchor.
    #[serde(default = "default_certs_dir")]
    pub certs_dir: PathBuf,

    /// Username for HTTP Basic authentication against the enrollment server.
    #[serde(default = "default_credential")]
    pub username: String,

    /// Password for HTTP Basic authentication.
    #[serde(default = "default_credential")]
    pub password: String,

    /// Secret minted when the document is first created, reserved for
    /// protecting key-material exports.
    #[serde(default = "generate_export_secret")]
    pub export_secret: String,
}

/// The `[server]` section of the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// File name of the pinned trust anchor inside the material directory.
    #[serde(default = "default_cacert_name")]
    pub cacert: String,

    /// Resolved enrollment server host, set by configuration or discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Resolved enrollment server port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            certs_dir: default_certs_dir(),
            username: default_credential(),
            password: default_credential(),
            export_secret: generate_export_secret(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            cacert: default_cacert_name(),
            host: None,
            port: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientSection::default(),
            server: ServerSection::default(),
        }
    }
}

fn default_certs_dir() -> PathBuf {
    PathBuf::from("./certs")
}

fn default_credential() -> String {
    "bootstrap".to_string()
}

fn default_cacert_name() -> String {
    "cacert.pem".to_string()
}

fn generate_export_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(EXPORT_SECRET_LEN)
        .map(char::from)
        .collect()
}

impl Config {
    /// Load the configuration from `path`, creating and writing back a
    /// default document if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Config`] if the file exists but cannot be
    /// read or parsed, and a persistence error if the fresh default document
    /// cannot be written back.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.is_file() {
            let content = fs::read_to_string(path).map_err(|e| {
                ProvisionError::config(format!("failed to read {}: {e}", path.display()))
            })?;
            return toml::from_str(&content).map_err(|e| {
                ProvisionError::config(format!("invalid TOML in {}: {e}", path.display()))
            });
        }

        let config = Self::default();
        config.save(path)?;
        info!("created default configuration at {}", path.display());
        Ok(config)
    }

    /// Write the configuration document to `path`.
    ///
    /// Parent directories are created as needed. The write either completes
    /// or fails as a whole; the file handle is closed on every path.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| ProvisionError::persistence(PersistKind::Config, e))?;
        }

        let document = toml::to_string_pretty(self)
            .map_err(|e| ProvisionError::config(format!("TOML serialize: {e}")))?;

        fs::write(path, document).map_err(|e| ProvisionError::persistence(PersistKind::Config, e))
    }

    /// Path of the trust-anchor file inside the material directory.
    pub fn trust_anchor_path(&self) -> PathBuf {
        self.client.certs_dir.join(&self.server.cacert)
    }

    /// The resolved server endpoint, if both host and port are known.
    pub fn resolved_server(&self) -> Option<(&str, u16)> {
        match (&self.server.host, self.server.port) {
            (Some(host), Some(port)) => Some((host.as_str(), port)),
            _ => None,
        }
    }
}
