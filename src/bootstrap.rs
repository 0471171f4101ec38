// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Trust-on-first-use bootstrap of the enrollment trust anchor.
//!
//! When no trust anchor is pinned locally, the client fetches the server's
//! CA certificate over an unverified connection, persists the bytes
//! verbatim, and logs the SHA-256 fingerprint at WARN level. Operators are
//! expected to verify that fingerprint out-of-band; the client itself does
//! not validate the anchor against any external reference.
//!
//! Bootstrap runs at most once: the absence of the anchor file is its only
//! trigger, and a persisted anchor is never refetched or replaced within a
//! run. After bootstrap the enrollment client must be reconstructed so that
//! every subsequent call verifies against the pinned anchor.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::codec::CertificateCodec;
use crate::enrollment::EnrollmentClient;
use crate::error::{PersistKind, ProvisionError, Result};

/// Fetch the server's CA certificate and pin it at `anchor_path`.
///
/// The caller must pass a client built *without* a trust anchor; this is the
/// one unauthenticated exchange in the protocol.
///
/// # Errors
///
/// Fetch failures propagate as [`ProvisionError::Transport`]; a failed write
/// of the anchor file is [`ProvisionError::Persistence`] and fatal for the
/// run.
pub async fn bootstrap_trust_anchor(
    client: &impl EnrollmentClient,
    codec: &impl CertificateCodec,
    anchor_path: &Path,
) -> Result<()> {
    debug!(
        "no trust anchor at {}; fetching on first contact",
        anchor_path.display()
    );

    let anchor = client.fetch_trust_anchor().await?;
    fs::write(anchor_path, &anchor)
        .map_err(|e| ProvisionError::persistence(PersistKind::TrustAnchor, e))?;
    debug!("trust anchor written to {}", anchor_path.display());

    let fingerprint = codec.fingerprint(&anchor)?;
    warn!(
        "pinned new trust anchor {} with SHA-256 fingerprint {fingerprint}; verify out-of-band",
        anchor_path.display()
    );

    Ok(())
}
