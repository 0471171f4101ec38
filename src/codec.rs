// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! X.509 codec capability: key/CSR generation and certificate digests.
//!
//! The provisioning core never touches ASN.1 directly; everything it needs
//! from the X.509 world goes through the [`CertificateCodec`] trait. The
//! production implementation, [`X509Codec`], generates ECDSA P-256 key pairs
//! and PKCS#10 requests with `rcgen` and computes SHA-256 fingerprints over
//! the DER encoding of a certificate.

use std::io::BufReader;

use der::Decode;
use rcgen::{CertificateParams, DnType, KeyPair, SanType};
use sha2::{Digest, Sha256};

use crate::error::{ProvisionError, Result};

/// A freshly generated private key and the CSR signed by it.
///
/// Both are PEM-encoded. The pair is generated in one step so the CSR's
/// public key always matches the private key.
#[derive(Debug, Clone)]
pub struct GeneratedRequest {
    /// PKCS#8 private key, PEM-encoded.
    pub private_key_pem: Vec<u8>,
    /// PKCS#10 certificate signing request, PEM-encoded.
    pub csr_pem: Vec<u8>,
}

/// Capability for the X.509 operations the provisioning core depends on.
pub trait CertificateCodec {
    /// Generate a key pair and a CSR bound to `common_name`, carrying
    /// `subject_alt_name` as a DNS subject-alternative-name entry.
    fn generate_key_and_request(
        &self,
        common_name: &str,
        subject_alt_name: &str,
    ) -> Result<GeneratedRequest>;

    /// SHA-256 fingerprint of the first certificate in `cert_pem`, as
    /// colon-separated uppercase hex.
    ///
    /// The digest is computed over the DER encoding, so identical input
    /// bytes always yield identical fingerprints.
    fn fingerprint(&self, cert_pem: &[u8]) -> Result<String>;

    /// Subject Common Name of the first certificate in `cert_pem`, if it
    /// parses. Diagnostic only.
    fn subject_common_name(&self, cert_pem: &[u8]) -> Option<String>;
}

/// Production codec backed by `rcgen`, `sha2` and `x509-cert`.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509Codec;

impl X509Codec {
    fn first_certificate_der(cert_pem: &[u8]) -> Result<Vec<u8>> {
        let mut reader = BufReader::new(cert_pem);
        rustls_pemfile::certs(&mut reader)
            .next()
            .and_then(|result| result.ok())
            .map(|cert| cert.as_ref().to_vec())
            .ok_or_else(|| ProvisionError::codec("no certificate found in PEM data"))
    }
}

impl CertificateCodec for X509Codec {
    fn generate_key_and_request(
        &self,
        common_name: &str,
        subject_alt_name: &str,
    ) -> Result<GeneratedRequest> {
        let key_pair = KeyPair::generate()
            .map_err(|e| ProvisionError::codec(format!("failed to generate key pair: {e}")))?;

        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        let san = subject_alt_name.to_string().try_into().map_err(|e| {
            ProvisionError::codec(format!(
                "invalid subject alternative name {subject_alt_name:?}: {e}"
            ))
        })?;
        params.subject_alt_names.push(SanType::DnsName(san));

        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| ProvisionError::codec(format!("failed to serialize CSR: {e}")))?;
        let csr_pem = csr
            .pem()
            .map_err(|e| ProvisionError::codec(format!("failed to encode CSR: {e}")))?;

        Ok(GeneratedRequest {
            private_key_pem: key_pair.serialize_pem().into_bytes(),
            csr_pem: csr_pem.into_bytes(),
        })
    }

    fn fingerprint(&self, cert_pem: &[u8]) -> Result<String> {
        let der = Self::first_certificate_der(cert_pem)?;
        let digest = Sha256::digest(&der);
        Ok(digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":"))
    }

    fn subject_common_name(&self, cert_pem: &[u8]) -> Option<String> {
        use const_oid::db::rfc4519::CN;

        let der = Self::first_certificate_der(cert_pem).ok()?;
        let cert = x509_cert::Certificate::from_der(&der).ok()?;

        for rdn in cert.tbs_certificate.subject.0.iter() {
            for atv in rdn.0.iter() {
                if atv.oid == CN
                    && let Ok(s) = std::str::from_utf8(atv.value.value())
                {
                    return Some(s.to_string());
                }
            }
        }
        None
    }
}
