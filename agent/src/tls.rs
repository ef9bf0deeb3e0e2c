//! Server TLS material.
//!
//! The identity is loaded from the environment when both cert and key files
//! are configured; otherwise a throwaway self-signed identity is generated
//! in memory at startup. A configured client CA switches the acceptor to
//! mutual TLS: client certificates are required and verified. The loader
//! runs exactly once per agent lifetime.

use anyhow::{Context, Result};
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

pub const CERT_FILE_ENV: &str = "PULSAAR_TLS_CERT_FILE";
pub const KEY_FILE_ENV: &str = "PULSAAR_TLS_KEY_FILE";
pub const CA_FILE_ENV: &str = "PULSAAR_TLS_CA_FILE";

const SELF_SIGNED_ORG: &str = "Pulsaar";
const SELF_SIGNED_VALIDITY_DAYS: i64 = 365;

pub struct TlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    client_ca_pem: Option<Vec<u8>>,
}

impl TlsMaterial {
    pub fn from_env() -> Result<Self> {
        let (cert_pem, key_pem) = match (non_empty_env(CERT_FILE_ENV), non_empty_env(KEY_FILE_ENV))
        {
            (Some(cert), Some(key)) => (
                std::fs::read(&cert)
                    .with_context(|| format!("failed to read certificate file {cert}"))?,
                std::fs::read(&key).with_context(|| format!("failed to read key file {key}"))?,
            ),
            _ => self_signed()?,
        };
        let client_ca_pem = match non_empty_env(CA_FILE_ENV) {
            Some(ca) => Some(
                std::fs::read(&ca)
                    .with_context(|| format!("failed to read client CA file {ca}"))?,
            ),
            None => None,
        };
        Ok(Self {
            cert_pem,
            key_pem,
            client_ca_pem,
        })
    }

    /// True when a client CA is configured and the acceptor will require
    /// and verify client certificates.
    pub fn mutual_tls(&self) -> bool {
        self.client_ca_pem.is_some()
    }

    pub fn server_tls(&self) -> ServerTlsConfig {
        let mut tls =
            ServerTlsConfig::new().identity(Identity::from_pem(&self.cert_pem, &self.key_pem));
        if let Some(ca) = &self.client_ca_pem {
            tls = tls.client_ca_root(Certificate::from_pem(ca));
        }
        tls
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// One-year self-signed identity: CN-less subject with org "Pulsaar", SANs
/// 127.0.0.1 and localhost.
fn self_signed() -> Result<(Vec<u8>, Vec<u8>)> {
    use rcgen::{CertificateParams, DistinguishedName, DnType, SanType};

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::OrganizationName, SELF_SIGNED_ORG);
    params.subject_alt_names = vec![
        SanType::IpAddress(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
        SanType::DnsName("localhost".to_string()),
    ];
    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after = params.not_before + time::Duration::days(SELF_SIGNED_VALIDITY_DAYS);

    let cert = rcgen::Certificate::from_params(params)
        .context("failed to generate self-signed identity")?;
    let cert_pem = cert
        .serialize_pem()
        .context("failed to serialize self-signed certificate")?;
    let key_pem = cert.serialize_private_key_pem();
    Ok((cert_pem.into_bytes(), key_pem.into_bytes()))
}
