//! Caller-side TLS configuration.
//!
//! With neither an identity nor a trust root configured the connection to
//! the agent is encrypted but unverified, which matches the self-signed
//! identity a bare agent generates for itself. Configuring a client
//! certificate or a CA bundle turns verification on.

use anyhow::{bail, Context, Result};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, PrivateKey, RootCertStore};
use std::sync::Arc;

pub const CLIENT_CERT_ENV: &str = "PULSAAR_CLIENT_CERT_FILE";
pub const CLIENT_KEY_ENV: &str = "PULSAAR_CLIENT_KEY_FILE";
pub const CA_FILE_ENV: &str = "PULSAAR_CA_FILE";

pub fn client_config() -> Result<ClientConfig> {
    let identity = load_identity()?;
    let ca_file = non_empty_env(CA_FILE_ENV);
    let verify = identity.is_some() || ca_file.is_some();

    let builder = ClientConfig::builder().with_safe_defaults();
    let mut config = if verify {
        let roots = trust_roots(ca_file.as_deref())?;
        let builder = builder.with_root_certificates(roots);
        match identity {
            Some((certs, key)) => builder
                .with_client_auth_cert(certs, key)
                .context("invalid client certificate or key")?,
            None => builder.with_no_client_auth(),
        }
    } else {
        builder
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth()
    };
    // gRPC runs over HTTP/2.
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

fn load_identity() -> Result<Option<(Vec<Certificate>, PrivateKey)>> {
    let (Some(cert_file), Some(key_file)) =
        (non_empty_env(CLIENT_CERT_ENV), non_empty_env(CLIENT_KEY_ENV))
    else {
        return Ok(None);
    };
    let certs = pem_certs(&cert_file)?;
    let key = pem_key(&key_file)?;
    Ok(Some((certs, key)))
}

fn trust_roots(ca_file: Option<&str>) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    match ca_file {
        Some(path) => {
            for cert in pem_certs(path)? {
                store
                    .add(&cert)
                    .with_context(|| format!("invalid certificate in trust bundle {path}"))?;
            }
        }
        None => {
            store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|anchor| {
                OwnedTrustAnchor::from_subject_spki_name_constraints(
                    anchor.subject,
                    anchor.spki,
                    anchor.name_constraints,
                )
            }));
        }
    }
    Ok(store)
}

fn pem_certs(path: &str) -> Result<Vec<Certificate>> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read certificate file {path}"))?;
    let certs = rustls_pemfile::certs(&mut &data[..])
        .with_context(|| format!("failed to parse certificates in {path}"))?;
    if certs.is_empty() {
        bail!("no certificates found in {path}");
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn pem_key(path: &str) -> Result<PrivateKey> {
    let data = std::fs::read(path).with_context(|| format!("failed to read key file {path}"))?;
    if let Some(key) = rustls_pemfile::pkcs8_private_keys(&mut &data[..])
        .ok()
        .and_then(|mut keys| keys.pop())
    {
        return Ok(PrivateKey(key));
    }
    rustls_pemfile::rsa_private_keys(&mut &data[..])
        .with_context(|| format!("failed to parse private key in {path}"))?
        .pop()
        .map(PrivateKey)
        .ok_or_else(|| anyhow::anyhow!("no private key found in {path}"))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

struct NoVerification;

impl rustls::client::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
