//! HTTPS termination for the gateways

use anyhow::Context;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::sync::Arc;

use crate::config::TlsConfig;

/// Build a rustls server configuration from a PEM certificate chain and key
pub fn load_server_config(tls: &TlsConfig) -> anyhow::Result<Arc<ServerConfig>> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let certs = CertificateDer::pem_file_iter(&tls.cert_path)
        .with_context(|| format!("failed to open certificate {}", tls.cert_path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificate {}", tls.cert_path.display()))?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", tls.cert_path.display());
    }

    let key = PrivateKeyDer::from_pem_file(&tls.key_path)
        .with_context(|| format!("failed to load private key {}", tls.key_path.display()))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("certificate and key do not match")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
