//! TLS client configuration for secure websockets

use crate::error::{MsbError, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// PEM files presented to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Trust anchors; the platform store is used when unset
    pub ca_path: Option<PathBuf>,
}

impl TlsMaterial {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ca_path: None,
        }
    }

    pub fn ca(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    /// Fail early if any of the files cannot be read
    pub fn check(&self) -> Result<()> {
        load_certs(&self.cert_path)?;
        load_key(&self.key_path)?;
        if let Some(ca) = &self.ca_path {
            load_certs(ca)?;
        }
        Ok(())
    }
}

/// Build the rustls client configuration for the websocket connector
pub fn client_config(material: Option<&TlsMaterial>, verify_hostname: bool) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let roots = root_store(material.and_then(|m| m.ca_path.as_deref()))?;

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| MsbError::Tls(e.to_string()))?;

    let builder = if verify_hostname {
        builder.with_root_certificates(roots)
    } else {
        warn!("TLS hostname verification disabled");
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| MsbError::Tls(e.to_string()))?;
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(IgnoreHostname { inner }))
    };

    let config = match material {
        Some(m) => builder
            .with_client_auth_cert(load_certs(&m.cert_path)?, load_key(&m.key_path)?)
            .map_err(|e| MsbError::Tls(e.to_string()))?,
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn root_store(ca_path: Option<&Path>) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    let certificates = match ca_path {
        Some(path) => load_certs(path)?,
        None => {
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                debug!("Skipping native certificate: {}", err);
            }
            native.certs
        }
    };

    let (added, ignored) = roots.add_parsable_certificates(certificates);
    debug!(added, ignored, "Loaded TLS trust anchors");
    if added == 0 {
        return Err(MsbError::Tls("no usable trust anchors".into()));
    }
    Ok(roots)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MsbError::Tls(format!("{}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(MsbError::Tls(format!("{}: no certificates", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| MsbError::Tls(format!("{}: {}", path.display(), e)))?
        .ok_or_else(|| MsbError::Tls(format!("{}: no private key", path.display())))
}

/// Full chain verification, but a certificate issued for another name is accepted
#[derive(Debug)]
struct IgnoreHostname {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for IgnoreHostname {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
