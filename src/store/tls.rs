//! Postgres transport security
//!
//! Local databases are reached in plaintext. Anything else is offered TLS
//! without certificate verification, which is what hosted Postgres
//! providers with self-signed chains need. `sslmode=disable` in the URL
//! forces plaintext.

use std::sync::Arc;

use reqwest::Url;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;

use super::{StoreError, StoreResult};

const LOCAL_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "::1", "[::1]"];

/// How the pool connects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgTls {
    Disabled,
    /// TLS with any server certificate accepted
    Unverified,
}

impl PgTls {
    pub fn for_url(database_url: &str) -> Self {
        let Ok(url) = Url::parse(database_url) else {
            return if database_url.contains("localhost") {
                Self::Disabled
            } else {
                Self::Unverified
            };
        };

        let sslmode = url
            .query_pairs()
            .find(|(key, _)| key == "sslmode")
            .map(|(_, value)| value.to_ascii_lowercase());
        match sslmode.as_deref() {
            Some("disable") => return Self::Disabled,
            Some("require") => return Self::Unverified,
            _ => {}
        }

        match url.host_str() {
            None | Some("") => Self::Disabled,
            Some(host) if LOCAL_HOSTS.contains(&host) => Self::Disabled,
            Some(_) => Self::Unverified,
        }
    }
}

/// rustls connector for [`PgTls::Unverified`]
pub fn unverified_connector() -> StoreResult<MakeRustlsConnect> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| StoreError::Pool(format!("TLS setup failed: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

/// Skips chain and name checks; handshake signatures are still verified
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
