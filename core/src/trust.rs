//! Composite certificate trust.
//!
//! # Design
//! A [`CompositeTrustManager`] holds an ordered list of [`TrustEvaluator`]s,
//! each judging a chain against one trust-anchor set. A chain is trusted as
//! soon as any evaluator accepts it, so a private CA can be trusted in
//! addition to the platform roots without merging stores. The platform
//! evaluator always comes first, extra anchor sets follow in the order given.
//!
//! The manager plugs into rustls as both a server and a client certificate
//! verifier. Signature checks do not depend on trust anchors and go straight
//! to the crypto provider.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme};

use crate::error::{Error, TrustValidationFailed};

/// A peer's certificate chain as presented during a handshake.
#[derive(Debug, Clone, Copy)]
pub struct CertChain<'a> {
    pub end_entity: &'a CertificateDer<'a>,
    pub intermediates: &'a [CertificateDer<'a>],
    pub now: UnixTime,
}

/// Accepts or rejects certificate chains against one set of trust anchors.
pub trait TrustEvaluator: fmt::Debug + Send + Sync {
    fn check_server_trusted(
        &self,
        chain: &CertChain<'_>,
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
    ) -> Result<(), rustls::Error>;

    fn check_client_trusted(&self, chain: &CertChain<'_>) -> Result<(), rustls::Error>;

    /// Subjects of the anchors this evaluator trusts.
    fn accepted_issuers(&self) -> Vec<DistinguishedName>;
}

/// A set of trust anchors: the platform roots or an extra CA.
#[derive(Debug, Clone)]
pub struct TrustAnchorSet {
    roots: Arc<RootCertStore>,
}

impl TrustAnchorSet {
    /// The platform's trust store.
    ///
    /// Falls back to the bundled Mozilla roots when the system store yields
    /// no usable certificate.
    pub fn platform() -> Self {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        if !native.errors.is_empty() {
            tracing::warn!("errors loading native certs: {:?}", native.errors);
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "loaded platform trust anchors");
        if roots.is_empty() {
            tracing::debug!("no usable platform anchors, using bundled webpki roots");
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        Self {
            roots: Arc::new(roots),
        }
    }

    /// Parse a single X.509 certificate, PEM or DER encoded.
    ///
    /// For PEM input the first `CERTIFICATE` block is used.
    pub fn from_certificate(bytes: &[u8]) -> Result<Self, Error> {
        let der = if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            rustls_pemfile::certs(&mut &bytes[..])
                .next()
                .ok_or_else(|| Error::Certificate("no certificate found in PEM input".to_string()))?
                .map_err(|e| Error::Certificate(format!("malformed PEM: {e}")))?
        } else {
            CertificateDer::from(bytes.to_vec())
        };
        Self::from_certificates([der])
    }

    pub fn from_certificates<'a>(
        certificates: impl IntoIterator<Item = CertificateDer<'a>>,
    ) -> Result<Self, Error> {
        let mut roots = RootCertStore::empty();
        for der in certificates {
            roots
                .add(der)
                .map_err(|e| Error::Certificate(format!("not a usable trust anchor: {e}")))?;
        }
        if roots.is_empty() {
            return Err(Error::Certificate("no certificates supplied".to_string()));
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &RootCertStore {
        &self.roots
    }
}

/// WebPKI path validation against one [`TrustAnchorSet`].
#[derive(Debug)]
pub struct WebPkiEvaluator {
    server: Arc<WebPkiServerVerifier>,
    client: Arc<dyn ClientCertVerifier>,
    issuers: Vec<DistinguishedName>,
}

impl WebPkiEvaluator {
    pub fn new(anchors: &TrustAnchorSet, provider: Arc<CryptoProvider>) -> Result<Self, Error> {
        let server = WebPkiServerVerifier::builder_with_provider(anchors.roots.clone(), provider.clone())
            .build()
            .map_err(|e| Error::Certificate(e.to_string()))?;
        let client = WebPkiClientVerifier::builder_with_provider(anchors.roots.clone(), provider)
            .build()
            .map_err(|e| Error::Certificate(e.to_string()))?;
        Ok(Self {
            server,
            client,
            issuers: anchors.roots.subjects(),
        })
    }
}

impl TrustEvaluator for WebPkiEvaluator {
    fn check_server_trusted(
        &self,
        chain: &CertChain<'_>,
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
    ) -> Result<(), rustls::Error> {
        self.server
            .verify_server_cert(
                chain.end_entity,
                chain.intermediates,
                server_name,
                ocsp_response,
                chain.now,
            )
            .map(|_| ())
    }

    fn check_client_trusted(&self, chain: &CertChain<'_>) -> Result<(), rustls::Error> {
        self.client
            .verify_client_cert(chain.end_entity, chain.intermediates, chain.now)
            .map(|_| ())
    }

    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.issuers.clone()
    }
}

/// Ordered trust evaluators with additive (any-of) trust.
#[derive(Debug)]
pub struct CompositeTrustManager {
    evaluators: Vec<Arc<dyn TrustEvaluator>>,
    accepted_issuers: Vec<DistinguishedName>,
    provider: Arc<CryptoProvider>,
}

impl CompositeTrustManager {
    /// Platform roots first, then one evaluator per extra anchor set, using
    /// the ring crypto provider.
    pub fn new(extra: Vec<TrustAnchorSet>) -> Result<Self, Error> {
        Self::with_provider(Arc::new(rustls::crypto::ring::default_provider()), extra)
    }

    pub fn with_provider(
        provider: Arc<CryptoProvider>,
        extra: Vec<TrustAnchorSet>,
    ) -> Result<Self, Error> {
        let mut evaluators: Vec<Arc<dyn TrustEvaluator>> = vec![Arc::new(WebPkiEvaluator::new(
            &TrustAnchorSet::platform(),
            provider.clone(),
        )?)];
        for anchors in extra {
            evaluators.push(Arc::new(WebPkiEvaluator::new(&anchors, provider.clone())?));
        }
        Ok(Self::from_evaluators(evaluators, provider))
    }

    /// Use exactly `evaluators`, in order. No platform evaluator is added.
    pub fn from_evaluators(
        evaluators: Vec<Arc<dyn TrustEvaluator>>,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        let accepted_issuers = evaluators
            .iter()
            .flat_map(|evaluator| evaluator.accepted_issuers())
            .collect();
        Self {
            evaluators,
            accepted_issuers,
            provider,
        }
    }

    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len()
    }

    pub fn check_server_trusted(
        &self,
        chain: &CertChain<'_>,
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
    ) -> Result<(), TrustValidationFailed> {
        self.first_acceptance(|evaluator| {
            evaluator.check_server_trusted(chain, server_name, ocsp_response)
        })
    }

    pub fn check_client_trusted(&self, chain: &CertChain<'_>) -> Result<(), TrustValidationFailed> {
        self.first_acceptance(|evaluator| evaluator.check_client_trusted(chain))
    }

    /// Issuers of every evaluator concatenated in evaluator order, duplicates
    /// included.
    pub fn accepted_issuers(&self) -> &[DistinguishedName] {
        &self.accepted_issuers
    }

    /// A rustls client configuration that verifies servers with this
    /// manager.
    pub fn client_config(self: Arc<Self>) -> Result<rustls::ClientConfig, Error> {
        Ok(rustls::ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(self)
            .with_no_client_auth())
    }

    fn first_acceptance(
        &self,
        check: impl Fn(&dyn TrustEvaluator) -> Result<(), rustls::Error>,
    ) -> Result<(), TrustValidationFailed> {
        let mut rejections = Vec::with_capacity(self.evaluators.len());
        for (index, evaluator) in self.evaluators.iter().enumerate() {
            match check(evaluator.as_ref()) {
                Ok(()) => {
                    tracing::trace!(evaluator = index, "certificate chain trusted");
                    return Ok(());
                }
                Err(e) => rejections.push(e),
            }
        }
        tracing::debug!(?rejections, "certificate chain rejected by every trust source");
        Err(TrustValidationFailed::new(rejections))
    }
}

impl ServerCertVerifier for CompositeTrustManager {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = CertChain {
            end_entity,
            intermediates,
            now,
        };
        self.check_server_trusted(&chain, server_name, ocsp_response)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for CompositeTrustManager {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.accepted_issuers
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let chain = CertChain {
            end_entity,
            intermediates,
            now,
        };
        self.check_client_trusted(&chain)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
