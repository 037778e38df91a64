//! Error types for the HTTP client.
//!
//! # Design
//! Redirects get their own variant, separate from other unsuccessful
//! statuses, because redirects are never followed: a caller that sees
//! `RedirectDetected` decides whether to follow it manually, while
//! `UnsuccessfulStatus` means the request itself failed. Both carry the
//! response body for debugging.
//!
//! `TrustValidationFailed` is recovered from the TLS handshake when the
//! composite verifier rejects the peer, so callers can tell a trust problem
//! from an ordinary connection failure.

use std::io;
use std::sync::Arc;

use rustls::{CertificateError, OtherError};

/// Boxed error returned by a failing interceptor.
pub type InterceptorError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by `HttpClient` operations and construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered with a 3xx status.
    #[error("request to {url} was redirected (status code {status}); see the response body for details")]
    RedirectDetected { url: String, status: u16, body: String },

    /// The server answered with a status outside 200..400.
    #[error("request to {url} failed with status code {status}; see the error body for details")]
    UnsuccessfulStatus { url: String, status: u16, body: String },

    /// No trust source accepted the peer's certificate chain.
    #[error(transparent)]
    TrustValidationFailed(#[from] TrustValidationFailed),

    /// Connection, timeout, or I/O failure before a status was obtained.
    #[error("transport error: {0}")]
    TransportFault(#[source] io::Error),

    /// The request URL could not be parsed or uses an unsupported scheme.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An interceptor failed; the request was not sent.
    #[error("interceptor failed: {0}")]
    Interceptor(#[source] InterceptorError),

    /// The extra trust certificate could not be read or parsed.
    #[error("invalid certificate: {0}")]
    Certificate(String),

    /// TLS configuration could not be built.
    #[error("tls configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// A response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// Status code of the response, for the status-carrying variants.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RedirectDetected { status, .. } | Error::UnsuccessfulStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Response body, for the status-carrying variants.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::RedirectDetected { body, .. } | Error::UnsuccessfulStatus { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Classify an I/O error raised by the transport.
    ///
    /// rustls reports verifier failures as `InvalidData` I/O errors wrapping
    /// the `rustls::Error`; a rejection from the composite trust manager is
    /// unwrapped back into `TrustValidationFailed`.
    pub(crate) fn from_transport(err: io::Error) -> Self {
        let rejected = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .and_then(|tls| match tls {
                rustls::Error::InvalidCertificate(CertificateError::Other(other)) => {
                    other.0.downcast_ref::<TrustValidationFailed>().cloned()
                }
                _ => None,
            });
        match rejected {
            Some(failure) => Error::TrustValidationFailed(failure),
            None => Error::TransportFault(err),
        }
    }
}

/// Every trust evaluator rejected a certificate chain.
///
/// Holds each evaluator's rejection in evaluator order.
#[derive(Debug, Clone, thiserror::Error)]
#[error("none of the trust sources accepted the certificate chain")]
pub struct TrustValidationFailed {
    rejections: Vec<rustls::Error>,
}

impl TrustValidationFailed {
    pub(crate) fn new(rejections: Vec<rustls::Error>) -> Self {
        Self { rejections }
    }

    pub fn rejections(&self) -> &[rustls::Error] {
        &self.rejections
    }
}

impl From<TrustValidationFailed> for rustls::Error {
    fn from(failure: TrustValidationFailed) -> Self {
        rustls::Error::InvalidCertificate(CertificateError::Other(OtherError(Arc::new(failure))))
    }
}
