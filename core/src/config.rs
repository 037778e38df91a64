//! Client configuration.
//!
//! # Design
//! `HttpClientConfig` deserializes from any serde format, with every field
//! optional. Timeouts are plain milliseconds so a JSON or env-derived config
//! stays readable; zero disables the timeout. The extra trust certificate can
//! come from a file path (deserializable) or from in-memory bytes set in code,
//! and the bytes win when both are present.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// File containing one extra CA certificate (PEM or DER).
    pub certificate_path: Option<PathBuf>,
    /// Certificate bytes supplied in code (PEM or DER).
    #[serde(skip)]
    pub extra_certificate: Option<Vec<u8>>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            certificate_path: None,
            extra_certificate: None,
        }
    }
}

impl HttpClientConfig {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = millis(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = millis(timeout);
        self
    }

    pub fn with_certificate(mut self, certificate: impl Into<Vec<u8>>) -> Self {
        self.extra_certificate = Some(certificate.into());
        self
    }

    /// Read the extra certificate from `reader` until EOF.
    pub fn with_certificate_reader(mut self, mut reader: impl Read) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Certificate(format!("failed to read certificate: {e}")))?;
        self.extra_certificate = Some(bytes);
        Ok(self)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        timeout(self.read_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        timeout(self.connect_timeout_ms)
    }

    /// Resolve the extra certificate bytes, reading `certificate_path` if no
    /// in-memory certificate was given.
    pub fn certificate_bytes(&self) -> Result<Option<Vec<u8>>, Error> {
        if let Some(bytes) = &self.extra_certificate {
            return Ok(Some(bytes.clone()));
        }
        match &self.certificate_path {
            Some(path) => std::fs::read(path).map(Some).map_err(|e| {
                Error::Certificate(format!("failed to read {}: {e}", path.display()))
            }),
            None => Ok(None),
        }
    }
}

fn timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
