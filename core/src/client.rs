//! Blocking HTTP client with request interceptors and composite TLS trust.
//!
//! # Design
//! `HttpClient` is built once per configuration and reused. Each execution
//! runs to completion on the calling thread:
//!
//! 1. run the interceptors over the request, in registration order;
//! 2. open a fresh connection for the (possibly rewritten) URL;
//! 3. send `Accept: application/json`, `Content-Type` for body requests,
//!    then the request's own headers and body;
//! 4. classify the status: 2xx is a [`Response`], 3xx is
//!    [`Error::RedirectDetected`], anything else is
//!    [`Error::UnsuccessfulStatus`].
//!
//! The connection is released exactly once on every path, before the result
//! is returned. Redirects are never followed and nothing is retried.

use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::config::HttpClientConfig;
use crate::error::Error;
use crate::http::{DeleteRequest, GetRequest, PostRequest, PutRequest, Request, Response};
use crate::interceptor::{InterceptorChain, RequestInterceptor};
use crate::transport::{ConnectOptions, Connection, HyperTransport, Transport};
use crate::trust::{CompositeTrustManager, TrustAnchorSet};

/// Synchronous HTTP client. Safe to share between threads.
pub struct HttpClient {
    options: ConnectOptions,
    interceptors: InterceptorChain,
    transport: Box<dyn Transport>,
}

impl HttpClient {
    /// Build a client that trusts the platform roots plus the configured
    /// extra certificate, if any.
    pub fn new(config: HttpClientConfig) -> Result<Self, Error> {
        let extra = match config.certificate_bytes()? {
            Some(bytes) => vec![TrustAnchorSet::from_certificate(&bytes)?],
            None => Vec::new(),
        };
        let trust = Arc::new(CompositeTrustManager::new(extra)?);
        tracing::debug!(
            trust_sources = trust.evaluator_count(),
            "building http client"
        );
        let tls = trust.client_config()?;
        Ok(Self::with_transport(&config, HyperTransport::new(Arc::new(tls))))
    }

    /// Use `transport` for every connection instead of [`HyperTransport`].
    pub fn with_transport(config: &HttpClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            options: ConnectOptions {
                connect_timeout: config.connect_timeout(),
                read_timeout: config.read_timeout(),
            },
            interceptors: InterceptorChain::default(),
            transport: Box::new(transport),
        }
    }

    pub fn add_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.add(interceptor);
    }

    /// Remove one registration of `interceptor`. Returns whether it was
    /// registered.
    pub fn remove_interceptor(&self, interceptor: &Arc<dyn RequestInterceptor>) -> bool {
        self.interceptors.remove(interceptor)
    }

    pub fn remove_all_interceptors(&self) {
        self.interceptors.clear();
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    pub fn execute_get(&self, request: GetRequest) -> Result<Response, Error> {
        self.execute(request)
    }

    pub fn execute_post(&self, request: PostRequest) -> Result<Response, Error> {
        self.execute(request)
    }

    pub fn execute_put(&self, request: PutRequest) -> Result<Response, Error> {
        self.execute(request)
    }

    pub fn execute_delete(&self, request: DeleteRequest) -> Result<Response, Error> {
        self.execute(request)
    }

    pub fn execute(&self, request: impl Into<Request>) -> Result<Response, Error> {
        let mut request = request.into();
        let span = tracing::debug_span!(
            "http_request",
            id = %Uuid::new_v4(),
            method = %request.method()
        );
        let _entered = span.enter();

        self.interceptors
            .apply(&mut request)
            .map_err(Error::Interceptor)?;
        let url = parse_url(request.url())?;
        tracing::debug!(%url, "dispatching request");

        let connection = self
            .transport
            .open(request.method(), &url, &self.options)
            .map_err(Error::from_transport)?;
        let mut connection = Released(connection);
        let result = exchange(connection.0.as_mut(), &request);
        drop(connection);

        match &result {
            Ok(response) => tracing::debug!(status = response.status(), "request succeeded"),
            Err(Error::TransportFault(e)) => tracing::warn!(error = %e, "transport fault"),
            Err(e) => tracing::debug!(error = %e, "request failed"),
        }
        result
    }
}

/// Closes the wrapped connection when dropped.
struct Released(Box<dyn Connection>);

impl Drop for Released {
    fn drop(&mut self) {
        self.0.close();
        tracing::debug!("connection released");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    Redirect,
    Failure,
}

impl StatusClass {
    fn of(status: u16) -> Self {
        match status {
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            _ => StatusClass::Failure,
        }
    }
}

fn exchange(connection: &mut dyn Connection, request: &Request) -> Result<Response, Error> {
    connection.add_header("Accept", "application/json");
    if request.body().is_some() {
        connection.add_header("Content-Type", "application/json; utf-8");
    }
    for header in request.headers() {
        connection.add_header(&header.name, &header.value);
    }
    if let Some(body) = request.body() {
        connection
            .write_body(body.as_bytes())
            .map_err(Error::from_transport)?;
    }

    let status = connection.response_status().map_err(Error::from_transport)?;
    tracing::debug!(status, "response received");

    match StatusClass::of(status) {
        StatusClass::Success => {
            let body = connection.read_body().map_err(Error::from_transport)?;
            Ok(Response::new(status, decode(body)))
        }
        StatusClass::Redirect => {
            let body = connection.read_body().map_err(Error::from_transport)?;
            Err(Error::RedirectDetected {
                url: request.url().to_string(),
                status,
                body: decode(body),
            })
        }
        StatusClass::Failure => {
            let body = connection
                .read_error_body()
                .map_err(Error::from_transport)?
                .map(decode)
                .unwrap_or_default();
            Err(Error::UnsuccessfulStatus {
                url: request.url().to_string(),
                status,
                body,
            })
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Decode a body as UTF-8, replacing invalid sequences.
fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
