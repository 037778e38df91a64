//! Connection-level transport.
//!
//! # Design
//! `HttpClient` talks to the network only through [`Transport`] and
//! [`Connection`], so the execution engine can be driven by a fake in tests.
//!
//! A connection is opened without touching the network. Headers and body are
//! buffered, and the exchange (connect, TLS handshake, send, read response
//! head) happens on the first call to [`Connection::response_status`]. Every
//! transport fault therefore surfaces on an already-open connection, which
//! the engine then closes exactly once.
//!
//! [`HyperTransport`] is the default: hyper's HTTP/1.1 client over
//! hyper-rustls, driven by a current-thread tokio runtime owned by the
//! connection. Idle pooling and retries are off; each request gets its own
//! connection, sent with `Connection: close`.

use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::Runtime;
use url::Url;

use crate::http::HttpMethod;

/// Headers derived from the URL and body. Callers may not set them.
const MANAGED_HEADERS: [&str; 4] = ["host", "content-length", "transfer-encoding", "connection"];

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Timeouts applied to each connection. `None` blocks without limit.
///
/// The connect timeout bounds establishing the TCP connection. The read
/// timeout bounds the wait for the response head, and separately the wait
/// for the full body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

/// Opens one connection per request.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        method: HttpMethod,
        url: &Url,
        options: &ConnectOptions,
    ) -> io::Result<Box<dyn Connection>>;
}

/// A single request/response exchange.
pub trait Connection {
    /// Append a request header. Never replaces an earlier one.
    fn add_header(&mut self, name: &str, value: &str);

    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;

    /// Send the request if not yet sent and return the response status.
    fn response_status(&mut self) -> io::Result<u16>;

    /// Response body of a successful or redirected exchange.
    fn read_body(&mut self) -> io::Result<Vec<u8>>;

    /// Response body of a failed exchange, if the transport has one.
    fn read_error_body(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.read_body().map(Some)
    }

    /// Release the underlying connection.
    fn close(&mut self);
}

/// Blocking HTTP/1.1 over hyper, with rustls for `https` URLs.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    tls: rustls::ClientConfig,
}

impl HyperTransport {
    pub fn new(tls: Arc<rustls::ClientConfig>) -> Self {
        let mut tls = (*tls).clone();
        // hyper-rustls negotiates ALPN itself
        tls.alpn_protocols.clear();
        Self { tls }
    }

    fn client(&self, options: &ConnectOptions) -> HttpsClient {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(options.connect_timeout);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(self.tls.clone())
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .retry_canceled_requests(false)
            .http1_allow_obsolete_multiline_headers_in_responses(true)
            .build(https)
    }
}

impl Transport for HyperTransport {
    fn open(
        &self,
        method: HttpMethod,
        url: &Url,
        options: &ConnectOptions,
    ) -> io::Result<Box<dyn Connection>> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported scheme {other}"),
                ))
            }
        }
        Ok(Box::new(HyperConnection {
            client: self.client(options),
            method,
            url: url.clone(),
            options: *options,
            headers: Vec::new(),
            body: None,
            exchange: None,
            closed: false,
        }))
    }
}

struct Exchange {
    runtime: Runtime,
    status: u16,
    body: Option<Incoming>,
}

struct HyperConnection {
    client: HttpsClient,
    method: HttpMethod,
    url: Url,
    options: ConnectOptions,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    exchange: Option<Exchange>,
    closed: bool,
}

impl HyperConnection {
    fn request(&self) -> io::Result<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method(self.method.as_str())
            .uri(self.url.as_str());
        for (name, value) in &self.headers {
            if MANAGED_HEADERS.iter().any(|m| name.eq_ignore_ascii_case(m)) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("header {name} is set by the transport"),
                ));
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if self.method.has_body() || self.body.is_some() {
            builder = builder.header(CONTENT_LENGTH, self.body.as_ref().map_or(0, Vec::len));
        }
        let body = Bytes::from(self.body.clone().unwrap_or_default());
        builder
            .header(CONNECTION, "close")
            .body(Full::new(body))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

impl Connection for HyperConnection {
    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        if self.exchange.is_some() || self.closed {
            return Err(io::Error::other("request already sent"));
        }
        self.body.get_or_insert_with(Vec::new).extend_from_slice(body);
        Ok(())
    }

    fn response_status(&mut self) -> io::Result<u16> {
        if let Some(exchange) = &self.exchange {
            return Ok(exchange.status);
        }
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        let request = self.request()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let response = runtime.block_on(within(self.options.read_timeout, async {
            self.client.request(request).await.map_err(into_io)
        }))?;

        let status = response.status().as_u16();
        tracing::trace!(status, version = ?response.version(), "response head received");
        self.exchange = Some(Exchange {
            runtime,
            status,
            body: Some(response.into_body()),
        });
        Ok(status)
    }

    /// Read the body once; later calls return an empty body.
    fn read_body(&mut self) -> io::Result<Vec<u8>> {
        self.response_status()?;
        let limit = self.options.read_timeout;
        let exchange = self
            .exchange
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no response"))?;
        let Some(body) = exchange.body.take() else {
            return Ok(Vec::new());
        };
        let bytes = exchange.runtime.block_on(within(limit, async {
            body.collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(into_io)
        }))?;
        Ok(bytes.to_vec())
    }

    fn close(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            drop(exchange.body);
            exchange.runtime.shutdown_background();
        }
        self.closed = true;
    }
}

async fn within<T>(
    limit: Option<Duration>,
    work: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            io::Error::new(io::ErrorKind::TimedOut, format!("no response within {limit:?}"))
        })?,
        None => work.await,
    }
}

/// Flatten a hyper or connector error into an `io::Error`.
///
/// A rustls error anywhere in the chain becomes the inner error of an
/// `InvalidData` I/O error, the shape rustls itself uses, so trust failures
/// stay recoverable. Otherwise the kind of the first I/O cause is kept.
fn into_io<E>(err: E) -> io::Error
where
    E: StdError + Send + Sync + 'static,
{
    if let Some(tls) = find_cause::<rustls::Error>(&err) {
        return io::Error::new(io::ErrorKind::InvalidData, tls.clone());
    }
    let kind = find_cause::<io::Error>(&err).map_or(io::ErrorKind::Other, io::Error::kind);
    io::Error::new(kind, err)
}

/// Search the cause chain, looking inside I/O errors that wrap another
/// error (their `source` skips the wrapped error).
fn find_cause<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        if let Some(inner) = e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            if let Some(found) = find_cause::<T>(inner) {
                return Some(found);
            }
        }
        current = e.source();
    }
    None
}
