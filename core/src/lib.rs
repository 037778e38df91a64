//! Synchronous HTTP client with request interceptors and composite TLS trust.
//!
//! # Overview
//! [`HttpClient`] executes GET, POST, PUT and DELETE requests on the calling
//! thread and returns `Ok(Response)` for 2xx statuses. A 3xx status is
//! reported as [`Error::RedirectDetected`] and never followed; any other
//! status is [`Error::UnsuccessfulStatus`]. Request and response bodies are
//! UTF-8 JSON text.
//!
//! # Design
//! - Registered [`RequestInterceptor`]s edit each request before it is sent,
//!   in registration order.
//! - TLS trust is a [`CompositeTrustManager`]: the platform roots are tried
//!   first, then an optional extra CA. A chain is trusted when any source
//!   accepts it.
//! - The network sits behind the [`Transport`] trait so the execution
//!   engine can be driven without one. The default [`HyperTransport`] runs
//!   hyper on a private current-thread tokio runtime per request, so the
//!   client must not be called from inside an async task.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod transport;
pub mod trust;

pub use client::HttpClient;
pub use config::HttpClientConfig;
pub use error::{Error, InterceptorError, TrustValidationFailed};
pub use http::{
    DeleteRequest, GetRequest, Header, HttpMethod, PostRequest, PutRequest, Request, Response,
};
pub use interceptor::{HeaderInterceptor, RequestInterceptor};
pub use transport::{ConnectOptions, Connection, HyperTransport, Transport};
pub use trust::{CertChain, CompositeTrustManager, TrustAnchorSet, TrustEvaluator, WebPkiEvaluator};
