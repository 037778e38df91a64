//! Scriptable HTTP server for exercising the client over real sockets.
//!
//! Every route accepts any method. `/echo` reflects the request back as JSON;
//! the other routes answer with a status chosen by the caller.

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    /// Header pairs, duplicates kept. Values that are not visible ASCII are
    /// dropped.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// All values received for `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub body: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect", any(redirect))
        .route("/empty/{code}", any(empty))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    tracing::debug!(%method, path = uri.path(), "echo");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers,
        body,
    })
}

async fn status(
    Path(code): Path<u16>,
    Query(query): Query<StatusQuery>,
) -> Result<(StatusCode, String), StatusCode> {
    let status = parse_status(code)?;
    let body = query.body.unwrap_or_else(|| format!("status {code}"));
    Ok((status, body))
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")], "moved")
}

async fn empty(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    parse_status(code)
}

/// Final statuses only; informational codes cannot be sent as a response.
fn parse_status(code: u16) -> Result<StatusCode, StatusCode> {
    match StatusCode::from_u16(code) {
        Ok(status) if !status.is_informational() => Ok(status),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}
