//! Request and response types.
//!
//! # Design
//! Requests are a sum type over the four supported methods. Only `Post` and
//! `Put` carry a body, so a GET or DELETE cannot acquire one in calling code.
//! The URL and headers stay mutable because interceptors edit the request in
//! place right before dispatch.
//!
//! Headers are an ordered multimap: appending never replaces, dedupes, or
//! case-normalizes an existing entry.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a body.
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request header. Several headers may share a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A GET request. Never carries a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub url: String,
    pub headers: Vec<Header>,
}

impl GetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// A DELETE request. Never carries a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub url: String,
    pub headers: Vec<Header>,
}

impl DeleteRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// A POST request. The body is sent as the raw UTF-8 bytes of the string;
/// the caller supplies already-encoded JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub url: String,
    pub headers: Vec<Header>,
    pub body: String,
}

impl PostRequest {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// A PUT request. Same body rules as [`PostRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub url: String,
    pub headers: Vec<Header>,
    pub body: String,
}

impl PutRequest {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// Any request the client can execute.
///
/// This is what interceptors receive. Accessors cover the fields every
/// variant shares; match on the variant to reach the body-carrying types
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get(GetRequest),
    Post(PostRequest),
    Put(PutRequest),
    Delete(DeleteRequest),
}

impl Request {
    pub fn method(&self) -> HttpMethod {
        match self {
            Request::Get(_) => HttpMethod::Get,
            Request::Post(_) => HttpMethod::Post,
            Request::Put(_) => HttpMethod::Put,
            Request::Delete(_) => HttpMethod::Delete,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Request::Get(r) => &r.url,
            Request::Post(r) => &r.url,
            Request::Put(r) => &r.url,
            Request::Delete(r) => &r.url,
        }
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        match self {
            Request::Get(r) => r.url = url,
            Request::Post(r) => r.url = url,
            Request::Put(r) => r.url = url,
            Request::Delete(r) => r.url = url,
        }
    }

    pub fn headers(&self) -> &[Header] {
        match self {
            Request::Get(r) => &r.headers,
            Request::Post(r) => &r.headers,
            Request::Put(r) => &r.headers,
            Request::Delete(r) => &r.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Vec<Header> {
        match self {
            Request::Get(r) => &mut r.headers,
            Request::Post(r) => &mut r.headers,
            Request::Put(r) => &mut r.headers,
            Request::Delete(r) => &mut r.headers,
        }
    }

    /// Append a header. Existing headers with the same name are kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers_mut().push(Header::new(name, value));
    }

    /// Value of the first header whose name matches, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// The body, present only for POST and PUT.
    pub fn body(&self) -> Option<&str> {
        match self {
            Request::Post(r) => Some(&r.body),
            Request::Put(r) => Some(&r.body),
            Request::Get(_) | Request::Delete(_) => None,
        }
    }
}

impl From<GetRequest> for Request {
    fn from(request: GetRequest) -> Self {
        Request::Get(request)
    }
}

impl From<PostRequest> for Request {
    fn from(request: PostRequest) -> Self {
        Request::Post(request)
    }
}

impl From<PutRequest> for Request {
    fn from(request: PutRequest) -> Self {
        Request::Put(request)
    }
}

impl From<DeleteRequest> for Request {
    fn from(request: DeleteRequest) -> Self {
        Request::Delete(request)
    }
}

/// A successful (2xx) response: the status code and the body decoded as
/// UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
