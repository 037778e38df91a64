//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and drives the real
//! `HttpClient` over TCP. `/echo` reports exactly what went over the wire,
//! which pins down header order, bodies and framing.

use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use httpclient_core::{
    DeleteRequest, Error, GetRequest, HeaderInterceptor, HttpClient, HttpClientConfig,
    InterceptorError, PostRequest, PutRequest, Request,
};
use mock_server::Echo;

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client() -> HttpClient {
    HttpClient::new(HttpClientConfig::default()).unwrap()
}

#[test]
fn get_sends_standard_headers_before_caller_headers() {
    let base = start_server();
    let response = client()
        .execute_get(
            GetRequest::new(format!("{base}/echo"))
                .with_header("Accept", "text/plain")
                .with_header("X-Tag", "a")
                .with_header("X-Tag", "b"),
        )
        .unwrap();

    assert_eq!(response.status(), 200);
    let echo: Echo = response.json().unwrap();
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.header_values("accept"), vec!["application/json", "text/plain"]);
    assert_eq!(echo.header_values("x-tag"), vec!["a", "b"]);
    assert!(echo.header_values("content-type").is_empty());
    assert!(echo.header_values("content-length").is_empty());
    assert!(echo.body.is_empty());
}

#[test]
fn post_sends_json_body() {
    let base = start_server();
    let response = client()
        .execute_post(PostRequest::new(format!("{base}/echo"), r#"{"title":"Buy milk"}"#))
        .unwrap();

    let echo: Echo = response.json().unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, r#"{"title":"Buy milk"}"#);
    assert_eq!(echo.header_values("content-type"), vec!["application/json; utf-8"]);
    assert_eq!(echo.header_values("content-length"), vec!["20"]);
}

#[test]
fn put_with_empty_body_declares_zero_length() {
    let base = start_server();
    let response = client()
        .execute_put(PutRequest::new(format!("{base}/echo"), ""))
        .unwrap();

    let echo: Echo = response.json().unwrap();
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.header_values("content-length"), vec!["0"]);
    assert_eq!(echo.header_values("content-type"), vec!["application/json; utf-8"]);
    assert!(echo.body.is_empty());
}

#[test]
fn delete_sends_no_body() {
    let base = start_server();
    let response = client()
        .execute_delete(DeleteRequest::new(format!("{base}/echo")))
        .unwrap();

    let echo: Echo = response.json().unwrap();
    assert_eq!(echo.method, "DELETE");
    assert!(echo.header_values("content-type").is_empty());
}

#[test]
fn success_statuses_return_the_body() {
    let base = start_server();
    let client = client();

    let created = client
        .execute_post(PostRequest::new(format!("{base}/status/201"), "{}"))
        .unwrap();
    assert_eq!(created.status(), 201);
    assert_eq!(created.body(), "status 201");

    let no_content = client
        .execute_delete(DeleteRequest::new(format!("{base}/empty/204")))
        .unwrap();
    assert_eq!(no_content.status(), 204);
    assert!(no_content.body().is_empty());
}

#[test]
fn failure_statuses_carry_url_and_error_body() {
    let base = start_server();
    let client = client();

    let url = format!("{base}/status/404?body=missing");
    let err = client.execute_get(GetRequest::new(url.clone())).unwrap_err();
    match err {
        Error::UnsuccessfulStatus { url: got, status, body } => {
            assert_eq!(got, url);
            assert_eq!(status, 404);
            assert_eq!(body, "missing");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let err = client
        .execute_put(PutRequest::new(format!("{base}/status/503"), "{}"))
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.body(), Some("status 503"));
}

#[test]
fn empty_error_body_is_empty_string() {
    let base = start_server();
    let err = client()
        .execute_get(GetRequest::new(format!("{base}/empty/500")))
        .unwrap_err();

    assert!(matches!(err, Error::UnsuccessfulStatus { status: 500, ref body, .. } if body.is_empty()));
}

#[test]
fn redirect_is_reported_not_followed() {
    let base = start_server();
    let url = format!("{base}/redirect");
    let err = client().execute_get(GetRequest::new(url.clone())).unwrap_err();

    match err {
        Error::RedirectDetected { url: got, status, body } => {
            assert_eq!(got, url);
            assert_eq!(status, 302);
            assert_eq!(body, "moved");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn interceptors_rewrite_url_and_add_headers() {
    let base = start_server();
    let client = client();
    client.add_interceptor(Arc::new(HeaderInterceptor::new("Authorization", "Bearer t0k3n")));
    let target = base.clone();
    client.add_interceptor(Arc::new(move |req: &mut Request| -> Result<(), InterceptorError> {
        let path = req
            .url()
            .strip_prefix("http://placeholder")
            .ok_or("unexpected host")?
            .to_string();
        req.set_url(format!("{target}{path}"));
        Ok(())
    }));

    let response = client
        .execute_get(GetRequest::new("http://placeholder/echo"))
        .unwrap();
    let echo: Echo = response.json().unwrap();
    assert_eq!(echo.header_values("authorization"), vec!["Bearer t0k3n"]);

    client.remove_all_interceptors();
    assert_eq!(client.interceptor_count(), 0);
    let echo: Echo = client
        .execute_get(GetRequest::new(format!("{base}/echo")))
        .unwrap()
        .json()
        .unwrap();
    assert!(echo.header_values("authorization").is_empty());
}

#[test]
fn refused_connection_is_a_transport_fault() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let err = client()
        .execute_get(GetRequest::new(format!("http://{addr}/echo")))
        .unwrap_err();

    assert!(matches!(err, Error::TransportFault(ref e) if e.kind() == io::ErrorKind::ConnectionRefused));
}

#[test]
fn interceptor_cannot_override_framing_headers() {
    let base = start_server();
    let client = client();
    client.add_interceptor(Arc::new(HeaderInterceptor::new("Content-Length", "0")));

    let err = client
        .execute_post(PostRequest::new(format!("{base}/echo"), r#"{"smuggled":true}"#))
        .unwrap_err();
    assert!(matches!(err, Error::TransportFault(ref e) if e.kind() == io::ErrorKind::InvalidInput));

    let err = client
        .execute_get(GetRequest::new(format!("{base}/echo")).with_header("Host", "elsewhere"))
        .unwrap_err();
    assert!(matches!(err, Error::TransportFault(ref e) if e.kind() == io::ErrorKind::InvalidInput));
}

#[test]
fn silent_server_hits_the_read_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let _held = std::thread::spawn(move || {
        let (sock, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_secs(2));
        drop(sock);
    });

    let client = HttpClient::new(
        HttpClientConfig::default().with_read_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let err = client
        .execute_get(GetRequest::new(format!("http://{addr}/slow")))
        .unwrap_err();

    match err {
        Error::TransportFault(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
        other => panic!("unexpected: {other:?}"),
    }
}
