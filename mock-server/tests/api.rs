use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_method_path_and_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo?ignored=1")
                .header(http::header::CONTENT_TYPE, "application/json; utf-8")
                .body(r#"{"title":"Buy milk"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.body, r#"{"title":"Buy milk"}"#);
    assert_eq!(echo.header_values("content-type"), vec!["application/json; utf-8"]);
}

#[tokio::test]
async fn echo_keeps_duplicate_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header("X-Tag", "first")
                .header("X-Tag", "second")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.header_values("x-tag"), vec!["first", "second"]);
    assert!(echo.body.is_empty());
}

// --- status ---

#[tokio::test]
async fn status_uses_default_body() {
    let resp = app().oneshot(request("GET", "/status/404", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "status 404");
}

#[tokio::test]
async fn status_uses_query_body() {
    let resp = app()
        .oneshot(request("DELETE", "/status/503?body=busy", ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "busy");
}

#[tokio::test]
async fn status_rejects_informational_code() {
    let resp = app().oneshot(request("GET", "/status/101", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_rejects_non_numeric_code() {
    let resp = app().oneshot(request("GET", "/status/teapot", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- redirect ---

#[tokio::test]
async fn redirect_points_at_echo() {
    let resp = app().oneshot(request("POST", "/redirect", "{}")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/echo");
    assert_eq!(body_bytes(resp).await, "moved");
}

// --- empty ---

#[tokio::test]
async fn empty_has_no_body() {
    for code in [200u16, 204, 500] {
        let resp = app()
            .oneshot(request("GET", &format!("/empty/{code}"), ""))
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), code);
        assert!(body_bytes(resp).await.is_empty());
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app().oneshot(request("GET", "/missing", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
