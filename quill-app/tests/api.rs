//! Router-level tests for the extraction endpoint.
//!
//! The page fetcher is replaced with in-memory doubles so no network access
//! is needed; requests are driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use quill_app::{AppState, FETCH_ROUTE, router};
use quill_common::MISSING_URL_MESSAGE;
use quill_config::CorsConfig;
use quill_web::{ContentExtractor, DEFAULT_TITLE, DomQueryParser, PageFetcher};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

struct StaticFetcher(&'static str);

#[async_trait::async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct FailingFetcher;

#[async_trait::async_trait]
impl PageFetcher for FailingFetcher {
    async fn fetch(&self, _url: &str) -> anyhow::Result<String> {
        anyhow::bail!("network error: dns lookup failed")
    }
}

fn app_with(fetcher: impl PageFetcher + 'static) -> Router {
    app_with_cors(fetcher, &CorsConfig::default())
}

fn app_with_cors(fetcher: impl PageFetcher + 'static, cors: &CorsConfig) -> Router {
    let extractor = ContentExtractor::new(Arc::new(fetcher), Arc::new(DomQueryParser));
    router(AppState::new(extractor), cors)
}

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(FETCH_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const ARTICLE: &str = "<html><body><h1>Growing Talent</h1><article>\
    <h2>Start</h2><p>Hire well.</p><ul><li>One</li><li>Two</li></ul>\
    </article></body></html>";

#[tokio::test]
async fn extracts_article_content() {
    let response = app_with(StaticFetcher(ARTICLE))
        .oneshot(post_json(json!({ "url": "https://medium.com/@a/growing" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({
            "title": "Growing Talent",
            "content": "<h2 class=\"medium-heading\">Start</h2><p class=\"medium-paragraph\">Hire well.</p><ul class=\"medium-list\"><li>One</li><li>Two</li></ul>",
            "url": "https://medium.com/@a/growing"
        })
    );
}

#[tokio::test]
async fn missing_url_is_a_client_error() {
    for body in [json!({}), json!({ "url": "" }), json!({ "url": null }), json!({ "url": "   " })] {
        let response = app_with(StaticFetcher(ARTICLE))
            .oneshot(post_json(body.clone()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(read_json(response).await, json!({ "error": MISSING_URL_MESSAGE }));
    }
}

#[tokio::test]
async fn malformed_payloads_are_client_errors() {
    let wrong_type = post_json(json!({ "url": 42 }));
    let not_json = Request::builder()
        .method(Method::POST)
        .uri(FETCH_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("url=https://medium.com"))
        .unwrap();
    let no_content_type = Request::builder()
        .method(Method::POST)
        .uri(FETCH_ROUTE)
        .body(Body::from(r#"{"url":"https://medium.com"}"#))
        .unwrap();

    for request in [wrong_type, not_json, no_content_type] {
        let response = app_with(StaticFetcher(ARTICLE)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({ "error": MISSING_URL_MESSAGE }));
    }
}

#[tokio::test]
async fn fetch_failure_is_a_server_error_with_message() {
    let response = app_with(FailingFetcher)
        .oneshot(post_json(json!({ "url": "https://medium.com/@a/b" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({ "error": "network error: dns lookup failed" })
    );
}

#[tokio::test]
async fn page_without_container_still_succeeds() {
    let response = app_with(StaticFetcher("<html><body><p>loose text</p></body></html>"))
        .oneshot(post_json(json!({ "url": "https://example.com/x" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["title"], DEFAULT_TITLE);
    assert_eq!(body["content"], "");
    assert_eq!(body["url"], "https://example.com/x");
}

#[tokio::test]
async fn any_origin_is_allowed_by_default() {
    let mut request = post_json(json!({ "url": "https://medium.com/@a/b" }));
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://portfolio.example".parse().unwrap());

    let response = app_with(StaticFetcher(ARTICLE)).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn preflight_is_answered() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(FETCH_ROUTE)
        .header(header::ORIGIN, "https://portfolio.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app_with(StaticFetcher(ARTICLE)).oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn preflight_allows_any_requested_header() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(FETCH_ROUTE)
        .header(header::ORIGIN, "https://portfolio.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            "content-type,authorization,x-requested-with",
        )
        .body(Body::empty())
        .unwrap();

    let response = app_with(StaticFetcher(ARTICLE)).oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    let allowed = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    for name in ["content-type", "authorization", "x-requested-with"] {
        assert!(allowed.contains(name), "{name} missing from {allowed}");
    }
}

#[tokio::test]
async fn configured_origins_are_enforced() {
    let cors = CorsConfig {
        allowed_origins: vec!["https://allowed.example".into()],
    };

    let mut allowed = post_json(json!({ "url": "https://medium.com/@a/b" }));
    allowed
        .headers_mut()
        .insert(header::ORIGIN, "https://allowed.example".parse().unwrap());
    let response = app_with_cors(StaticFetcher(ARTICLE), &cors)
        .oneshot(allowed)
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://allowed.example"
    );

    let mut denied = post_json(json!({ "url": "https://medium.com/@a/b" }));
    denied
        .headers_mut()
        .insert(header::ORIGIN, "https://other.example".parse().unwrap());
    let response = app_with_cors(StaticFetcher(ARTICLE), &cors)
        .oneshot(denied)
        .await
        .unwrap();
    assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app_with(StaticFetcher(ARTICLE)).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let app = app_with(StaticFetcher(ARTICLE));
    let first = read_json(
        app.clone()
            .oneshot(post_json(json!({ "url": "https://medium.com/@a/b" })))
            .await
            .unwrap(),
    )
    .await;
    let second = read_json(
        app.oneshot(post_json(json!({ "url": "https://medium.com/@a/b" })))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first, second);
}
