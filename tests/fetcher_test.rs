//! Integration tests for HttpRenderer using wiremock
//!
//! These tests validate the renderer's HTTP behavior against mock servers.

use std::time::Duration;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stockwatch::availability::infer;
use stockwatch::config::RendererConfig;
use stockwatch::crawler::{HttpRenderer, RenderError, Renderer};
use stockwatch::StockStatus;

const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Kettle</title></head>
<body>
  <div class="product-detail">
    <h1>Kettle</h1>
    <p>Delivering to 560001</p>
    <button class="add-to-cart">Add to cart</button>
  </div>
</body>
</html>"#;

fn renderer(location_param: Option<&str>) -> HttpRenderer {
    let config = RendererConfig {
        request_timeout_secs: 1,
        requests_per_second: 50,
        location_param: location_param.map(str::to_string),
        ..RendererConfig::default()
    };
    HttpRenderer::new(&config).unwrap()
}

/// Test successful render from mock server
#[tokio::test]
async fn test_render_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/kettle"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/products/kettle", mock_server.uri());
    let snapshot = renderer(None).render(&url, "560001").await.unwrap();

    assert_eq!(infer(&snapshot).status, StockStatus::InStock);
}

/// Test that the location filter travels as a query parameter
#[tokio::test]
async fn test_location_filter_query_param() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/kettle"))
        .and(query_param("pincode", "560001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/products/kettle", mock_server.uri());
    let page = renderer(Some("pincode"))
        .fetch_page(&url, "560001")
        .await
        .unwrap();

    assert_eq!(page.title.as_deref(), Some("Kettle"));
    assert!(page.mentions("560001"));
}

/// Test that non-2xx responses become status errors
#[tokio::test]
async fn test_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let renderer = renderer(None);

    let missing = renderer
        .render(&format!("{}/missing", mock_server.uri()), "")
        .await
        .unwrap_err();
    assert!(matches!(missing, RenderError::Status(404)));
    assert!(!missing.is_recoverable());

    let busy = renderer
        .render(&format!("{}/busy", mock_server.uri()), "")
        .await
        .unwrap_err();
    assert!(matches!(busy, RenderError::Status(503)));
    assert!(busy.is_recoverable());
}

/// Test that a slow server produces a timeout error
#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(PRODUCT_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let err = renderer(None)
        .render(&format!("{}/slow", mock_server.uri()), "")
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Timeout(1)), "unexpected error: {err}");
}

/// Test that non-http URLs are rejected before any request
#[tokio::test]
async fn test_invalid_url() {
    let err = renderer(None)
        .render("ftp://shop.example.com/p/1", "")
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidUrl(_)));
}
